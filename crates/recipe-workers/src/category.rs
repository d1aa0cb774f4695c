// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Static notebook → category table used by DETERMINE_CATEGORY. Lookup is
//! case-insensitive; a miss is a business error, never a fatal one.

/// Fixed set of common Evernote-style notebook names and their category.
/// The shape and seed entries here are this workspace's own choice.
const MAPPINGS: &[(&str, &str)] = &[
    ("desserts", "Dessert"),
    ("baking", "Baking"),
    ("main dishes", "Main Course"),
    ("mains", "Main Course"),
    ("appetizers", "Appetizer"),
    ("soups", "Soup"),
    ("salads", "Salad"),
    ("breakfast", "Breakfast"),
    ("drinks", "Beverage"),
    ("beverages", "Beverage"),
    ("sides", "Side Dish"),
    ("vegetarian", "Vegetarian"),
    ("vegan", "Vegan"),
    ("holiday", "Holiday"),
];

/// Look up `notebook` case-insensitively, returning `None` on no match —
/// the caller turns that into the "No mapping found for notebook: X"
/// business annotation.
pub fn category_for_notebook(notebook: &str) -> Option<&'static str> {
    let lower = notebook.trim().to_lowercase();
    MAPPINGS.iter().find(|(name, _)| *name == lower).map(|(_, category)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_notebook_maps_case_insensitively() {
        assert_eq!(category_for_notebook("Desserts"), Some("Dessert"));
        assert_eq!(category_for_notebook("DESSERTS"), Some("Dessert"));
    }

    #[test]
    fn unknown_notebook_has_no_mapping() {
        assert_eq!(category_for_notebook("Obscure"), None);
    }
}
