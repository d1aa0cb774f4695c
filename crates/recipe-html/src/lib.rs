// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The PARSE_HTML action's collaborator: a pure function from HTML
//! content (an Evernote-style export) to a [`ParsedFile`].
//!
//! The parser's own extraction heuristics are explicitly out of scope —
//! this implementation is a concrete, minimal one so the workspace
//! builds and runs end to end, not a tuned recipe extractor.

use chrono::{DateTime, Utc};
use recipe_core::{EvernoteMetadata, ParseStatus, ParsedFile, ParsedIngredientLine, ParsedInstructionLine};
use scraper::{Html, Selector};
use thiserror::Error;
use uuid::Uuid;

/// Failures raised while parsing HTML content.
#[derive(Debug, Error)]
pub enum HtmlParseError {
    /// The document had no parseable structure at all (e.g. empty body).
    #[error("document had no extractable content")]
    Empty,
}

/// `content -> ParsedFile`, the out-of-scope collaborator's contract.
pub trait HtmlParser: Send + Sync {
    /// Parse `content` into a [`ParsedFile`]. Never panics; malformed
    /// HTML degrades to a best-effort, possibly-empty result rather than
    /// an error — schema validation downstream is what rejects an empty
    /// title or contents.
    fn parse(&self, content: &str) -> Result<ParsedFile, HtmlParseError>;
}

/// A [`scraper`]-backed parser tuned for Evernote's exported HTML shape:
/// an `<h1>` title, `<meta>` tags carrying Evernote metadata, and
/// `<ul>`/`<ol>` lists under "Ingredients"/"Instructions" headings.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScraperHtmlParser;

impl ScraperHtmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl HtmlParser for ScraperHtmlParser {
    fn parse(&self, content: &str) -> Result<ParsedFile, HtmlParseError> {
        if content.trim().is_empty() {
            return Err(HtmlParseError::Empty);
        }

        let document = Html::parse_document(content);

        let title = first_text(&document, "h1").or_else(|| first_text(&document, "title")).unwrap_or_default();

        let contents = first_html(&document, "body").unwrap_or_else(|| content.to_string());

        let ingredients = extract_list_after_heading(&document, "ingredient")
            .into_iter()
            .enumerate()
            .map(|(line_index, text)| ParsedIngredientLine {
                id: Uuid::new_v4(),
                reference: text,
                block_index: 0,
                line_index: line_index as u32,
                parse_status: ParseStatus::AwaitingParsing,
            })
            .collect();

        let instructions = extract_list_after_heading(&document, "instruction")
            .into_iter()
            .enumerate()
            .map(|(line_index, text)| ParsedInstructionLine {
                id: Uuid::new_v4(),
                original_text: text,
                normalized_text: None,
                line_index: line_index as u32,
                parse_status: ParseStatus::AwaitingParsing,
            })
            .collect();

        let evernote_metadata = extract_evernote_metadata(&document);
        let image = first_attr(&document, "img", "src");
        let source_url = evernote_metadata.as_ref().and_then(|m| m.source.clone());

        Ok(ParsedFile {
            title,
            contents,
            ingredients,
            instructions,
            evernote_metadata,
            image,
            historical_created_at: None,
            source_url,
        })
    }
}

fn select<'a>(document: &'a Html, selector: &str) -> Vec<scraper::ElementRef<'a>> {
    let Ok(sel) = Selector::parse(selector) else { return Vec::new() };
    document.select(&sel).collect()
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    select(document, selector).into_iter().next().map(|el| el.text().collect::<String>().trim().to_string())
}

fn first_html(document: &Html, selector: &str) -> Option<String> {
    select(document, selector).into_iter().next().map(|el| el.inner_html())
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    select(document, selector).into_iter().next().and_then(|el| el.value().attr(attr)).map(String::from)
}

/// Find the first heading (`h1`-`h4`) whose text contains `keyword`
/// (case-insensitive), and return the text of every `li` found in the
/// next `ul`/`ol` sibling.
fn extract_list_after_heading(document: &Html, keyword: &str) -> Vec<String> {
    let headings = select(document, "h1, h2, h3, h4");
    let Some(heading) = headings
        .into_iter()
        .find(|h| h.text().collect::<String>().to_lowercase().contains(keyword))
    else {
        return Vec::new();
    };

    let Some(list) = heading
        .next_siblings()
        .filter_map(scraper::ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "ul" | "ol"))
    else {
        return Vec::new();
    };

    let Ok(li_selector) = Selector::parse("li") else { return Vec::new() };
    list.select(&li_selector).map(|li| li.text().collect::<String>().trim().to_string()).collect()
}

fn extract_evernote_metadata(document: &Html) -> Option<EvernoteMetadata> {
    let source = meta_content(document, "evernote-source");
    let notebook = meta_content(document, "notebook");
    let created = meta_content(document, "created").and_then(|s| DateTime::parse_from_rfc3339(&s).ok());
    let tags = meta_content(document, "keywords")
        .map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
        .unwrap_or_default();

    if source.is_none() && notebook.is_none() && created.is_none() && tags == Vec::<String>::new() {
        return None;
    }

    Some(EvernoteMetadata {
        source,
        original_created_at: created.map(|dt| dt.with_timezone(&Utc)),
        tags,
        notebook,
    })
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    let Ok(selector) = Selector::parse(&format!(r#"meta[name="{name}"]"#)) else { return None };
    document.select(&selector).next().and_then(|el| el.value().attr("content")).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html>
          <head>
            <meta name="notebook" content="Desserts">
            <meta name="evernote-source" content="https://example.com/recipe">
            <meta name="keywords" content="sweet, quick">
          </head>
          <body>
            <h1>Chocolate Cake</h1>
            <h2>Ingredients</h2>
            <ul><li>2 cups flour</li><li>1 cup sugar</li></ul>
            <h2>Instructions</h2>
            <ol><li>Mix dry ingredients.</li><li>Bake at 350F.</li></ol>
          </body>
        </html>
    "#;

    #[test]
    fn extracts_title_ingredients_and_instructions() {
        let parsed = ScraperHtmlParser::new().parse(SAMPLE).unwrap();
        assert_eq!(parsed.title, "Chocolate Cake");
        assert_eq!(parsed.ingredients.len(), 2);
        assert_eq!(parsed.instructions.len(), 2);
        assert_eq!(parsed.ingredients[0].reference, "2 cups flour");
        assert_eq!(parsed.instructions[1].original_text, "Bake at 350F.");
    }

    #[test]
    fn extracts_evernote_metadata() {
        let parsed = ScraperHtmlParser::new().parse(SAMPLE).unwrap();
        let meta = parsed.evernote_metadata.unwrap();
        assert_eq!(meta.notebook.as_deref(), Some("Desserts"));
        assert_eq!(meta.tags, vec!["sweet".to_string(), "quick".to_string()]);
    }

    #[test]
    fn minimal_document_has_no_ingredients_or_instructions() {
        let parsed = ScraperHtmlParser::new().parse("<html><body><h1>R</h1></body></html>").unwrap();
        assert_eq!(parsed.title, "R");
        assert!(parsed.ingredients.is_empty());
        assert!(parsed.instructions.is_empty());
    }

    #[test]
    fn empty_content_is_rejected() {
        assert!(matches!(ScraperHtmlParser::new().parse("   "), Err(HtmlParseError::Empty)));
    }
}
