// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The closed `ActionName` and `QueueName` enumerations.
//!
//! Both are finite and known at program start — dispatch over them is
//! a registry lookup, never reflection.

use std::fmt;
use std::str::FromStr;

/// One of the seven logical queues the pipeline routes jobs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueName {
    Note,
    Ingredient,
    Instruction,
    Image,
    Categorization,
    Source,
    PatternTracking,
}

impl QueueName {
    pub const ALL: [QueueName; 7] = [
        QueueName::Note,
        QueueName::Ingredient,
        QueueName::Instruction,
        QueueName::Image,
        QueueName::Categorization,
        QueueName::Source,
        QueueName::PatternTracking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "NOTE",
            Self::Ingredient => "INGREDIENT",
            Self::Instruction => "INSTRUCTION",
            Self::Image => "IMAGE",
            Self::Categorization => "CATEGORIZATION",
            Self::Source => "SOURCE",
            Self::PatternTracking => "PATTERN_TRACKING",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| format!("unknown queue name: {s}"))
    }
}

/// The closed set of action identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionName {
    ParseHtml,
    SaveNote,
    ScheduleImages,
    ScheduleIngredients,
    ScheduleInstructions,
    ScheduleSource,
    ScheduleCategorizationAfterCompletion,
    ParseIngredientLine,
    SaveIngredientLine,
    UpdateIngredientCount,
    FormatInstructionLine,
    SaveInstructionLine,
    ProcessImage,
    SaveImage,
    DetermineCategory,
    SaveCategory,
    DetermineTags,
    SaveTags,
    ProcessSource,
    TrackPattern,
    CompletionStatus,
    RecordPattern,
}

impl ActionName {
    pub const ALL: [ActionName; 22] = [
        ActionName::ParseHtml,
        ActionName::SaveNote,
        ActionName::ScheduleImages,
        ActionName::ScheduleIngredients,
        ActionName::ScheduleInstructions,
        ActionName::ScheduleSource,
        ActionName::ScheduleCategorizationAfterCompletion,
        ActionName::ParseIngredientLine,
        ActionName::SaveIngredientLine,
        ActionName::UpdateIngredientCount,
        ActionName::FormatInstructionLine,
        ActionName::SaveInstructionLine,
        ActionName::ProcessImage,
        ActionName::SaveImage,
        ActionName::DetermineCategory,
        ActionName::SaveCategory,
        ActionName::DetermineTags,
        ActionName::SaveTags,
        ActionName::ProcessSource,
        ActionName::TrackPattern,
        ActionName::CompletionStatus,
        ActionName::RecordPattern,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseHtml => "PARSE_HTML",
            Self::SaveNote => "SAVE_NOTE",
            Self::ScheduleImages => "SCHEDULE_IMAGES",
            Self::ScheduleIngredients => "SCHEDULE_INGREDIENTS",
            Self::ScheduleInstructions => "SCHEDULE_INSTRUCTIONS",
            Self::ScheduleSource => "SCHEDULE_SOURCE",
            Self::ScheduleCategorizationAfterCompletion => "SCHEDULE_CATEGORIZATION_AFTER_COMPLETION",
            Self::ParseIngredientLine => "PARSE_INGREDIENT_LINE",
            Self::SaveIngredientLine => "SAVE_INGREDIENT_LINE",
            Self::UpdateIngredientCount => "UPDATE_INGREDIENT_COUNT",
            Self::FormatInstructionLine => "FORMAT_INSTRUCTION_LINE",
            Self::SaveInstructionLine => "SAVE_INSTRUCTION_LINE",
            Self::ProcessImage => "PROCESS_IMAGE",
            Self::SaveImage => "SAVE_IMAGE",
            Self::DetermineCategory => "DETERMINE_CATEGORY",
            Self::SaveCategory => "SAVE_CATEGORY",
            Self::DetermineTags => "DETERMINE_TAGS",
            Self::SaveTags => "SAVE_TAGS",
            Self::ProcessSource => "PROCESS_SOURCE",
            Self::TrackPattern => "TRACK_PATTERN",
            Self::CompletionStatus => "COMPLETION_STATUS",
            Self::RecordPattern => "RECORD_PATTERN",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action name: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for a in ActionName::ALL {
            assert_eq!(ActionName::from_str(a.as_str()).unwrap(), a);
        }
    }

    #[test]
    fn queue_names_round_trip() {
        for q in QueueName::ALL {
            assert_eq!(QueueName::from_str(q.as_str()).unwrap(), q);
        }
    }
}
