// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Concrete `Action` implementations and pipeline builders for the seven
//! queues, grouped one module per queue.

mod category;
mod categorization;
mod ids;
mod image;
mod ingredient;
mod instruction;
mod note;
mod pattern;
mod source;
mod test_support;

pub use categorization::{register as register_categorization, build_pipeline as build_categorization_pipeline, CategorizationJobData};
pub use image::{register as register_image, build_pipeline as build_image_pipeline, ImageJobData};
pub use ingredient::{register as register_ingredient, build_pipeline as build_ingredient_pipeline, IngredientJobData};
pub use instruction::{register as register_instruction, build_pipeline as build_instruction_pipeline, InstructionJobData};
pub use note::{register as register_note, build_pipeline as build_note_pipeline, NoteJobData};
pub use pattern::{register as register_pattern, build_pipeline as build_pattern_pipeline, PatternJobData};
pub use source::{register as register_source, build_pipeline as build_source_pipeline, SourceJobData};

pub use category::category_for_notebook;
pub use ids::child_job_id;
