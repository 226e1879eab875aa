//! Prompt system for docfields.
//!
//! This crate provides the fixed extraction instruction template and a
//! Handlebars-based builder that renders it with per-call variables. The
//! template is compiled once at builder construction; a missing placeholder
//! at render time is a hard error, never silently blank.

pub mod template;

// Re-export main types
pub use template::{PromptBuilder, PromptVars};
