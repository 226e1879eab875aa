//! Command handlers for the docfields CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod extract;
pub mod history;

// Re-export command types for convenience
pub use extract::ExtractCommand;
pub use history::HistoryCommand;
