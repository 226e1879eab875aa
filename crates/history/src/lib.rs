//! Submission history for docfields.
//!
//! Guidelines and field specs submitted on earlier runs are kept in a
//! SQLite database under `.docfields/`, so a run that omits either can
//! fall back to the most recent submission.

pub mod store;

// Re-export main types
pub use store::{HistoryEntry, HistoryKind, HistoryStore};
