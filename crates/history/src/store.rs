//! SQLite-backed store for submitted guidelines and field specs.

use chrono::Utc;
use docfields_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;

/// The kind of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    /// Free-text extraction guidelines
    Guideline,
    /// A field spec, stored in its JSON form
    Fields,
}

impl HistoryKind {
    fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Guideline => "guideline",
            HistoryKind::Fields => "fields",
        }
    }
}

/// A stored submission.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub body: String,
    pub submitted_at: String,
}

/// Append-only store of guideline and field-spec submissions.
///
/// Lookups return the most recent non-empty submission of a kind, so a
/// blank accidental submission never shadows a usable earlier one.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    /// Open (or create) the history database at the given path.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::History(format!("Failed to create history directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::History(format!("Failed to open history database: {}", e)))?;

        Self::init(conn, db_path)
    }

    /// Open an in-memory store, used in tests.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::History(format!("Failed to open history database: {}", e)))?;

        Self::init(conn, Path::new(":memory:"))
    }

    fn init(conn: Connection, db_path: &Path) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                body TEXT NOT NULL,
                submitted_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_submissions_kind ON submissions(kind, id);
            "#,
        )
        .map_err(|e| AppError::History(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened history database at {:?}", db_path);
        Ok(Self { conn })
    }

    /// Record a submission.
    pub fn append(&self, kind: HistoryKind, body: &str) -> AppResult<()> {
        self.conn
            .execute(
                "INSERT INTO submissions (kind, body, submitted_at) VALUES (?1, ?2, ?3)",
                params![kind.as_str(), body, Utc::now().to_rfc3339()],
            )
            .map_err(|e| AppError::History(format!("Failed to record submission: {}", e)))?;

        tracing::debug!("Recorded {} submission ({} bytes)", kind.as_str(), body.len());
        Ok(())
    }

    /// The most recent non-empty submission of a kind, if any.
    pub fn latest(&self, kind: HistoryKind) -> AppResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT body FROM submissions
                 WHERE kind = ?1 AND TRIM(body) != ''
                 ORDER BY id DESC LIMIT 1",
            )
            .map_err(|e| AppError::History(format!("Failed to prepare query: {}", e)))?;

        let body = stmt
            .query_row(params![kind.as_str()], |row| row.get::<_, String>(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(AppError::History(format!(
                    "Failed to query submissions: {}",
                    other
                ))),
            })?;

        Ok(body)
    }

    /// All submissions of a kind, most recent first.
    pub fn list(&self, kind: HistoryKind, limit: usize) -> AppResult<Vec<HistoryEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, body, submitted_at FROM submissions
                 WHERE kind = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| AppError::History(format!("Failed to prepare query: {}", e)))?;

        let entries = stmt
            .query_map(params![kind.as_str(), limit as i64], |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    body: row.get(1)?,
                    submitted_at: row.get(2)?,
                })
            })
            .map_err(|e| AppError::History(format!("Failed to query submissions: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::History(format!("Failed to read submission row: {}", e)))?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_latest_returns_none_on_empty_store() {
        let store = HistoryStore::open_in_memory().unwrap();
        assert!(store.latest(HistoryKind::Guideline).unwrap().is_none());
        assert!(store.latest(HistoryKind::Fields).unwrap().is_none());
    }

    #[test]
    fn test_latest_returns_most_recent() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.append(HistoryKind::Guideline, "first").unwrap();
        store.append(HistoryKind::Guideline, "second").unwrap();

        assert_eq!(
            store.latest(HistoryKind::Guideline).unwrap().as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_kinds_are_independent() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.append(HistoryKind::Guideline, "use DD/MM/YYYY").unwrap();
        store
            .append(HistoryKind::Fields, r#"{"date":"NA"}"#)
            .unwrap();

        assert_eq!(
            store.latest(HistoryKind::Fields).unwrap().as_deref(),
            Some(r#"{"date":"NA"}"#)
        );
        assert_eq!(
            store.latest(HistoryKind::Guideline).unwrap().as_deref(),
            Some("use DD/MM/YYYY")
        );
    }

    #[test]
    fn test_blank_submission_does_not_shadow_earlier() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.append(HistoryKind::Guideline, "usable").unwrap();
        store.append(HistoryKind::Guideline, "   ").unwrap();

        assert_eq!(
            store.latest(HistoryKind::Guideline).unwrap().as_deref(),
            Some("usable")
        );
    }

    #[test]
    fn test_list_most_recent_first() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.append(HistoryKind::Fields, "a").unwrap();
        store.append(HistoryKind::Fields, "b").unwrap();
        store.append(HistoryKind::Fields, "c").unwrap();

        let entries = store.list(HistoryKind::Fields, 2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].body, "c");
        assert_eq!(entries[1].body, "b");
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".docfields").join("history.db");

        let store = HistoryStore::open(&path).unwrap();
        store.append(HistoryKind::Guideline, "persisted").unwrap();
        drop(store);

        let reopened = HistoryStore::open(&path).unwrap();
        assert_eq!(
            reopened.latest(HistoryKind::Guideline).unwrap().as_deref(),
            Some("persisted")
        );
    }
}
