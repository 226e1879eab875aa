//! History command handler.
//!
//! Inspects and records the guideline and field-spec submission history
//! that extraction runs fall back to.

use clap::{Args, Subcommand, ValueEnum};
use docfields_core::{config::AppConfig, AppError, AppResult};
use docfields_extract::FieldSpec;
use docfields_history::{HistoryKind, HistoryStore};

/// Inspect or record guideline and field-spec submissions
#[derive(Args, Debug)]
pub struct HistoryCommand {
    #[command(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// Show recent submissions, most recent first
    Show {
        /// Which submission history to show
        #[arg(value_enum)]
        kind: KindArg,

        /// Maximum number of entries
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Record a submission without running an extraction
    Set {
        /// Which submission history to record into
        #[arg(value_enum)]
        kind: KindArg,

        /// The guideline text or field spec
        value: String,
    },
}

/// CLI-facing submission kinds.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum KindArg {
    Guideline,
    Fields,
}

impl From<KindArg> for HistoryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Guideline => HistoryKind::Guideline,
            KindArg::Fields => HistoryKind::Fields,
        }
    }
}

impl HistoryCommand {
    /// Execute the history command.
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = HistoryStore::open(&config.history_db_path())?;

        match &self.action {
            HistoryAction::Show { kind, limit } => {
                let entries = store.list((*kind).into(), *limit)?;
                if entries.is_empty() {
                    println!("No submissions recorded.");
                    return Ok(());
                }

                for entry in entries {
                    println!("{}  {}  {}", entry.id, entry.submitted_at, entry.body);
                }
                Ok(())
            }

            HistoryAction::Set { kind, value } => {
                // Field specs are normalized to canonical JSON before they
                // are recorded, so later runs get a parseable spec.
                let body = match kind {
                    KindArg::Fields => FieldSpec::parse(value)
                        .ok_or_else(|| {
                            AppError::Config(format!("Could not parse field spec: {:?}", value))
                        })?
                        .to_json(),
                    KindArg::Guideline => value.clone(),
                };

                store.append((*kind).into(), &body)?;
                println!("Recorded {:?} submission.", kind);
                Ok(())
            }
        }
    }
}
