//! Validation history
//!
//! Kept in its own notes ref, `vibe-validate/validate`, so inspecting or
//! pruning history never touches the run cache.

pub mod health;
pub mod migration;
pub mod store;

pub use health::{HealthChecker, HistoryHealth};
pub use migration::{migrate_legacy_notes, MigrationOutcome, LEGACY_RUNS_REF};
pub use store::{HistoryNote, HistoryStore, PruneReport, ValidationRun, HISTORY_NOTES_REF};
