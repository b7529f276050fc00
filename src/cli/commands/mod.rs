//! CLI command implementations
//!
//! Every command returns the process exit code on success; errors are
//! printed by `main`.

pub mod cache;
pub mod config;
pub mod history;
pub mod run;
pub mod validate;

pub use cache::execute as cache;
pub use config::execute as config;
pub use history::execute as history;
pub use run::execute as run;
pub use validate::execute as validate;

use crate::error::{VibeError, VibeResult};
use crate::history::{migrate_legacy_notes, MigrationOutcome};
use crate::ui::{self, UiContext};
use crate::vcs::{ExecOptions, VcsExecutor};
use std::path::{Path, PathBuf};
use tracing::debug;

pub(crate) fn current_dir() -> VibeResult<PathBuf> {
    std::env::current_dir().map_err(|e| VibeError::io("getting current directory", e))
}

/// Top level of the working tree containing `dir`
pub(crate) async fn repo_root(vcs: &dyn VcsExecutor, dir: &Path) -> VibeResult<PathBuf> {
    let output = vcs
        .exec(&["rev-parse", "--show-toplevel"], &ExecOptions::in_dir(dir))
        .await?;
    if !output.success || output.stdout.trim().is_empty() {
        return Err(VibeError::NotAWorkingTree(dir.to_path_buf()));
    }
    Ok(PathBuf::from(output.stdout.trim()))
}

/// First 12 characters of a hash, for display
pub(crate) fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

/// Remove the retired notes namespace, reporting only when something happened
pub(crate) async fn run_migration(ctx: &UiContext, vcs: &dyn VcsExecutor, repo_root: &Path) {
    match migrate_legacy_notes(vcs, repo_root).await {
        Ok(MigrationOutcome::NotNeeded) => {}
        Ok(MigrationOutcome::Cleaned(refs)) => ui::step_ok_detail(
            ctx,
            "Removed legacy run cache notes",
            &refs.join(", "),
        ),
        Ok(MigrationOutcome::ManualActionRequired { instructions, .. }) => {
            ui::step_warn_hint(
                ctx,
                "Legacy run cache notes could not be removed",
                "Remove them manually:",
            );
            for line in instructions.lines() {
                ui::remark(ctx, line);
            }
        }
        Err(e) => debug!("Legacy notes check skipped: {}", e),
    }
}
