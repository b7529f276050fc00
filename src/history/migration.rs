//! Removal of the retired `vibe-validate/runs` notes namespace
//!
//! Only that exact namespace (and refs nested under it) is legacy. The
//! current `vibe-validate/run/...` cache refs share a textual prefix and must
//! never match.

use crate::error::VibeResult;
use crate::vcs::{ExecOptions, VcsExecutor};
use std::path::Path;
use tracing::{info, warn};

/// Notes ref used before the run cache moved to `vibe-validate/run`
pub const LEGACY_RUNS_REF: &str = "refs/notes/vibe-validate/runs";

/// What a migration pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    NotNeeded,
    /// Legacy refs that were deleted
    Cleaned(Vec<String>),
    /// Deletion failed; the user has to remove these by hand
    ManualActionRequired {
        refs: Vec<String>,
        instructions: String,
    },
}

pub fn is_legacy_ref(refname: &str) -> bool {
    refname == LEGACY_RUNS_REF
        || refname
            .strip_prefix(LEGACY_RUNS_REF)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Detect and delete legacy refs in the repository at `repo_root`
pub async fn migrate_legacy_notes(
    vcs: &dyn VcsExecutor,
    repo_root: &Path,
) -> VibeResult<MigrationOutcome> {
    let options = ExecOptions::in_dir(repo_root);
    let listing = vcs
        .exec_ok(&["for-each-ref", "--format=%(refname)", LEGACY_RUNS_REF], &options)
        .await?;

    let legacy: Vec<String> = listing
        .lines()
        .map(str::trim)
        .filter(|name| is_legacy_ref(name))
        .map(str::to_string)
        .collect();
    if legacy.is_empty() {
        return Ok(MigrationOutcome::NotNeeded);
    }

    let mut failed = Vec::new();
    for refname in &legacy {
        let output = vcs.exec(&["update-ref", "-d", refname], &options).await?;
        if !output.success {
            warn!("Could not delete legacy ref {}: {}", refname, output.stderr.trim());
            failed.push(refname.clone());
        }
    }

    if failed.is_empty() {
        info!("Removed {} legacy run cache ref(s)", legacy.len());
        return Ok(MigrationOutcome::Cleaned(legacy));
    }

    let instructions = failed
        .iter()
        .map(|refname| format!("git update-ref -d {}", refname))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(MigrationOutcome::ManualActionRequired {
        refs: failed,
        instructions,
    })
}
