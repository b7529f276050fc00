//! Unwrapping of nested runs
//!
//! When the wrapped command is vibe-validate itself, its stdout is already a
//! run record. The outer record adopts the inner diagnostics but keeps the
//! exit code it observed.

use crate::cache::record::CacheRecord;
use tracing::debug;

/// Parse an inner run record out of captured stdout
///
/// Output printed before the last `---` document marker is ignored. Returns
/// `None` for anything that is not a complete record.
pub fn parse_inner_record(stdout: &str) -> Option<CacheRecord> {
    let trimmed = stdout.trim();
    if !trimmed.contains("treeHash:") {
        return None;
    }

    let document = trimmed
        .rfind("\n---\n")
        .map(|pos| &trimmed[pos + 1..])
        .unwrap_or(trimmed);

    let record = CacheRecord::from_yaml(document);
    if record.is_none() {
        debug!("Output mentions treeHash but is not a run record; treating as plain output");
    }
    record
}

/// Fold an inner record's diagnostics into the outer one
pub fn merge_inner(outer: &mut CacheRecord, inner: CacheRecord) {
    if inner.exit_code != outer.exit_code {
        debug!(
            "Inner run reported exit code {}, outer observed {}; keeping outer",
            inner.exit_code, outer.exit_code
        );
    }

    outer.errors = inner.errors;
    outer.summary = inner.summary;
    outer.total_errors = inner.total_errors;
    outer.suggested_direct_command = inner
        .suggested_direct_command
        .or(Some(inner.command))
        .filter(|command| !command.trim().is_empty());
}
