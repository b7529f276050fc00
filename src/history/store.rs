//! Validation history notes
//!
//! One note per tree object under `refs/notes/vibe-validate/validate`. A note
//! holds every recorded validation run for that tree, oldest first.
//!
//! Writers never move the history ref blindly. Each update is prepared on a
//! private scratch ref and swapped in with a compare-and-swap `update-ref`;
//! if another process moved the ref meanwhile, the update is redone on top of
//! the new tip.

use crate::error::{VibeError, VibeResult};
use crate::vcs::{ExecOptions, VcsExecutor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Notes ref holding validation history
pub const HISTORY_NOTES_REF: &str = "vibe-validate/validate";

/// Runs kept per tree by `prune` unless configured otherwise
pub const DEFAULT_MAX_RUNS_PER_TREE: usize = 10;

const HISTORY_REF: &str = "refs/notes/vibe-validate/validate";

/// Scratch refs an update is prepared on before the swap
const PENDING_REF_PREFIX: &str = "refs/notes/vibe-validate-pending/";

const MAX_WRITE_ATTEMPTS: usize = 8;

/// One recorded validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRun {
    pub id: String,
    /// Cache identity of the validated state
    ///
    /// Differs from the note's tree hash when submodules are present. Runs
    /// written without one validated the tree hash itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub passed: bool,
    pub duration_ms: u64,
    /// Name of the first failing step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
}

impl ValidationRun {
    pub fn new(
        identity: impl Into<String>,
        passed: bool,
        duration_ms: u64,
        failed_step: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identity: Some(identity.into()),
            timestamp: Utc::now(),
            passed,
            duration_ms,
            failed_step,
        }
    }
}

/// Every run recorded for one tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryNote {
    pub tree_hash: String,
    #[serde(default)]
    pub runs: Vec<ValidationRun>,
}

impl HistoryNote {
    pub fn new(tree_hash: impl Into<String>) -> Self {
        Self {
            tree_hash: tree_hash.into(),
            runs: Vec::new(),
        }
    }

    pub fn latest(&self) -> Option<&ValidationRun> {
        self.runs.iter().max_by_key(|run| run.timestamp)
    }

    /// Whether a run against exactly `identity` passed
    pub fn has_passing_run_for(&self, identity: &str) -> bool {
        self.runs.iter().any(|run| {
            run.passed && run.identity.as_deref().unwrap_or(&self.tree_hash) == identity
        })
    }

    /// No run since `threshold`; an empty note is always stale
    pub fn is_stale(&self, threshold: DateTime<Utc>) -> bool {
        self.latest()
            .map(|run| run.timestamp < threshold)
            .unwrap_or(true)
    }

    /// Drop the oldest runs beyond `max`, returning how many went
    fn trim_to(&mut self, max: usize) -> usize {
        let excess = self.runs.len().saturating_sub(max);
        if excess > 0 {
            self.runs.sort_by_key(|run| run.timestamp);
            self.runs.drain(..excess);
        }
        excess
    }
}

/// A note as listed; `None` when its content could not be parsed
pub type HistoryEntry = (String, Option<HistoryNote>);

/// Outcome of a prune
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Trees whose notes were (or, on a dry run, would be) removed
    pub removed: Vec<String>,
    pub kept: usize,
    /// Runs dropped from kept notes that exceeded the per-tree limit
    pub trimmed_runs: usize,
}

enum NoteChange {
    Keep,
    Write(HistoryNote),
    Remove,
}

enum Attempt {
    Done(Option<HistoryNote>),
    /// The history ref moved under us; carries git's complaint
    Conflict(String),
}

/// Reads and appends validation history
pub struct HistoryStore<'a> {
    vcs: &'a dyn VcsExecutor,
    repo_root: PathBuf,
    max_runs_per_tree: usize,
}

impl<'a> HistoryStore<'a> {
    pub fn new(vcs: &'a dyn VcsExecutor, repo_root: impl AsRef<Path>) -> Self {
        Self {
            vcs,
            repo_root: repo_root.as_ref().to_path_buf(),
            max_runs_per_tree: DEFAULT_MAX_RUNS_PER_TREE,
        }
    }

    pub fn with_max_runs_per_tree(mut self, max: usize) -> Self {
        self.max_runs_per_tree = max.max(1);
        self
    }

    fn options(&self) -> ExecOptions {
        ExecOptions::in_dir(&self.repo_root)
    }

    /// History for one tree; `None` when nothing was recorded
    ///
    /// An unreadable note is logged and treated as absent.
    pub async fn read(&self, tree_hash: &str) -> VibeResult<Option<HistoryNote>> {
        self.read_from(HISTORY_REF, tree_hash).await
    }

    async fn read_from(&self, notes_ref: &str, tree_hash: &str) -> VibeResult<Option<HistoryNote>> {
        let ref_arg = format!("--ref={}", notes_ref);
        let output = self
            .vcs
            .exec(&["notes", &ref_arg, "show", tree_hash], &self.options())
            .await?;
        if !output.success {
            return Ok(None);
        }

        match serde_yaml_ng::from_str::<HistoryNote>(&output.stdout) {
            Ok(note) => Ok(Some(note)),
            Err(e) => {
                warn!("Ignoring unreadable history note for {}: {}", tree_hash, e);
                Ok(None)
            }
        }
    }

    /// Append a run to a tree's history
    ///
    /// Earlier runs are never dropped here; only `prune` removes history.
    pub async fn record(&self, tree_hash: &str, run: ValidationRun) -> VibeResult<HistoryNote> {
        let written = self
            .update_note(tree_hash, |current| {
                let mut note = current
                    .cloned()
                    .unwrap_or_else(|| HistoryNote::new(tree_hash));
                note.runs.push(run.clone());
                NoteChange::Write(note)
            })
            .await?;

        debug!("Recorded validation run for {}", tree_hash);
        written.ok_or_else(|| VibeError::Internal("history write produced no note".to_string()))
    }

    /// Trees that have history
    pub async fn tree_hashes(&self) -> VibeResult<Vec<String>> {
        let ref_arg = format!("--ref={}", HISTORY_NOTES_REF);
        let output = self
            .vcs
            .exec(&["notes", &ref_arg, "list"], &self.options())
            .await?;
        // A missing notes ref lists as failure
        if !output.success {
            return Ok(Vec::new());
        }

        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .map(str::to_string)
            .collect())
    }

    /// Every tree with history, including those whose note is unreadable
    pub async fn entries(&self) -> VibeResult<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        for tree in self.tree_hashes().await? {
            let note = self.read(&tree).await?;
            entries.push((tree, note));
        }
        Ok(entries)
    }

    /// Every readable history note, most recently run first
    pub async fn list(&self) -> VibeResult<Vec<HistoryNote>> {
        let mut notes: Vec<HistoryNote> = self
            .entries()
            .await?
            .into_iter()
            .filter_map(|(_, note)| note)
            .collect();
        notes.sort_by(|a, b| {
            let a = a.latest().map(|r| r.timestamp);
            let b = b.latest().map(|r| r.timestamp);
            b.cmp(&a)
        });
        Ok(notes)
    }

    /// Remove notes with no run since `older_than` and trim the rest
    ///
    /// Unreadable notes count as stale. Kept notes lose their oldest runs
    /// beyond the per-tree limit.
    pub async fn prune(&self, older_than: DateTime<Utc>, dry_run: bool) -> VibeResult<PruneReport> {
        let mut report = PruneReport::default();
        let max = self.max_runs_per_tree;
        let stale = |note: Option<&HistoryNote>| note.map_or(true, |n| n.is_stale(older_than));

        for (tree, note) in self.entries().await? {
            if stale(note.as_ref()) {
                if !dry_run {
                    // Re-checked against the tip, a run may have landed since listing
                    self.update_note(&tree, |current| {
                        if stale(current) {
                            NoteChange::Remove
                        } else {
                            NoteChange::Keep
                        }
                    })
                    .await?;
                }
                report.removed.push(tree);
                continue;
            }

            report.kept += 1;
            let excess = note
                .as_ref()
                .map_or(0, |n| n.runs.len().saturating_sub(max));
            if excess == 0 {
                continue;
            }
            if !dry_run {
                self.update_note(&tree, |current| match current {
                    Some(note) if note.runs.len() > max => {
                        let mut note = note.clone();
                        note.trim_to(max);
                        NoteChange::Write(note)
                    }
                    _ => NoteChange::Keep,
                })
                .await?;
            }
            report.trimmed_runs += excess;
        }

        Ok(report)
    }

    /// Delete all history, returning how many trees had notes
    pub async fn prune_all(&self, dry_run: bool) -> VibeResult<usize> {
        let count = self.tree_hashes().await?.len();
        if count > 0 && !dry_run {
            self.vcs
                .exec_ok(&["update-ref", "-d", HISTORY_REF], &self.options())
                .await?;
        }
        Ok(count)
    }

    /// Apply `change` to one tree's note and swap the result in atomically
    async fn update_note<F>(&self, tree_hash: &str, change: F) -> VibeResult<Option<HistoryNote>>
    where
        F: Fn(Option<&HistoryNote>) -> NoteChange,
    {
        let mut last_conflict = String::new();
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let base = self.tip_of(HISTORY_REF).await?;
            let scratch = format!("{}{}", PENDING_REF_PREFIX, uuid::Uuid::new_v4());

            let outcome = self
                .try_update(&scratch, base.as_deref(), tree_hash, &change)
                .await;
            self.drop_scratch(&scratch).await;

            match outcome? {
                Attempt::Done(note) => return Ok(note),
                Attempt::Conflict(reason) => {
                    debug!("History ref moved (attempt {}): {}", attempt, reason);
                    last_conflict = reason;
                }
            }
        }

        Err(VibeError::vcs(
            format!("update-ref {}", HISTORY_REF),
            format!(
                "history kept changing after {} attempts: {}",
                MAX_WRITE_ATTEMPTS, last_conflict
            ),
        ))
    }

    async fn try_update<F>(
        &self,
        scratch: &str,
        base: Option<&str>,
        tree_hash: &str,
        change: &F,
    ) -> VibeResult<Attempt>
    where
        F: Fn(Option<&HistoryNote>) -> NoteChange,
    {
        if let Some(base) = base {
            self.vcs
                .exec_ok(&["update-ref", scratch, base], &self.options())
                .await?;
        }

        let current = self.read_from(scratch, tree_hash).await?;
        let scratch_arg = format!("--ref={}", scratch);
        let result = match change(current.as_ref()) {
            NoteChange::Keep => return Ok(Attempt::Done(current)),
            NoteChange::Write(note) => {
                let content = serde_yaml_ng::to_string(&note)?;
                let output = self
                    .vcs
                    .exec(
                        &["notes", &scratch_arg, "add", "-f", "-F", "-", tree_hash],
                        &self.options().with_stdin(content),
                    )
                    .await?;
                if !output.success {
                    return Err(VibeError::vcs(
                        format!("notes --ref={} add", HISTORY_NOTES_REF),
                        output.stderr.trim(),
                    ));
                }
                Some(note)
            }
            NoteChange::Remove => {
                self.vcs
                    .exec_ok(
                        &["notes", &scratch_arg, "remove", "--ignore-missing", tree_hash],
                        &self.options(),
                    )
                    .await?;
                None
            }
        };

        let tip = self.tip_of(scratch).await?;
        let Some(tip) = tip.filter(|tip| Some(tip.as_str()) != base) else {
            // Nothing changed
            return Ok(Attempt::Done(result));
        };

        // An empty old value requires the ref not to exist yet
        let output = self
            .vcs
            .exec(
                &["update-ref", HISTORY_REF, &tip, base.unwrap_or("")],
                &self.options(),
            )
            .await?;
        Ok(if output.success {
            Attempt::Done(result)
        } else {
            Attempt::Conflict(output.stderr.trim().to_string())
        })
    }

    async fn tip_of(&self, refname: &str) -> VibeResult<Option<String>> {
        let output = self
            .vcs
            .exec(&["rev-parse", "--verify", "-q", refname], &self.options())
            .await?;
        let tip = output.stdout.trim();
        Ok((output.success && !tip.is_empty()).then(|| tip.to_string()))
    }

    async fn drop_scratch(&self, scratch: &str) {
        match self
            .vcs
            .exec(&["update-ref", "-d", scratch], &self.options())
            .await
        {
            Ok(output) if output.success => {}
            Ok(output) => debug!("Scratch ref {} not removed: {}", scratch, output.stderr.trim()),
            Err(e) => debug!("Scratch ref {} not removed: {}", scratch, e),
        }
    }
}
