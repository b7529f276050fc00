//! Tree fingerprinter
//!
//! Stages the whole working tree into a shadow index and asks git for the
//! resulting tree object id. No commit is created, no ref moves, and the real
//! index is only read.

use crate::error::{VibeError, VibeResult};
use crate::fingerprint::shadow::{ProcessLiveness, ShadowIndexLifecycle, DEFAULT_GRACE_PERIOD};
use crate::fingerprint::{Fingerprint, FingerprintSource};
use crate::vcs::{ExecOptions, VcsExecutor};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Paths git reports for a working tree
#[derive(Debug, Clone)]
struct RepoLocation {
    root: PathBuf,
    git_dir: PathBuf,
    index: PathBuf,
}

/// Computes [`Fingerprint`]s by driving git through a [`VcsExecutor`]
pub struct TreeFingerprinter<'a> {
    vcs: &'a dyn VcsExecutor,
    liveness: &'a dyn ProcessLiveness,
    grace_period: Duration,
}

impl<'a> TreeFingerprinter<'a> {
    pub fn new(vcs: &'a dyn VcsExecutor, liveness: &'a dyn ProcessLiveness) -> Self {
        Self {
            vcs,
            liveness,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Grace period handed to the stale shadow index sweep
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    async fn locate(&self, dir: &Path) -> VibeResult<RepoLocation> {
        let inside = self
            .vcs
            .exec(&["rev-parse", "--is-inside-work-tree"], &ExecOptions::in_dir(dir))
            .await?;
        if !inside.success || inside.stdout.trim() != "true" {
            return Err(VibeError::NotAWorkingTree(dir.to_path_buf()));
        }

        let root = self.rev_parse_path(&["rev-parse", "--show-toplevel"], dir).await?;
        let git_dir = self.rev_parse_path(&["rev-parse", "--absolute-git-dir"], &root).await?;
        let index = self.rev_parse_path(&["rev-parse", "--git-path", "index"], &root).await?;
        let index = if index.is_absolute() { index } else { root.join(index) };

        Ok(RepoLocation {
            root,
            git_dir,
            index,
        })
    }

    async fn rev_parse_path(&self, args: &[&str], cwd: &Path) -> VibeResult<PathBuf> {
        self.vcs
            .exec_ok(args, &ExecOptions::in_dir(cwd))
            .await
            .map(PathBuf::from)
            .map_err(|e| VibeError::fingerprint(args.join(" "), e.to_string()))
    }

    async fn tree_hash(&self, location: &RepoLocation) -> VibeResult<String> {
        let lifecycle = ShadowIndexLifecycle::new(&location.git_dir, self.liveness)
            .with_grace_period(self.grace_period);
        let handle = lifecycle.acquire(&location.index)?;

        let result = self.stage_and_write_tree(&location.root, handle.path()).await;
        handle.release();
        result
    }

    async fn stage_and_write_tree(&self, root: &Path, shadow: &Path) -> VibeResult<String> {
        let options = ExecOptions::in_dir(root)
            .with_env("GIT_INDEX_FILE", shadow.to_string_lossy());

        let staged = self.vcs.exec(&["add", "--all"], &options).await?;
        if !staged.success {
            return Err(VibeError::fingerprint("git add --all", staged.stderr.trim()));
        }

        let written = self.vcs.exec(&["write-tree"], &options).await?;
        let tree = written.stdout.trim();
        if !written.success || tree.is_empty() {
            return Err(VibeError::fingerprint("git write-tree", written.stderr.trim()));
        }
        Ok(tree.to_string())
    }

    /// Declared submodule paths, relative to `root`
    async fn submodule_paths(&self, root: &Path) -> VibeResult<Vec<String>> {
        if !root.join(".gitmodules").is_file() {
            return Ok(Vec::new());
        }

        let output = self
            .vcs
            .exec(
                &[
                    "config",
                    "--file",
                    ".gitmodules",
                    "--get-regexp",
                    r"^submodule\..*\.path$",
                ],
                &ExecOptions::in_dir(root),
            )
            .await?;

        // Exit 1 means no matching keys
        if !output.success {
            return Ok(Vec::new());
        }

        Ok(parse_submodule_paths(&output.stdout))
    }
}

fn parse_submodule_paths(config_output: &str) -> Vec<String> {
    let mut paths: Vec<String> = config_output
        .lines()
        .filter_map(|line| line.split_once(' '))
        .map(|(_, path)| path.trim().trim_end_matches('/').to_string())
        .filter(|path| !path.is_empty())
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

#[async_trait]
impl FingerprintSource for TreeFingerprinter<'_> {
    async fn compute(&self, working_dir: &Path) -> VibeResult<Fingerprint> {
        let location = self.locate(working_dir).await?;
        let root_hash = self.tree_hash(&location).await?;
        debug!("Tree hash for {}: {}", location.root.display(), root_hash);

        let mut submodule_hashes = BTreeMap::new();
        for path in self.submodule_paths(&location.root).await? {
            let sub_dir = location.root.join(&path);
            if !sub_dir.join(".git").exists() {
                debug!("Skipping uninitialised submodule {}", path);
                continue;
            }
            let sub = self.compute(&sub_dir).await?;
            submodule_hashes.insert(path, sub.cache_identity());
        }

        Ok(Fingerprint {
            root_hash,
            submodule_hashes,
            repo_root: location.root,
        })
    }
}
