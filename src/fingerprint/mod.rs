//! Working tree fingerprinting
//!
//! A fingerprint is the git tree object id of the complete working tree
//! (tracked, modified and untracked files, ignore rules applied), computed
//! through a process-private shadow index so the real index is never written.
//!
//! # Submodules
//!
//! A tree object records a submodule by its committed pointer only, so the
//! root hash cannot see uncommitted edits inside a submodule. Each initialised
//! submodule is fingerprinted on its own and [`Fingerprint::cache_identity`]
//! folds those hashes into the identity used to address cached runs.

pub mod shadow;
mod tree;

pub use shadow::{
    ProcessLiveness, ShadowIndexHandle, ShadowIndexLifecycle, SweepReport, SystemLiveness,
    DEFAULT_GRACE_PERIOD, SHADOW_INDEX_PREFIX,
};
pub use tree::TreeFingerprinter;

use crate::error::VibeResult;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Content hash of a working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Tree object id of the whole working tree
    pub root_hash: String,
    /// Submodule path (repo-relative) -> that submodule's cache identity
    pub submodule_hashes: BTreeMap<String, String>,
    /// Top level of the repository the fingerprint was taken from
    pub repo_root: PathBuf,
}

impl Fingerprint {
    /// Fingerprint without submodules
    pub fn new(root_hash: impl Into<String>, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            root_hash: root_hash.into(),
            submodule_hashes: BTreeMap::new(),
            repo_root: repo_root.into(),
        }
    }

    /// Identity used to address cached runs for this tree state
    ///
    /// Equals `root_hash` when there are no submodules. Otherwise it is the
    /// SHA-256 of `root_hash` followed by every `(path, hash)` pair in path
    /// order, so a change confined to a submodule's working tree still
    /// produces a different identity.
    pub fn cache_identity(&self) -> String {
        if self.submodule_hashes.is_empty() {
            return self.root_hash.clone();
        }

        let mut hasher = Sha256::new();
        hasher.update(self.root_hash.as_bytes());
        hasher.update(b"\n");
        for (path, hash) in &self.submodule_hashes {
            hasher.update(path.as_bytes());
            hasher.update(b"\0");
            hasher.update(hash.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Anything that can fingerprint the repository containing a directory
#[async_trait]
pub trait FingerprintSource: Send + Sync {
    /// Fingerprint the repository that contains `working_dir`
    async fn compute(&self, working_dir: &Path) -> VibeResult<Fingerprint>;
}
