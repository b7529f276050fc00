//! Run cache backed by git notes
//!
//! Each (tree identity, cache key) pair owns its own notes ref,
//! `refs/notes/vibe-validate/run/{identity}/{key}`, holding a single note on
//! the tree object. A write force-replaces that note, so the latest record is
//! the only record.

use crate::cache::key::CacheKey;
use crate::cache::record::CacheRecord;
use crate::error::{VibeError, VibeResult};
use crate::fingerprint::Fingerprint;
use crate::vcs::{ExecOptions, VcsExecutor};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Notes namespace for cached runs
pub const RUN_CACHE_NAMESPACE: &str = "vibe-validate/run";

/// Result of a cache read
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Box<CacheRecord>),
    Miss,
}

/// Hit or miss without the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// A cached run's storage location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryRef {
    pub identity: String,
    pub key: String,
    pub refname: String,
}

/// Notes address for a fingerprint and key
pub fn address(fingerprint: &Fingerprint, key: &CacheKey) -> String {
    format!(
        "{}/{}/{}",
        RUN_CACHE_NAMESPACE,
        fingerprint.cache_identity(),
        key
    )
}

fn parse_entry_ref(refname: &str) -> Option<CacheEntryRef> {
    let prefix = format!("refs/notes/{}/", RUN_CACHE_NAMESPACE);
    let rest = refname.strip_prefix(&prefix)?;
    let (identity, key) = rest.split_once('/')?;
    if identity.is_empty() || key.is_empty() || key.contains('/') {
        return None;
    }
    Some(CacheEntryRef {
        identity: identity.to_string(),
        key: key.to_string(),
        refname: refname.to_string(),
    })
}

/// Reads and writes cached run records
pub struct RunCacheStore<'a> {
    vcs: &'a dyn VcsExecutor,
    repo_root: PathBuf,
}

impl<'a> RunCacheStore<'a> {
    pub fn new(vcs: &'a dyn VcsExecutor, repo_root: impl AsRef<Path>) -> Self {
        Self {
            vcs,
            repo_root: repo_root.as_ref().to_path_buf(),
        }
    }

    fn options(&self) -> ExecOptions {
        ExecOptions::in_dir(&self.repo_root)
    }

    /// Read the record for `(fingerprint, key)`
    ///
    /// Missing notes, git failures and unparsable content are all a miss.
    pub async fn get(&self, fingerprint: &Fingerprint, key: &CacheKey) -> CacheLookup {
        let address = address(fingerprint, key);
        let ref_arg = format!("--ref={}", address);

        let output = match self
            .vcs
            .exec(
                &["notes", &ref_arg, "show", &fingerprint.root_hash],
                &self.options(),
            )
            .await
        {
            Ok(output) if output.success => output,
            Ok(_) => {
                debug!("Cache miss: {}", address);
                return CacheLookup::Miss;
            }
            Err(e) => {
                warn!("Cache read failed for {}: {}", address, e);
                return CacheLookup::Miss;
            }
        };

        match CacheRecord::from_yaml(&output.stdout) {
            Some(record) => {
                debug!("Cache hit: {}", address);
                CacheLookup::Hit(Box::new(record))
            }
            None => {
                warn!("Ignoring unparsable cache entry {}", address);
                CacheLookup::Miss
            }
        }
    }

    /// Report hit or miss without handing back the record
    pub async fn lookup_only(&self, fingerprint: &Fingerprint, key: &CacheKey) -> CacheStatus {
        match self.get(fingerprint, key).await {
            CacheLookup::Hit(_) => CacheStatus::Hit,
            CacheLookup::Miss => CacheStatus::Miss,
        }
    }

    /// Store `record` at `(fingerprint, key)`, replacing whatever was there
    pub async fn put(
        &self,
        fingerprint: &Fingerprint,
        key: &CacheKey,
        record: &CacheRecord,
    ) -> VibeResult<()> {
        let address = address(fingerprint, key);
        let ref_arg = format!("--ref={}", address);
        let content = record.to_yaml()?;

        let output = self
            .vcs
            .exec(
                &["notes", &ref_arg, "add", "-f", "-F", "-", &fingerprint.root_hash],
                &self.options().with_stdin(content),
            )
            .await?;

        if !output.success {
            return Err(VibeError::CacheWrite {
                address,
                reason: output.stderr.trim().to_string(),
            });
        }

        debug!("Cached run at {}", address);
        Ok(())
    }

    /// Every cached run ref in the repository
    pub async fn list(&self) -> VibeResult<Vec<CacheEntryRef>> {
        let pattern = format!("refs/notes/{}", RUN_CACHE_NAMESPACE);
        let stdout = self
            .vcs
            .exec_ok(&["for-each-ref", "--format=%(refname)", &pattern], &self.options())
            .await?;

        Ok(stdout.lines().filter_map(|l| parse_entry_ref(l.trim())).collect())
    }

    /// Delete every cached run, returning how many were removed
    pub async fn clear(&self) -> VibeResult<usize> {
        let entries = self.list().await?;
        for entry in &entries {
            self.vcs
                .exec_ok(&["update-ref", "-d", &entry.refname], &self.options())
                .await?;
        }
        Ok(entries.len())
    }
}
