//! Cache key derivation
//!
//! A cache key identifies a logical command run in a repository-relative
//! directory. The directory is always normalised against the repository root
//! first, so `--cwd packages/cli` from the root and a plain invocation from
//! inside `packages/cli` produce the same key.

use crate::error::{VibeError, VibeResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Component, Path};

/// Hex characters kept from the digest
const KEY_HEX_LEN: usize = 32;

/// Directory relative to the repository root, `""` for the root itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoRelativePath(String);

impl RepoRelativePath {
    /// The repository root
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalise a relative path written with either separator
    ///
    /// `.` segments and empty segments are dropped and `..` pops a segment,
    /// never climbing above the root.
    pub fn new(raw: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self(segments.join("/"))
    }

    /// Resolve `cwd` (relative to `base_dir`, or absolute) against `repo_root`
    pub fn resolve(repo_root: &Path, base_dir: &Path, cwd: Option<&Path>) -> VibeResult<Self> {
        let target = match cwd {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        };

        let target = target
            .canonicalize()
            .map_err(|e| VibeError::io(format!("resolving directory {}", target.display()), e))?;
        let root = repo_root.canonicalize().map_err(|e| {
            VibeError::io(format!("resolving repository root {}", repo_root.display()), e)
        })?;

        let relative = target
            .strip_prefix(&root)
            .map_err(|_| VibeError::PathOutsideRepo {
                path: target.clone(),
                root: root.clone(),
            })?;

        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RepoRelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, fixed-length identity of a (command, workdir) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode a command and its repository-relative directory into a key
pub fn encode(command: &str, workdir: &RepoRelativePath) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(workdir.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(command.trim().as_bytes());
    let digest = hex::encode(hasher.finalize());
    CacheKey(digest[..KEY_HEX_LEN].to_string())
}
