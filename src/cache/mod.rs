//! Content-addressed run cache
//!
//! Command results are keyed by the working tree fingerprint and by a key
//! derived from the command and its repository-relative directory, and are
//! stored as git notes.
//!
//! # Address scheme
//!
//! | Segment | Source |
//! |---------|--------|
//! | `vibe-validate/run` | fixed namespace |
//! | `{identity}` | tree hash, folded with submodule hashes when present |
//! | `{key}` | SHA-256 of workdir and command, 32 hex chars |

pub mod key;
pub mod nested;
pub mod record;
pub mod store;

pub use key::{encode, CacheKey, RepoRelativePath};
pub use record::{CacheRecord, Diagnostic};
pub use store::{CacheEntryRef, CacheLookup, CacheStatus, RunCacheStore, RUN_CACHE_NAMESPACE};
