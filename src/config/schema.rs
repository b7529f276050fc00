//! Configuration schema for vibe-validate
//!
//! Global configuration lives at `~/.config/vibe-validate/config.toml`;
//! a project `vibe-validate.toml` overrides it key by key.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Run cache settings
    pub cache: CacheConfig,

    /// Validation history settings
    pub history: HistoryConfig,

    /// Steps run by `vibe-validate validate`
    pub validation: ValidationConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

impl GeneralConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Run cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Look up and store command results
    pub enabled: bool,

    /// Age after which an abandoned shadow index may be reclaimed
    pub shadow_grace_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shadow_grace_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn shadow_grace_period(&self) -> Duration {
        Duration::from_secs(self.shadow_grace_secs)
    }
}

/// Validation history settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record a history note for every validation
    pub enabled: bool,

    /// Entries whose newest run is older than this are stale
    pub stale_after_days: u32,

    /// Health check warns above this many annotated trees
    pub max_entries: usize,

    /// `history prune` drops the oldest runs of a tree beyond this
    pub max_runs_per_tree: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_after_days: 90,
            max_entries: 1000,
            max_runs_per_tree: 10,
        }
    }
}

/// Validation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Stop at the first failing step
    pub fail_fast: bool,

    /// Steps in execution order
    pub steps: Vec<ValidationStep>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            fail_fast: true,
            steps: Vec::new(),
        }
    }
}

/// One validation command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStep {
    pub name: String,
    pub command: String,

    /// Directory relative to the repository root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}
