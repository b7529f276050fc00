//! Cached run records
//!
//! Records are stored and printed as YAML with stable camelCase field names.

use crate::error::VibeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One structured diagnostic extracted from command output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Stored outcome of one command execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Tree hash the command ran against
    pub tree_hash: String,
    pub command: String,
    /// Repository-relative directory, empty for the root
    pub workdir: String,
    pub timestamp: DateTime<Utc>,
    pub exit_code: i32,
    /// Wall time in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_errors: Option<usize>,
    /// Innermost command to run directly when this run wrapped vibe-validate itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_direct_command: Option<String>,
    /// Set on records replayed from the cache, never stored
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_cached_result: bool,
}

impl CacheRecord {
    /// Record for a command that just finished
    pub fn new(
        tree_hash: impl Into<String>,
        command: impl Into<String>,
        workdir: impl Into<String>,
        exit_code: i32,
        duration_ms: u64,
    ) -> Self {
        Self {
            tree_hash: tree_hash.into(),
            command: command.into(),
            workdir: workdir.into(),
            timestamp: Utc::now(),
            exit_code,
            duration_ms,
            errors: Vec::new(),
            summary: String::new(),
            total_errors: None,
            suggested_direct_command: None,
            is_cached_result: false,
        }
    }

    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Serialise for storage
    pub fn to_yaml(&self) -> VibeResult<String> {
        let mut stored = self.clone();
        stored.is_cached_result = false;
        Ok(serde_yaml_ng::to_string(&stored)?)
    }

    /// Serialise as a standalone YAML document for stdout
    pub fn to_document(&self) -> VibeResult<String> {
        Ok(format!("---\n{}", serde_yaml_ng::to_string(self)?))
    }

    /// Parse a stored or printed record, rejecting ones missing identity fields
    pub fn from_yaml(content: &str) -> Option<Self> {
        let record: Self = serde_yaml_ng::from_str(content).ok()?;
        if record.command.trim().is_empty() {
            return None;
        }
        Some(record)
    }
}
