//! Error types for vibe-validate
//!
//! All modules use `VibeResult<T>` as their return type. Conditions the
//! caching layer is expected to absorb (corrupt cache entries, unreapable
//! stale shadow indexes, unparsable nested output) never become errors;
//! they are logged and degrade to the uncached path.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vibe-validate operations
pub type VibeResult<T> = Result<T, VibeError>;

/// Exit status for tool errors. Kept apart from 1, which `--check` uses for a miss.
pub const ERROR_EXIT_CODE: u8 = 2;

/// All errors that can occur in vibe-validate
#[derive(Error, Debug)]
pub enum VibeError {
    // Repository errors
    #[error("Not inside a git working tree: {0}")]
    NotAWorkingTree(PathBuf),

    #[error("Failed to compute working tree fingerprint during `{step}`: {reason}")]
    FingerprintFailed { step: String, reason: String },

    #[error("Path {path} is outside the repository root {root}")]
    PathOutsideRepo { path: PathBuf, root: PathBuf },

    // Version control errors
    #[error("git {command} failed: {stderr}")]
    VcsCommand { command: String, stderr: String },

    // Cache errors
    #[error("Failed to write cache entry {address}: {reason}")]
    CacheWrite { address: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No validation steps configured")]
    NoValidationSteps,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed to start: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl VibeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a git command error
    pub fn vcs(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::VcsCommand {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a fingerprint step error
    pub fn fingerprint(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FingerprintFailed {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NotAWorkingTree(_) => Some("Run inside a git repository, or run: git init"),
            Self::PathOutsideRepo { .. } => Some("Pass a --cwd that lives inside the repository"),
            Self::NoValidationSteps => {
                Some("Add [[validation.steps]] entries to vibe-validate.toml")
            }
            Self::CacheWrite { .. } => {
                Some("Check that git user.name and user.email are configured")
            }
            _ => None,
        }
    }
}
