//! Version control command execution
//!
//! Every git invocation in the crate goes through [`VcsExecutor`], which
//! takes an argument vector (never a shell string) plus structured options
//! and reports the outcome instead of failing on a non-zero exit. Only a
//! failure to spawn git at all is an `Err`.

mod git;

#[cfg(test)]
pub(crate) mod fake;

pub use git::GitCli;

use crate::error::{VibeError, VibeResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Options for a single git invocation
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory for the child process
    pub cwd: Option<PathBuf>,
    /// Environment overrides scoped to this child only
    pub env: Vec<(String, String)>,
    /// Content piped to the child's stdin
    pub stdin: Option<String>,
}

impl ExecOptions {
    /// Options running in the given directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            cwd: Some(dir.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Add an environment override
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Pipe content to stdin
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

/// Captured result of a git invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsOutput {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl VcsOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Abstract git interface
///
/// Implemented by [`GitCli`] for real repositories and by an in-memory fake
/// in unit tests.
#[async_trait]
pub trait VcsExecutor: Send + Sync {
    /// Run git with `args`, capturing stdout, stderr and exit code
    async fn exec(&self, args: &[&str], options: &ExecOptions) -> VibeResult<VcsOutput>;

    /// Run git and require success, returning trimmed stdout
    async fn exec_ok(&self, args: &[&str], options: &ExecOptions) -> VibeResult<String> {
        let output = self.exec(args, options).await?;
        if output.success {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(VibeError::vcs(args.join(" "), output.stderr.trim()))
        }
    }
}
