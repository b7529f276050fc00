//! Git executor backed by the `git` binary

use crate::error::{VibeError, VibeResult};
use crate::vcs::{ExecOptions, VcsExecutor, VcsOutput};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs git subcommands as child processes
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    /// Create a new git executor
    pub fn new() -> Self {
        Self
    }

    fn command(args: &[&str], options: &ExecOptions) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            // An index redirect inherited from a hook must never leak into our children
            .env_remove("GIT_INDEX_FILE")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref cwd) = options.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        cmd
    }
}

#[async_trait]
impl VcsExecutor for GitCli {
    async fn exec(&self, args: &[&str], options: &ExecOptions) -> VibeResult<VcsOutput> {
        debug!("Executing: git {:?}", args);

        let mut cmd = Self::command(args, options);
        let describe = || format!("git {}", args.join(" "));

        let output = match options.stdin {
            Some(ref input) => {
                cmd.stdin(Stdio::piped());
                let mut child = cmd
                    .spawn()
                    .map_err(|e| VibeError::command_failed(describe(), e))?;
                if let Some(mut stdin) = child.stdin.take() {
                    stdin
                        .write_all(input.as_bytes())
                        .await
                        .map_err(|e| VibeError::io(format!("writing stdin of {}", describe()), e))?;
                }
                child
                    .wait_with_output()
                    .await
                    .map_err(|e| VibeError::command_failed(describe(), e))?
            }
            None => {
                cmd.stdin(Stdio::null());
                cmd.output()
                    .await
                    .map_err(|e| VibeError::command_failed(describe(), e))?
            }
        };

        Ok(VcsOutput {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
