//! Cached command execution
//!
//! Wraps a shell command with the run cache. The order within one run is
//! fixed: fingerprint, cache lookup, execution on a miss, cache write.
//! Caching problems never hide the command's own result; they degrade to an
//! uncached run and are reported on stderr through `tracing`.

use crate::cache::key::{encode, RepoRelativePath};
use crate::cache::nested::{merge_inner, parse_inner_record};
use crate::cache::record::CacheRecord;
use crate::cache::store::{CacheLookup, CacheStatus, RunCacheStore};
use crate::error::{VibeError, VibeResult};
use crate::extract::{output_tail, ErrorExtractor};
use crate::fingerprint::{Fingerprint, FingerprintSource};
use crate::vcs::VcsExecutor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Captured result of a wrapped command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Executes user commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the platform shell in `cwd`
    async fn run(&self, command: &str, cwd: &Path) -> VibeResult<CommandOutput>;
}

/// [`CommandRunner`] backed by `sh -c` (`cmd /C` on Windows)
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: &Path) -> VibeResult<CommandOutput> {
        debug!("Executing in {}: {}", cwd.display(), command);

        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };

        let output = cmd
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| VibeError::command_failed(command, e))?;

        Ok(CommandOutput {
            exit_code: exit_code_of(&output.status),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(unix)]
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// How a run uses the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Replay a cached result, run and cache on a miss
    #[default]
    Default,
    /// Always run and overwrite the cached result
    Force,
    /// Only report whether a cached result exists
    Check,
}

/// One command to run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub command: String,
    /// Directory the invocation started from
    pub working_dir: PathBuf,
    /// Subdirectory to run in, relative to `working_dir` or absolute
    pub cwd: Option<PathBuf>,
    pub mode: RunMode,
}

impl RunRequest {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
            cwd: None,
            mode: RunMode::Default,
        }
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    fn target_dir(&self) -> PathBuf {
        match &self.cwd {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.working_dir.join(dir),
            None => self.working_dir.clone(),
        }
    }
}

/// A command that actually ran
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub record: CacheRecord,
    pub output: CommandOutput,
    /// The command was vibe-validate itself and printed its own record
    pub nested: bool,
}

/// What a run did
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Replayed from the cache without running
    Hit(Box<CacheRecord>),
    /// Ran and was cached, unless `cache_error` says otherwise
    Executed {
        execution: Box<Execution>,
        cache_error: Option<String>,
    },
    /// Ran without consulting the cache
    Uncached {
        execution: Box<Execution>,
        reason: String,
    },
    CheckHit,
    CheckMiss,
}

impl RunOutcome {
    /// Exit code the CLI should finish with
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Hit(record) => record.exit_code,
            Self::Executed { execution, .. } | Self::Uncached { execution, .. } => {
                execution.record.exit_code
            }
            Self::CheckHit => 0,
            Self::CheckMiss => 1,
        }
    }

    /// Record to print, if there is one
    pub fn record(&self) -> Option<&CacheRecord> {
        match self {
            Self::Hit(record) => Some(record.as_ref()),
            Self::Executed { execution, .. } | Self::Uncached { execution, .. } => {
                Some(&execution.record)
            }
            Self::CheckHit | Self::CheckMiss => None,
        }
    }

    pub fn execution(&self) -> Option<&Execution> {
        match self {
            Self::Executed { execution, .. } | Self::Uncached { execution, .. } => {
                Some(execution.as_ref())
            }
            _ => None,
        }
    }
}

/// Applies the cache policy around a [`CommandRunner`]
pub struct Runner<'a> {
    fingerprints: &'a dyn FingerprintSource,
    vcs: &'a dyn VcsExecutor,
    commands: &'a dyn CommandRunner,
    extractor: &'a dyn ErrorExtractor,
    cache_enabled: bool,
}

impl<'a> Runner<'a> {
    pub fn new(
        fingerprints: &'a dyn FingerprintSource,
        vcs: &'a dyn VcsExecutor,
        commands: &'a dyn CommandRunner,
        extractor: &'a dyn ErrorExtractor,
    ) -> Self {
        Self {
            fingerprints,
            vcs,
            commands,
            extractor,
            cache_enabled: true,
        }
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Run a request, fingerprinting the repository first
    pub async fn run(&self, request: &RunRequest) -> VibeResult<RunOutcome> {
        if !self.cache_enabled {
            if request.mode == RunMode::Check {
                debug!("Cache disabled; check reports a miss");
                return Ok(RunOutcome::CheckMiss);
            }
            let execution = self.execute_uncached(request).await?;
            return Ok(RunOutcome::Uncached {
                execution: Box::new(execution),
                reason: "caching is disabled".to_string(),
            });
        }

        let fingerprint = match self.fingerprints.compute(&request.target_dir()).await {
            Ok(fingerprint) => fingerprint,
            Err(e) if request.mode == RunMode::Check => return Err(e),
            Err(e) => {
                warn!("Running without cache: {}", e);
                let execution = self.execute_uncached(request).await?;
                return Ok(RunOutcome::Uncached {
                    execution: Box::new(execution),
                    reason: e.to_string(),
                });
            }
        };

        self.run_with(&fingerprint, request).await
    }

    /// Run a request against an already computed fingerprint
    pub async fn run_with(
        &self,
        fingerprint: &Fingerprint,
        request: &RunRequest,
    ) -> VibeResult<RunOutcome> {
        let workdir = RepoRelativePath::resolve(
            &fingerprint.repo_root,
            &request.working_dir,
            request.cwd.as_deref(),
        )?;
        let key = encode(&request.command, &workdir);
        let store = RunCacheStore::new(self.vcs, &fingerprint.repo_root);
        debug!(
            "Cache key {} for `{}` in '{}'",
            key,
            request.command.trim(),
            workdir
        );

        match request.mode {
            RunMode::Check => {
                return Ok(match store.lookup_only(fingerprint, &key).await {
                    CacheStatus::Hit => RunOutcome::CheckHit,
                    CacheStatus::Miss => RunOutcome::CheckMiss,
                });
            }
            RunMode::Default => {
                if let CacheLookup::Hit(mut record) = store.get(fingerprint, &key).await {
                    info!("Cache hit for `{}`", request.command.trim());
                    record.is_cached_result = true;
                    return Ok(RunOutcome::Hit(record));
                }
            }
            RunMode::Force => debug!("Forced run, skipping cache lookup"),
        }

        let target = fingerprint.repo_root.join(workdir.as_str());
        let execution = self
            .execute(request, &target, &fingerprint.root_hash, workdir.as_str())
            .await?;

        let cache_error = match store.put(fingerprint, &key, &execution.record).await {
            Ok(()) => None,
            // Reported by the caller once the result itself is out
            Err(e) => {
                debug!("Result not cached: {}", e);
                Some(e.to_string())
            }
        };

        Ok(RunOutcome::Executed {
            execution: Box::new(execution),
            cache_error,
        })
    }

    async fn execute_uncached(&self, request: &RunRequest) -> VibeResult<Execution> {
        let workdir = request
            .cwd
            .as_deref()
            .map(|dir| RepoRelativePath::new(&dir.to_string_lossy()))
            .unwrap_or_default();
        self.execute(request, &request.target_dir(), "", workdir.as_str())
            .await
    }

    async fn execute(
        &self,
        request: &RunRequest,
        dir: &Path,
        tree_hash: &str,
        workdir: &str,
    ) -> VibeResult<Execution> {
        let started = Instant::now();
        let output = self.commands.run(&request.command, dir).await?;
        let elapsed = started.elapsed().as_millis() as u64;

        let mut record = CacheRecord::new(
            tree_hash,
            request.command.trim(),
            workdir,
            output.exit_code,
            elapsed,
        );

        if let Some(inner) = parse_inner_record(&output.stdout) {
            debug!("Command printed its own run record; merging");
            merge_inner(&mut record, inner);
            return Ok(Execution {
                record,
                output,
                nested: true,
            });
        }

        let raw = output.combined();
        match self.extractor.extract(&raw) {
            Ok(Some(extraction)) => {
                record.summary = extraction.summary;
                record.total_errors = Some(extraction.total_errors);
                record.errors = extraction.errors;
            }
            Ok(None) => {}
            Err(e) => warn!("Error extraction failed: {}", e),
        }

        if record.summary.is_empty() {
            record.summary = if record.passed() {
                "Command succeeded".to_string()
            } else {
                let tail = output_tail(&raw);
                if tail.is_empty() {
                    format!("Command failed with exit code {}", record.exit_code)
                } else {
                    tail
                }
            };
        }

        Ok(Execution {
            record,
            output,
            nested: false,
        })
    }
}
