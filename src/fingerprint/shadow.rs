//! Shadow index lifecycle
//!
//! A shadow index lives in the git directory under a name that embeds the
//! owning process id. Unique naming is what keeps concurrent processes apart;
//! no lock is taken. Every acquisition first sweeps shadow indexes abandoned by
//! dead processes, and the returned handle removes its own file when released
//! or dropped.

use crate::error::{VibeError, VibeResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// File name prefix of every shadow index
pub const SHADOW_INDEX_PREFIX: &str = "vibe-validate-temp-index-";

/// Minimum age before an orphaned shadow index may be reclaimed
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Answers whether a process id denotes a running process
pub trait ProcessLiveness: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Liveness check for the current platform
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLiveness;

impl ProcessLiveness for SystemLiveness {
    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 only checks existence and permission, nothing is delivered
        let rc = unsafe { libc::kill(pid, 0) };
        rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _pid: u32) -> bool {
        // No cheap check available; never reclaim
        true
    }
}

/// Extract the owning pid from a shadow index (or its `.lock`) file name
pub fn parse_owner_pid(file_name: &str) -> Option<u32> {
    let rest = file_name.strip_prefix(SHADOW_INDEX_PREFIX)?;
    let digits = rest.strip_suffix(".lock").unwrap_or(rest);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Outcome of a stale sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Files deleted
    pub reclaimed: Vec<PathBuf>,
    /// Stale files that could not be deleted
    pub failed: Vec<PathBuf>,
    /// Candidates left alone (young, owner alive, or ours)
    pub kept: usize,
}

/// Creates and reaps shadow indexes inside one git directory
pub struct ShadowIndexLifecycle<'a> {
    git_dir: PathBuf,
    pid: u32,
    grace_period: Duration,
    liveness: &'a dyn ProcessLiveness,
}

impl<'a> ShadowIndexLifecycle<'a> {
    /// Lifecycle for the current process
    pub fn new(git_dir: impl Into<PathBuf>, liveness: &'a dyn ProcessLiveness) -> Self {
        Self {
            git_dir: git_dir.into(),
            pid: std::process::id(),
            grace_period: DEFAULT_GRACE_PERIOD,
            liveness,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Act as a different owner (used to simulate other processes)
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Path of this owner's shadow index
    pub fn shadow_path(&self) -> PathBuf {
        self.git_dir.join(format!("{}{}", SHADOW_INDEX_PREFIX, self.pid))
    }

    /// Sweep stale indexes, then create this owner's shadow index
    ///
    /// The shadow starts as a copy of `real_index` when one exists, so staged
    /// state is preserved. The real index is only ever read.
    pub fn acquire(&self, real_index: &Path) -> VibeResult<ShadowIndexHandle> {
        self.sweep_stale();

        let handle = ShadowIndexHandle {
            path: self.shadow_path(),
            released: false,
        };

        if real_index.is_file() {
            fs::copy(real_index, &handle.path).map_err(|e| {
                VibeError::io(
                    format!(
                        "copying index {} to {}",
                        real_index.display(),
                        handle.path.display()
                    ),
                    e,
                )
            })?;
        } else {
            // Fresh repository without an index; git creates it on first add
            remove_if_present(&handle.path)
                .map_err(|e| VibeError::io("clearing leftover shadow index", e))?;
        }

        debug!("Acquired shadow index {}", handle.path.display());
        Ok(handle)
    }

    /// Reclaim abandoned shadow indexes as of now
    pub fn sweep_stale(&self) -> SweepReport {
        self.sweep_stale_at(SystemTime::now())
    }

    /// Reclaim shadow indexes older than the grace period whose owner is dead
    ///
    /// Never fails: listing and deletion problems are logged and skipped.
    pub fn sweep_stale_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        let entries = match fs::read_dir(&self.git_dir) {
            Ok(entries) => entries,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                return report;
            }
            Err(e) => {
                warn!(
                    "Unexpected error listing {} for stale shadow indexes: {}",
                    self.git_dir.display(),
                    e
                );
                return report;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(owner) = name.to_str().and_then(parse_owner_pid) else {
                continue;
            };
            if owner == self.pid {
                report.kept += 1;
                continue;
            }

            let path = entry.path();
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|modified| now.duration_since(modified).unwrap_or(Duration::ZERO))
                .unwrap_or(Duration::ZERO);

            if age <= self.grace_period || self.liveness.is_alive(owner) {
                report.kept += 1;
                continue;
            }

            warn!(
                "Reclaiming stale shadow index {} (pid {} gone, {}s old)",
                path.display(),
                owner,
                age.as_secs()
            );
            match fs::remove_file(&path) {
                Ok(()) => report.reclaimed.push(path),
                Err(e) => {
                    warn!("Could not remove stale shadow index {}: {}", path.display(), e);
                    report.failed.push(path);
                }
            }
        }

        report
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Owned shadow index; removed on release or drop
#[derive(Debug)]
pub struct ShadowIndexHandle {
    path: PathBuf,
    released: bool,
}

impl ShadowIndexHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the shadow index (and any lock git left beside it)
    pub fn release(mut self) {
        self.remove_files();
    }

    fn remove_files(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut lock = self.path.clone().into_os_string();
        lock.push(".lock");
        for path in [self.path.clone(), PathBuf::from(lock)] {
            if let Err(e) = remove_if_present(&path) {
                warn!("Failed to remove shadow index {}: {}", path.display(), e);
            }
        }
        debug!("Released shadow index {}", self.path.display());
    }
}

impl Drop for ShadowIndexHandle {
    fn drop(&mut self) {
        self.remove_files();
    }
}
