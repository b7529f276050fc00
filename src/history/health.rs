//! History health check
//!
//! Purely advisory. A failed check is logged and reported as healthy.

use crate::history::store::HistoryStore;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

pub const DEFAULT_STALE_AFTER_DAYS: u32 = 90;
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Counts describing the history namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryHealth {
    pub total_entries: usize,
    pub stale_entries: usize,
    pub should_warn: bool,
}

impl HistoryHealth {
    /// Prune suggestion when the history has grown stale or large
    pub fn suggestion(&self, stale_after_days: u32) -> Option<String> {
        if !self.should_warn {
            return None;
        }
        if self.stale_entries > 0 {
            Some(format!(
                "{} of {} history entries are older than {} days. Run: vibe-validate history prune",
                self.stale_entries, self.total_entries, stale_after_days
            ))
        } else {
            Some(format!(
                "History has {} entries. Run: vibe-validate history prune --all",
                self.total_entries
            ))
        }
    }
}

pub struct HealthChecker<'a> {
    store: &'a HistoryStore<'a>,
    stale_after_days: u32,
    max_entries: usize,
}

impl<'a> HealthChecker<'a> {
    pub fn new(store: &'a HistoryStore<'a>) -> Self {
        Self {
            store,
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_limits(mut self, stale_after_days: u32, max_entries: usize) -> Self {
        self.stale_after_days = stale_after_days;
        self.max_entries = max_entries;
        self
    }

    pub fn stale_after_days(&self) -> u32 {
        self.stale_after_days
    }

    /// Instant before which an entry counts as stale
    pub fn stale_threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.stale_after_days))
    }

    /// Unreadable notes count toward the total and as stale
    pub async fn check(&self, now: DateTime<Utc>) -> HistoryHealth {
        let entries = match self.store.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("History health check skipped: {}", e);
                return HistoryHealth::default();
            }
        };

        let threshold = self.stale_threshold(now);
        let stale_entries = entries
            .iter()
            .filter(|(_, note)| note.as_ref().map_or(true, |n| n.is_stale(threshold)))
            .count();
        let total_entries = entries.len();

        HistoryHealth {
            total_entries,
            stale_entries,
            should_warn: stale_entries > 0 || total_entries > self.max_entries,
        }
    }
}
