use crate::clock::{elapsed_between, Clock};
use crate::models::{AppKey, TrackedApplication};
use crate::safe_lock;
use chrono::NaiveDateTime;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Accumulated foreground time for one application.
#[derive(Debug, Clone)]
pub struct AccumulatedUsage {
    pub application: TrackedApplication,
    /// Completed sessions plus any carried-over time.
    pub committed: Duration,
    /// Start of the running session, if any.
    pub session_start: Option<NaiveDateTime>,
}

impl AccumulatedUsage {
    fn new(application: TrackedApplication) -> Self {
        Self {
            application,
            committed: Duration::ZERO,
            session_start: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session_start.is_some()
    }

    pub fn total_at(&self, now: NaiveDateTime) -> Duration {
        match self.session_start {
            Some(start) => self.committed + elapsed_between(start, now),
            None => self.committed,
        }
    }

    fn commit(&mut self, now: NaiveDateTime) {
        if let Some(start) = self.session_start.take() {
            self.committed += elapsed_between(start, now);
        }
    }
}

/// Point-in-time view of one application's usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub application: TrackedApplication,
    pub total: Duration,
}

pub struct UsageAccumulator {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<AppKey, AccumulatedUsage>>,
}

impl UsageAccumulator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create the entry for `app` if this is its first sighting, seeding it
    /// with `carried_over`. An existing entry only gets its pid refreshed.
    ///
    /// Returns true if a new entry was created.
    pub fn ensure(&self, app: &TrackedApplication, carried_over: Option<Duration>) -> bool {
        let mut entries = safe_lock(&self.entries, "UsageAccumulator");
        if let Some(existing) = entries.get_mut(&app.key()) {
            existing.application.process_id = app.process_id;
            return false;
        }

        let mut usage = AccumulatedUsage::new(app.clone());
        if let Some(saved) = carried_over.filter(|d| !d.is_zero()) {
            debug!("Seeding {} with {}s of carried-over usage", app.name, saved.as_secs());
            usage.committed = saved;
        }
        entries.insert(app.key(), usage);
        true
    }

    /// Start a session for `key`. No-op if one is already running or the key
    /// is unknown.
    pub fn start(&self, key: &AppKey) {
        let now = self.clock.now();
        let mut entries = safe_lock(&self.entries, "UsageAccumulator");
        if let Some(usage) = entries.get_mut(key) {
            if usage.session_start.is_none() {
                usage.session_start = Some(now);
            }
        }
    }

    /// Commit the running session for `key`. No-op if not running.
    pub fn stop(&self, key: &AppKey) {
        let now = self.clock.now();
        let mut entries = safe_lock(&self.entries, "UsageAccumulator");
        if let Some(usage) = entries.get_mut(key) {
            usage.commit(now);
        }
    }

    /// Commit every running session.
    pub fn stop_all(&self) {
        self.stop_all_at(self.clock.now());
    }

    /// Commit every running session as if it ended at `at`.
    pub fn stop_all_at(&self, at: NaiveDateTime) {
        let mut entries = safe_lock(&self.entries, "UsageAccumulator");
        for usage in entries.values_mut() {
            usage.commit(at);
        }
    }

    /// Committed time plus the live session, computed fresh on every call.
    pub fn current_total(&self, key: &AppKey) -> Duration {
        let now = self.clock.now();
        let entries = safe_lock(&self.entries, "UsageAccumulator");
        entries
            .get(key)
            .map_or(Duration::ZERO, |usage| usage.total_at(now))
    }

    /// Merge previously persisted time into `key`'s committed duration.
    ///
    /// Must not be called while a session is running for `key`.
    pub fn add_carried_over(&self, key: &AppKey, duration: Duration) {
        let mut entries = safe_lock(&self.entries, "UsageAccumulator");
        let Some(usage) = entries.get_mut(key) else {
            warn!("Carry-over for untracked application {key} ignored");
            return;
        };
        debug_assert!(
            !usage.is_running(),
            "carry-over merged into a running session for {key}"
        );
        usage.committed += duration;
    }

    pub fn is_running(&self, key: &AppKey) -> bool {
        let entries = safe_lock(&self.entries, "UsageAccumulator");
        entries.get(key).is_some_and(AccumulatedUsage::is_running)
    }

    pub fn contains(&self, key: &AppKey) -> bool {
        safe_lock(&self.entries, "UsageAccumulator").contains_key(key)
    }

    pub fn application(&self, key: &AppKey) -> Option<TrackedApplication> {
        let entries = safe_lock(&self.entries, "UsageAccumulator");
        entries.get(key).map(|usage| usage.application.clone())
    }

    /// Sum of current totals over every tracked application matching `filter`.
    /// Each entry is counted at most once.
    pub fn total_matching(&self, filter: impl Fn(&AppKey) -> bool) -> Duration {
        let now = self.clock.now();
        let entries = safe_lock(&self.entries, "UsageAccumulator");
        entries
            .iter()
            .filter(|(key, _)| filter(key))
            .map(|(_, usage)| usage.total_at(now))
            .sum()
    }

    /// Totals for every tracked application, running sessions included.
    pub fn snapshot(&self) -> Vec<UsageRecord> {
        let now = self.clock.now();
        let entries = safe_lock(&self.entries, "UsageAccumulator");
        let mut records: Vec<UsageRecord> = entries
            .values()
            .map(|usage| UsageRecord {
                application: usage.application.clone(),
                total: usage.total_at(now),
            })
            .collect();
        records.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.application.name.cmp(&b.application.name))
        });
        records
    }

    /// Drop every entry. Callers stop and flush first.
    pub fn clear(&self) {
        safe_lock(&self.entries, "UsageAccumulator").clear();
    }

    pub fn len(&self) -> usize {
        safe_lock(&self.entries, "UsageAccumulator").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
