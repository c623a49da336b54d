#![cfg(test)]

use crate::db::{migrations, Database};
use crate::error::EngineError;
use crate::models::AppKey;
use crate::notify::{NotificationCategory, Notifier};
use crate::platform::{FocusedWindow, ProcessControl, RunningProcess, WindowProbe};
use crate::store::{UsageSnapshot, UsageStore};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

/// Create a temporary test database with migrations applied.
///
/// Returns a tuple of (Database, TempDir). The TempDir must be kept alive
/// for the duration of the test to prevent the database file from being deleted.
pub fn setup_test_db() -> (Database, TempDir) {
    let dir = tempdir().expect("Failed to create temp directory for test DB");
    let db_path = dir.path().join("test.db");
    let db = Database::open(&db_path).expect("Failed to open test database");
    migrations::run(db.connection()).expect("Failed to run migrations on test DB");
    (db, dir)
}

/// 2024-01-01 is a Monday.
pub fn monday(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, minute, second)
        .unwrap()
}

/// Ordered record of side effects across fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }
}

#[derive(Default)]
pub struct FakeProbe {
    window: Mutex<Option<FocusedWindow>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self, process_id: u32, title: &str) {
        *self.window.lock().unwrap() = Some(FocusedWindow {
            process_id,
            title: title.to_string(),
            executable_path: None,
        });
    }

    pub fn focus_with_path(&self, process_id: u32, title: &str, path: &str) {
        *self.window.lock().unwrap() = Some(FocusedWindow {
            process_id,
            title: title.to_string(),
            executable_path: Some(path.to_string()),
        });
    }

    pub fn clear(&self) {
        *self.window.lock().unwrap() = None;
    }
}

impl WindowProbe for FakeProbe {
    fn focused_window(&self) -> Option<FocusedWindow> {
        self.window.lock().unwrap().clone()
    }
}

/// An in-memory process table.
pub struct FakeProcesses {
    running: Mutex<Vec<RunningProcess>>,
    terminated: Mutex<Vec<u32>>,
    journal: Journal,
}

impl FakeProcesses {
    pub fn new(journal: Journal) -> Self {
        Self {
            running: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            journal,
        }
    }

    pub fn launch(&self, process_id: u32, name: &str) {
        self.running.lock().unwrap().push(RunningProcess {
            process_id,
            name: name.to_string(),
        });
    }

    pub fn is_running(&self, process_id: u32) -> bool {
        self.running
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.process_id == process_id)
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.lock().unwrap().clone()
    }
}

impl ProcessControl for FakeProcesses {
    fn terminate(&self, process_id: u32) -> bool {
        self.journal.record(format!("terminate:{process_id}"));
        self.terminated.lock().unwrap().push(process_id);
        let mut running = self.running.lock().unwrap();
        let before = running.len();
        running.retain(|p| p.process_id != process_id);
        running.len() != before
    }

    fn find_by_name_contains(&self, fragment: &str) -> Vec<RunningProcess> {
        let needle = fragment.to_lowercase();
        self.running
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
}

pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    journal: Journal,
}

impl RecordingNotifier {
    pub fn new(journal: Journal) -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
            journal,
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn count(&self, category: NotificationCategory) -> usize {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.category == category)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, title: &str, category: NotificationCategory) {
        self.journal.record(format!("notify:{category}"));
        self.notifications.lock().unwrap().push(Notification {
            category,
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}

#[derive(Default)]
pub struct MemoryStore {
    carried_over: Mutex<HashMap<NaiveDate, HashMap<AppKey, Duration>>>,
    flushes: Mutex<Vec<UsageSnapshot>>,
    failing: AtomicBool,
    flush_delay: Mutex<Duration>,
    flushing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_carried_over(self, date: NaiveDate, key: AppKey, duration: Duration) -> Self {
        self.carried_over
            .lock()
            .unwrap()
            .entry(date)
            .or_default()
            .insert(key, duration);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every flush take `delay` before it is recorded.
    pub fn set_flush_delay(&self, delay: Duration) {
        *self.flush_delay.lock().unwrap() = delay;
    }

    /// True while a delayed flush is in progress.
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> Vec<UsageSnapshot> {
        self.flushes.lock().unwrap().clone()
    }

    pub fn last_flush(&self) -> Option<UsageSnapshot> {
        self.flushes.lock().unwrap().last().cloned()
    }
}

impl UsageStore for MemoryStore {
    fn load_carried_over(&self, date: NaiveDate) -> Result<HashMap<AppKey, Duration>, EngineError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::NotFound { entity: "Usage" });
        }
        Ok(self
            .carried_over
            .lock()
            .unwrap()
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }

    fn flush(&self, snapshot: &UsageSnapshot) -> Result<(), EngineError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::NotFound { entity: "Usage" });
        }
        let delay = *self.flush_delay.lock().unwrap();
        if !delay.is_zero() {
            self.flushing.store(true, Ordering::SeqCst);
            std::thread::sleep(delay);
            self.flushing.store(false, Ordering::SeqCst);
        }
        self.flushes.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}
