use crate::safe_lock;
use chrono::{Local, NaiveDateTime, TimeDelta};
use log::warn;
use std::sync::Mutex;
use std::time::Duration;

pub trait Clock: Send + Sync {
    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;
}

/// The host's local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: NaiveDateTime) {
        *safe_lock(&self.now, "ManualClock") = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = safe_lock(&self.now, "ManualClock");
        match TimeDelta::from_std(by) {
            Ok(delta) => *now += delta,
            Err(e) => warn!("ManualClock: cannot advance by {by:?}: {e}"),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *safe_lock(&self.now, "ManualClock")
    }
}

/// Elapsed wall-clock time between two readings, clamped to zero when the
/// clock moved backwards in between.
pub fn elapsed_between(start: NaiveDateTime, end: NaiveDateTime) -> Duration {
    (end - start).to_std().unwrap_or(Duration::ZERO)
}
