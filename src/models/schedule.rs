use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// A permitted time-of-day window on one weekday. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(day: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self { day, start, end }
    }

    /// Check if the given time falls within this window's range.
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }

    /// Check if this window permits use at the given moment.
    pub fn is_open_at(&self, at: NaiveDateTime) -> bool {
        self.day == at.weekday() && self.contains(at.time())
    }
}

/// The set of windows during which a SCHEDULE-limited target may be used.
///
/// A weekday without any window is blocked for the whole day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    #[serde(default)]
    windows: Vec<TimeWindow>,
}

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, day: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        self.windows.push(TimeWindow::new(day, start, end));
        self
    }

    pub fn add_window(&mut self, window: TimeWindow) {
        self.windows.push(window);
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    /// Windows configured for a weekday, in insertion order.
    pub fn windows_for(&self, day: Weekday) -> impl Iterator<Item = &TimeWindow> {
        self.windows.iter().filter(move |w| w.day == day)
    }

    /// Check if any window permits use at the given moment.
    pub fn allows(&self, at: NaiveDateTime) -> bool {
        self.windows.iter().any(|w| w.is_open_at(at))
    }
}
