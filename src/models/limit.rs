use super::{AppKey, WeeklySchedule};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What a limit rule is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum QuotaTarget {
    Application(AppKey),
    Group(String),
}

impl fmt::Display for QuotaTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaTarget::Application(app) => write!(f, "application {app}"),
            QuotaTarget::Group(name) => write!(f, "group {name}"),
        }
    }
}

/// The policy of a limit rule.
///
/// Threshold kinds carry no schedule and the schedule kind carries no
/// threshold, so a malformed mix cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimitKind {
    Daily {
        #[serde(rename = "threshold_secs", with = "duration_secs")]
        threshold: Duration,
    },
    Weekly {
        #[serde(rename = "threshold_secs", with = "duration_secs")]
        threshold: Duration,
    },
    Schedule { schedule: WeeklySchedule },
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Daily { .. } => "daily",
            LimitKind::Weekly { .. } => "weekly",
            LimitKind::Schedule { .. } => "schedule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    #[serde(flatten)]
    kind: LimitKind,
    last_reset: NaiveDateTime,
}

impl LimitRule {
    pub fn new(kind: LimitKind, now: NaiveDateTime) -> Self {
        Self {
            kind,
            last_reset: now,
        }
    }

    pub fn daily(threshold: Duration, now: NaiveDateTime) -> Self {
        Self::new(LimitKind::Daily { threshold }, now)
    }

    pub fn weekly(threshold: Duration, now: NaiveDateTime) -> Self {
        Self::new(LimitKind::Weekly { threshold }, now)
    }

    pub fn schedule(schedule: WeeklySchedule, now: NaiveDateTime) -> Self {
        Self::new(LimitKind::Schedule { schedule }, now)
    }

    pub fn kind(&self) -> &LimitKind {
        &self.kind
    }

    pub fn last_reset(&self) -> NaiveDateTime {
        self.last_reset
    }

    pub fn threshold(&self) -> Option<Duration> {
        match &self.kind {
            LimitKind::Daily { threshold } | LimitKind::Weekly { threshold } => Some(*threshold),
            LimitKind::Schedule { .. } => None,
        }
    }

    /// Threshold rules are exceeded only when usage is strictly greater than
    /// the threshold. Schedule rules are exceeded whenever `now` falls outside
    /// every permitted window.
    pub fn is_exceeded(&self, usage: Duration, now: NaiveDateTime) -> bool {
        match &self.kind {
            LimitKind::Daily { threshold } | LimitKind::Weekly { threshold } => usage > *threshold,
            LimitKind::Schedule { schedule } => !schedule.allows(now),
        }
    }

    /// Calendar comparison only, so a clock moved backwards never produces a
    /// spurious reset from negative arithmetic.
    pub fn needs_reset(&self, now: NaiveDateTime) -> bool {
        match &self.kind {
            LimitKind::Daily { .. } => now.date() != self.last_reset.date(),
            LimitKind::Weekly { .. } => now.date().iso_week() != self.last_reset.date().iso_week(),
            LimitKind::Schedule { .. } => false,
        }
    }

    /// Restart the quota window. Accumulated usage is not touched here.
    pub fn reset(&mut self, now: NaiveDateTime) {
        self.last_reset = now;
    }

    /// Time left before the threshold is reached; `None` for schedule rules.
    pub fn remaining(&self, usage: Duration) -> Option<Duration> {
        self.threshold()
            .map(|threshold| threshold.saturating_sub(usage))
    }
}

impl fmt::Display for LimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LimitKind::Daily { threshold } | LimitKind::Weekly { threshold } => {
                let secs = threshold.as_secs();
                write!(
                    f,
                    "{} limit: {}h {}m",
                    self.kind.as_str(),
                    secs / 3600,
                    (secs % 3600) / 60
                )
            }
            LimitKind::Schedule { schedule } => {
                write!(f, "schedule limit: {} window(s)", schedule.windows().len())
            }
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
