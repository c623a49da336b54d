use crate::accumulator::UsageRecord;
use crate::error::EngineError;
use crate::models::AppKey;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::Duration;

/// Usage totals for one calendar day, as handed to [`UsageStore::flush`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub date: NaiveDate,
    pub records: Vec<UsageRecord>,
}

/// Where accumulated usage survives restarts.
///
/// Totals in a snapshot already include carried-over time, so implementations
/// replace rather than add to what they stored earlier for the same day.
pub trait UsageStore: Send + Sync {
    fn load_carried_over(&self, date: NaiveDate) -> Result<HashMap<AppKey, Duration>, EngineError>;

    fn flush(&self, snapshot: &UsageSnapshot) -> Result<(), EngineError>;
}
