use crate::constants::{MAX_NAME_LEN, MAX_THRESHOLD_SECS};
use crate::error::EngineError;
use chrono::NaiveTime;
use std::time::Duration;

/// Validate a DAILY/WEEKLY threshold.
pub fn validate_threshold(threshold: Duration) -> Result<(), EngineError> {
    if threshold.is_zero() {
        return Err(EngineError::invalid("threshold", "must be positive"));
    }
    if threshold.as_secs() > MAX_THRESHOLD_SECS {
        return Err(EngineError::invalid(
            "threshold",
            format!("cannot exceed {MAX_THRESHOLD_SECS} seconds"),
        ));
    }
    Ok(())
}

/// Validate an application or group name.
/// Returns the trimmed name if valid.
pub fn validate_name(field: &'static str, name: &str) -> Result<String, EngineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid(field, "cannot be empty"));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(EngineError::invalid(
            field,
            format!("cannot exceed {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate a schedule window. Both ends are inclusive, so a single-minute
/// window (`start == end`) is allowed.
pub fn validate_time_window(start: NaiveTime, end: NaiveTime) -> Result<(), EngineError> {
    if start > end {
        return Err(EngineError::invalid(
            "time_window",
            format!("start {start} is after end {end}"),
        ));
    }
    Ok(())
}

/// Validate a periodic interval (poll, watchdog, flush).
pub fn validate_interval(field: &'static str, value: u64) -> Result<(), EngineError> {
    if value == 0 {
        return Err(EngineError::invalid(field, "must be positive"));
    }
    Ok(())
}
