// src/constants.rs

/// Focus polling interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Watchdog re-termination interval in milliseconds
pub const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 2000;

/// Usage flush interval in seconds (5 minutes)
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 5 * 60;

/// Remaining time at which warnings start (5 minutes)
pub const DEFAULT_WARNING_THRESHOLD_SECS: u64 = 5 * 60;

/// Warnings fire only when remaining seconds is a multiple of this
pub const DEFAULT_WARNING_CADENCE_SECS: u64 = 10;

/// Separator for composite window titles ("Page - Browser")
pub const DEFAULT_TITLE_SEPARATOR: &str = " - ";

/// Title fragments shorter than this are not blocked on their own
pub const DEFAULT_MIN_FRAGMENT_LEN: usize = 3;

/// Name used when the focused window reports an empty title
pub const UNKNOWN_APP_NAME: &str = "Unknown";

/// Maximum threshold for DAILY/WEEKLY limits (one week)
pub const MAX_THRESHOLD_SECS: u64 = 7 * 24 * 60 * 60;

/// Maximum application or group name length
pub const MAX_NAME_LEN: usize = 512;

/// Date format used for persisted usage rows
pub const DATE_FORMAT: &str = "%Y-%m-%d";
