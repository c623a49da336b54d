use crate::constants::{
    DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_MIN_FRAGMENT_LEN, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_TITLE_SEPARATOR, DEFAULT_WARNING_CADENCE_SECS, DEFAULT_WARNING_THRESHOLD_SECS,
    DEFAULT_WATCHDOG_INTERVAL_MS,
};
use crate::error::EngineError;
use crate::validation::validate_interval;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// How the engine reacts to a breach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    /// Notify only.
    #[default]
    Normal,
    /// Notify, terminate and keep the application from relaunching.
    Strict,
}

impl MonitorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MonitorMode::Normal => "normal",
            MonitorMode::Strict => "strict",
        }
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a title fragment containing `token` to the process name that should
/// actually be blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    pub token: String,
    pub executable: String,
}

impl AliasRule {
    pub fn new(token: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            executable: executable.into(),
        }
    }
}

fn default_aliases() -> Vec<AliasRule> {
    vec![AliasRule::new("Google", "chrome")]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    pub watchdog_interval_ms: u64,
    pub flush_interval_secs: u64,
    pub warning_threshold_secs: u64,
    pub warning_cadence_secs: u64,
    pub mode: MonitorMode,
    pub notifications_enabled: bool,
    pub title_separator: String,
    /// Shortest title fragment that is blocked by substring. Shorter blocked
    /// names only match a process with exactly that name.
    pub min_fragment_len: usize,
    pub aliases: Vec<AliasRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            watchdog_interval_ms: DEFAULT_WATCHDOG_INTERVAL_MS,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            warning_threshold_secs: DEFAULT_WARNING_THRESHOLD_SECS,
            warning_cadence_secs: DEFAULT_WARNING_CADENCE_SECS,
            mode: MonitorMode::Normal,
            notifications_enabled: true,
            title_separator: DEFAULT_TITLE_SEPARATOR.to_string(),
            min_fragment_len: DEFAULT_MIN_FRAGMENT_LEN,
            aliases: default_aliases(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`EngineConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        validate_interval("poll_interval_ms", self.poll_interval_ms)?;
        validate_interval("watchdog_interval_ms", self.watchdog_interval_ms)?;
        validate_interval("flush_interval_secs", self.flush_interval_secs)?;
        validate_interval("warning_cadence_secs", self.warning_cadence_secs)?;

        if self.title_separator.is_empty() {
            return Err(EngineError::invalid("title_separator", "cannot be empty"));
        }

        if self.min_fragment_len == 0 {
            return Err(EngineError::invalid("min_fragment_len", "must be positive"));
        }

        for alias in &self.aliases {
            if alias.token.trim().is_empty() || alias.executable.trim().is_empty() {
                return Err(EngineError::invalid(
                    "aliases",
                    "token and executable cannot be empty",
                ));
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn warning_threshold(&self) -> Duration {
        Duration::from_secs(self.warning_threshold_secs)
    }
}
