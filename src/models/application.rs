use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a monitored program.
///
/// Keyed on display name plus executable path when the platform reports one.
/// Process ids are not part of the key: the same program gets a new pid every
/// time it restarts, and two processes reporting the same name and path are
/// tracked as one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppKey {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<String>,
}

impl AppKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable_path: None,
        }
    }

    pub fn with_path(name: impl Into<String>, executable_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable_path: Some(executable_path.into()),
        }
    }

    /// Whether a rule or group entry keyed on `self` applies to `other`.
    ///
    /// A key without a path matches every application of the same name.
    pub fn covers(&self, other: &AppKey) -> bool {
        self == other || (self.executable_path.is_none() && self.name == other.name)
    }
}

impl fmt::Display for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.executable_path {
            Some(path) => write!(f, "{} ({path})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A running program as last reported by the window probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedApplication {
    pub name: String,
    pub process_id: u32,
    pub executable_path: Option<String>,
}

impl TrackedApplication {
    pub fn new(name: impl Into<String>, process_id: u32, executable_path: Option<String>) -> Self {
        Self {
            name: name.into(),
            process_id,
            executable_path,
        }
    }

    pub fn key(&self) -> AppKey {
        AppKey {
            name: self.name.clone(),
            executable_path: self.executable_path.clone(),
        }
    }
}

impl fmt::Display for TrackedApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (PID: {})", self.name, self.process_id)
    }
}
