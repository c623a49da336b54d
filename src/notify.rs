use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// Remaining time is inside the warning window.
    Warning,
    /// A quota was exceeded.
    Breach,
    /// A blocked application was terminated again after relaunching.
    Block,
}

impl NotificationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationCategory::Warning => "warning",
            NotificationCategory::Breach => "breach",
            NotificationCategory::Block => "block",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, title: &str, category: NotificationCategory);
}

/// Writes notifications to the log. Used when the host has no UI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, title: &str, category: NotificationCategory) {
        match category {
            NotificationCategory::Warning => info!("[{category}] {title}: {message}"),
            NotificationCategory::Breach | NotificationCategory::Block => {
                warn!("[{category}] {title}: {message}");
            }
        }
    }
}
