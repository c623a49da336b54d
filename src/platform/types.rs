/// The window currently holding input focus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusedWindow {
    pub process_id: u32,
    pub title: String,
    pub executable_path: Option<String>,
}

/// A process found by name during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    pub process_id: u32,
    pub name: String,
}

pub trait WindowProbe: Send + Sync {
    /// `None` means nothing changed this tick, not an error.
    fn focused_window(&self) -> Option<FocusedWindow>;
}

pub trait ProcessControl: Send + Sync {
    /// Returns true if the process was signalled.
    fn terminate(&self, process_id: u32) -> bool;

    /// Running processes whose name contains `fragment`, case-insensitively.
    fn find_by_name_contains(&self, fragment: &str) -> Vec<RunningProcess>;
}
