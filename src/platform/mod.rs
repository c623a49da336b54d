pub mod process;
pub mod types;

pub use process::SysinfoProcessControl;
pub use types::{FocusedWindow, ProcessControl, RunningProcess, WindowProbe};

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub use macos::MacOSProbe as NativeProbe;

#[cfg(target_os = "linux")]
pub use linux::LinuxProbe as NativeProbe;

// Other platforms never report focus
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
#[derive(Default)]
pub struct NativeProbe;

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl NativeProbe {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl WindowProbe for NativeProbe {
    fn focused_window(&self) -> Option<FocusedWindow> {
        None
    }
}
