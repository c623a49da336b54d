use super::{FocusedWindow, WindowProbe};

pub struct MacOSProbe;

impl MacOSProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MacOSProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowProbe for MacOSProbe {
    fn focused_window(&self) -> Option<FocusedWindow> {
        // No NSWorkspace binding yet; report no focus so the loop idles
        None
    }
}
