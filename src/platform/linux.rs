use super::{FocusedWindow, WindowProbe};
use log::warn;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt, Window};

pub struct LinuxProbe {
    conn: Option<x11rb::rust_connection::RustConnection>,
    root: Window,
}

impl Default for LinuxProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxProbe {
    pub fn new() -> Self {
        match x11rb::connect(None) {
            Ok((conn, screen_num)) => {
                let Some(root) = conn.setup().roots.get(screen_num).map(|s| s.root) else {
                    warn!(
                        "Invalid screen number {screen_num} ({} screens available). Focus tracking disabled.",
                        conn.setup().roots.len()
                    );
                    return Self { conn: None, root: 0 };
                };
                Self {
                    conn: Some(conn),
                    root,
                }
            }
            Err(e) => {
                // Wayland or headless: keep running, report no focus
                warn!("Failed to connect to X server: {e}. Focus tracking disabled.");
                Self { conn: None, root: 0 }
            }
        }
    }

    fn get_atom(&self, name: &str) -> Option<u32> {
        self.conn
            .as_ref()?
            .intern_atom(false, name.as_bytes())
            .ok()?
            .reply()
            .ok()
            .map(|r| r.atom)
    }

    fn get_string_property(&self, window: Window, atom: u32) -> Option<String> {
        let reply = self
            .conn
            .as_ref()?
            .get_property(false, window, atom, AtomEnum::ANY, 0, 1024)
            .ok()?
            .reply()
            .ok()?;

        if reply.value.is_empty() {
            return None;
        }

        String::from_utf8(reply.value).ok()
    }

    fn get_cardinal_property(&self, window: Window, atom: u32, kind: AtomEnum) -> Option<u32> {
        let reply = self
            .conn
            .as_ref()?
            .get_property(false, window, atom, kind, 0, 1)
            .ok()?
            .reply()
            .ok()?;

        let value = reply.value32()?.next();
        value
    }

    fn get_active_window_id(&self) -> Option<Window> {
        let atom = self.get_atom("_NET_ACTIVE_WINDOW")?;
        self.get_cardinal_property(self.root, atom, AtomEnum::WINDOW)
            .filter(|&w| w != 0)
    }

    fn get_window_pid(&self, window: Window) -> Option<u32> {
        let atom = self.get_atom("_NET_WM_PID")?;
        self.get_cardinal_property(window, atom, AtomEnum::CARDINAL)
    }
}

fn executable_path(process_id: u32) -> Option<String> {
    std::fs::read_link(format!("/proc/{process_id}/exe"))
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

impl WindowProbe for LinuxProbe {
    fn focused_window(&self) -> Option<FocusedWindow> {
        let window_id = self.get_active_window_id()?;

        let name_atom = self
            .get_atom("_NET_WM_NAME")
            .unwrap_or_else(|| AtomEnum::WM_NAME.into());

        let title = self
            .get_string_property(window_id, name_atom)
            .unwrap_or_default();

        let process_id = self.get_window_pid(window_id).unwrap_or(0);
        let executable_path = if process_id == 0 {
            None
        } else {
            executable_path(process_id)
        };

        Some(FocusedWindow {
            process_id,
            title: title.trim_end_matches('\0').trim().to_string(),
            executable_path,
        })
    }
}
