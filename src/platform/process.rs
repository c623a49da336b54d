use super::{ProcessControl, RunningProcess};
use crate::safe_lock;
use log::{debug, warn};
use std::sync::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Process enumeration and termination backed by `sysinfo`.
pub struct SysinfoProcessControl {
    system: Mutex<System>,
}

impl Default for SysinfoProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProcessControl {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl ProcessControl for SysinfoProcessControl {
    fn terminate(&self, process_id: u32) -> bool {
        let pid = Pid::from_u32(process_id);
        let mut system = safe_lock(&self.system, "SysinfoProcessControl");
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );

        match system.process(pid) {
            Some(process) => {
                let killed = process.kill();
                if killed {
                    debug!("Terminated process {process_id}");
                } else {
                    warn!("Failed to terminate process {process_id}");
                }
                killed
            }
            None => {
                warn!("Process {process_id} not found for termination");
                false
            }
        }
    }

    fn find_by_name_contains(&self, fragment: &str) -> Vec<RunningProcess> {
        let needle = fragment.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut system = safe_lock(&self.system, "SysinfoProcessControl");
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );

        system
            .processes()
            .iter()
            .filter_map(|(pid, process)| {
                let name = process.name().to_string_lossy().into_owned();
                name.to_lowercase().contains(&needle).then(|| RunningProcess {
                    process_id: pid.as_u32(),
                    name,
                })
            })
            .collect()
    }
}
