pub mod accumulator;
pub mod clock;
pub mod config;
pub mod constants;
pub mod db;
pub mod enforcement;
pub mod error;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod platform;
pub mod quota;
pub mod store;
#[cfg(test)]
mod test_utils;
pub mod ticker;
pub mod validation;

pub use config::{EngineConfig, MonitorMode};
pub use error::EngineError;
pub use monitor::{Monitor, MonitorDeps, UsageReport};

use crate::clock::SystemClock;
use crate::db::{migrations, Database, SqliteUsageStore};
use crate::notify::LogNotifier;
use crate::platform::{NativeProbe, SysinfoProcessControl};
use directories::ProjectDirs;
use log::{info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Helper to safely acquire a mutex lock, recovering from poisoning.
pub(crate) fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{context} mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn read_lock<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{context} lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn write_lock<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{context} lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Get the data directory, creating it if needed.
pub fn data_dir() -> Result<PathBuf, EngineError> {
    let proj_dirs =
        ProjectDirs::from("com", "usage-warden", "UsageWarden").ok_or(EngineError::NoProjectDirs)?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.to_path_buf())
}

pub fn get_config_path() -> Result<PathBuf, EngineError> {
    Ok(data_dir()?.join("config.json"))
}

pub fn get_db_path() -> Result<PathBuf, EngineError> {
    Ok(data_dir()?.join("usage.db"))
}

/// True for the line that asks the daemon to exit.
fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("quit")
}

/// Block until `input` reaches EOF or yields a quit line.
fn wait_for_quit(input: impl BufRead) {
    for line in input.lines() {
        match line {
            Ok(line) if is_quit_command(&line) => return,
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read stdin: {e}");
                return;
            }
        }
    }
}

/// Run the daemon with native collaborators until stdin closes.
pub fn run() -> Result<(), EngineError> {
    let config_path = get_config_path()?;
    let config = EngineConfig::load_or_default(&config_path)?;

    let db_path = get_db_path()?;
    let db = Database::open(&db_path)?;
    migrations::run(db.connection())?;
    info!("Using database at {}", db_path.display());

    let monitor = Monitor::new(
        &config,
        MonitorDeps {
            probe: Arc::new(NativeProbe::new()),
            processes: Arc::new(SysinfoProcessControl::new()),
            store: Arc::new(SqliteUsageStore::new(db)),
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
        },
    );

    monitor.start()?;
    info!("Monitoring in {} mode; send 'quit' or close stdin to exit", config.mode);

    wait_for_quit(std::io::stdin().lock());

    monitor.shutdown();
    Ok(())
}
