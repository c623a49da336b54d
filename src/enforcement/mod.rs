use crate::config::{AliasRule, EngineConfig, MonitorMode};
use crate::models::{AppKey, QuotaTarget, TrackedApplication};
use crate::notify::{NotificationCategory, Notifier};
use crate::platform::{ProcessControl, RunningProcess};
use crate::quota::{Breach, Evaluation};
use crate::safe_lock;
use crate::ticker::PeriodicTask;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnforcementState {
    #[default]
    Unrestricted,
    Warned,
    Blocked,
}

/// The part of [`EngineConfig`] enforcement reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementSettings {
    pub mode: MonitorMode,
    pub notifications_enabled: bool,
    pub warning_threshold: Duration,
    pub warning_cadence_secs: u64,
    pub watchdog_interval: Duration,
    pub title_separator: String,
    pub min_fragment_len: usize,
    pub aliases: Vec<AliasRule>,
}

impl From<&EngineConfig> for EnforcementSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            mode: config.mode,
            notifications_enabled: config.notifications_enabled,
            warning_threshold: config.warning_threshold(),
            warning_cadence_secs: config.warning_cadence_secs,
            watchdog_interval: config.watchdog_interval(),
            title_separator: config.title_separator.clone(),
            min_fragment_len: config.min_fragment_len,
            aliases: config.aliases.clone(),
        }
    }
}

impl Default for EnforcementSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

#[derive(Debug, Default)]
struct AppEnforcement {
    state: EnforcementState,
    /// Remaining whole seconds at the last warning sent.
    last_warned_secs: Option<u64>,
}

/// State shared with the watchdog thread.
struct Shared {
    processes: Arc<dyn ProcessControl>,
    notifier: Arc<dyn Notifier>,
    notifications_enabled: AtomicBool,
    min_fragment_len: usize,
    /// Blocked name -> the blocked titles it was derived from.
    blocked: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl Shared {
    fn notify(&self, message: &str, title: &str, category: NotificationCategory) {
        if self.notifications_enabled.load(Ordering::SeqCst) {
            self.notifier.notify(message, title, category);
        } else {
            debug!("Notification suppressed ({category}): {message}");
        }
    }

    fn blocked_is_empty(&self) -> bool {
        safe_lock(&self.blocked, "blocked set").is_empty()
    }

    fn run_watchdog_cycle(&self) -> usize {
        let entries: Vec<String> = safe_lock(&self.blocked, "blocked set")
            .keys()
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        let mut terminated = 0;
        for entry in &entries {
            let matches = self
                .processes
                .find_by_name_contains(entry)
                .into_iter()
                .filter(|process| self.matches(entry, process));
            for process in matches {
                if !seen.insert(process.process_id) {
                    continue;
                }
                if self.processes.terminate(process.process_id) {
                    info!("Watchdog terminated {} (PID: {})", process.name, process.process_id);
                    terminated += 1;
                    self.notify(
                        &format!("{} has been blocked from reopening.", process.name),
                        "Application Blocked",
                        NotificationCategory::Block,
                    );
                } else {
                    // Retried on the next cycle if it is still running
                    warn!(
                        "Watchdog failed to terminate {} (PID: {})",
                        process.name, process.process_id
                    );
                }
            }
        }
        terminated
    }

    /// Short names only match a process whose name, minus any extension, is
    /// the same name.
    fn matches(&self, entry: &str, process: &RunningProcess) -> bool {
        if entry.chars().count() >= self.min_fragment_len {
            return true;
        }
        let stem = process
            .name
            .rsplit_once('.')
            .map_or(process.name.as_str(), |(stem, _)| stem);
        stem.to_lowercase() == entry.to_lowercase()
    }
}

pub struct EnforcementController {
    shared: Arc<Shared>,
    strict: AtomicBool,
    warning_threshold: Duration,
    warning_cadence_secs: u64,
    watchdog_interval: Duration,
    title_separator: String,
    aliases: Vec<AliasRule>,
    states: Mutex<HashMap<AppKey, AppEnforcement>>,
    watchdog: Mutex<Option<PeriodicTask>>,
}

impl EnforcementController {
    pub fn new(
        settings: EnforcementSettings,
        processes: Arc<dyn ProcessControl>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                processes,
                notifier,
                notifications_enabled: AtomicBool::new(settings.notifications_enabled),
                min_fragment_len: settings.min_fragment_len.max(1),
                blocked: Mutex::new(BTreeMap::new()),
            }),
            strict: AtomicBool::new(settings.mode == MonitorMode::Strict),
            warning_threshold: settings.warning_threshold,
            warning_cadence_secs: settings.warning_cadence_secs.max(1),
            watchdog_interval: settings.watchdog_interval,
            title_separator: settings.title_separator,
            aliases: settings.aliases,
            states: Mutex::new(HashMap::new()),
            watchdog: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> MonitorMode {
        if self.strict.load(Ordering::SeqCst) {
            MonitorMode::Strict
        } else {
            MonitorMode::Normal
        }
    }

    /// Applies from the next evaluation on. Already blocked names stay
    /// blocked until unblocked.
    pub fn set_mode(&self, mode: MonitorMode) {
        info!("Enforcement mode set to {mode}");
        self.strict.store(mode == MonitorMode::Strict, Ordering::SeqCst);
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.shared
            .notifications_enabled
            .store(enabled, Ordering::SeqCst);
    }

    pub fn notifications_enabled(&self) -> bool {
        self.shared.notifications_enabled.load(Ordering::SeqCst)
    }

    pub fn state_of(&self, app: &AppKey) -> EnforcementState {
        safe_lock(&self.states, "enforcement states")
            .get(app)
            .map(|e| e.state)
            .unwrap_or_default()
    }

    /// React to the evaluation of the focused application.
    pub fn apply(&self, app: &TrackedApplication, evaluation: &Evaluation) {
        let key = app.key();

        if evaluation.is_exceeded() {
            let newly_blocked = {
                let mut states = safe_lock(&self.states, "enforcement states");
                let entry = states.entry(key).or_default();
                let newly_blocked = entry.state != EnforcementState::Blocked;
                entry.state = EnforcementState::Blocked;
                entry.last_warned_secs = None;
                newly_blocked
            };

            if newly_blocked {
                for breach in evaluation.breaches() {
                    warn!("{} breached {} {} limit", app.name, breach.target, breach.kind);
                    self.shared.notify(
                        &breach_message(app, breach),
                        "Usage Limit Reached",
                        NotificationCategory::Breach,
                    );
                }
            }

            if self.mode() == MonitorMode::Strict {
                if !newly_blocked {
                    debug!("{app} is still in focus while blocked");
                }
                self.block(app);
            }
            return;
        }

        let warning = evaluation
            .remaining
            .filter(|remaining| *remaining <= self.warning_threshold);
        let still_blocked = self.is_blocked_name(&app.name);

        let mut states = safe_lock(&self.states, "enforcement states");
        let Some(remaining) = warning else {
            if still_blocked {
                if let Some(entry) = states.get_mut(&key) {
                    entry.last_warned_secs = None;
                }
            } else if states
                .remove(&key)
                .is_some_and(|entry| entry.state != EnforcementState::Unrestricted)
            {
                debug!("{} is no longer restricted", app.name);
            }
            return;
        };

        let entry = states.entry(key).or_default();
        if !still_blocked {
            entry.state = EnforcementState::Warned;
        }
        let secs = remaining.as_secs();
        if secs % self.warning_cadence_secs == 0 && entry.last_warned_secs != Some(secs) {
            entry.last_warned_secs = Some(secs);
            drop(states);
            self.shared.notify(
                &format!("{} has {} remaining.", app.name, format_duration(remaining)),
                "Usage Limit Warning",
                NotificationCategory::Warning,
            );
        }
    }

    /// Forget every per-application state whose name is not in the blocked
    /// set. Called when the day rolls over.
    pub fn forget_unblocked(&self) {
        let blocked = safe_lock(&self.shared.blocked, "blocked set");
        let mut states = safe_lock(&self.states, "enforcement states");
        let before = states.len();
        states.retain(|key, _| blocked.contains_key(&key.name));
        debug!("Dropped {} enforcement state(s)", before - states.len());
    }

    /// Terminate `app`, add its name fragments to the blocked set and make
    /// sure the watchdog is running.
    pub fn block(&self, app: &TrackedApplication) {
        if app.process_id == 0 {
            warn!("No process id for {}, relying on the watchdog", app.name);
        } else if self.shared.processes.terminate(app.process_id) {
            info!("Terminated {app}");
        } else {
            warn!("Failed to terminate {app}");
        }

        let names = self.blocked_names(&app.name);
        {
            let mut blocked = safe_lock(&self.shared.blocked, "blocked set");
            for name in names {
                let sources = blocked.entry(name.clone()).or_default();
                if sources.is_empty() {
                    info!("Blocking '{name}'");
                }
                sources.insert(app.name.clone());
            }
        }

        safe_lock(&self.states, "enforcement states")
            .entry(app.key())
            .or_default()
            .state = EnforcementState::Blocked;

        self.ensure_watchdog();
    }

    /// Remove `name` from the blocked set, along with the fragments derived
    /// from it that no other blocked title still shares. Stops the watchdog
    /// once the set is empty.
    ///
    /// Returns false if nothing was blocked under that name.
    pub fn unblock(&self, name: &str) -> bool {
        let name = name.trim();
        let derived = self.blocked_names(name);
        let (removed, now_empty) = {
            let mut blocked = safe_lock(&self.shared.blocked, "blocked set");
            let mut removed = blocked.remove(name).is_some();
            for fragment in derived.iter().filter(|n| n.as_str() != name) {
                let Some(sources) = blocked.get_mut(fragment) else {
                    continue;
                };
                removed |= sources.remove(name);
                if sources.is_empty() {
                    blocked.remove(fragment);
                }
            }
            (removed, blocked.is_empty())
        };

        if removed {
            info!("Unblocked '{name}'");
            safe_lock(&self.states, "enforcement states").retain(|key, _| key.name != name);
        }

        if now_empty {
            self.stop_watchdog();
        }
        removed
    }

    /// The blocked set, sorted.
    pub fn blocked(&self) -> Vec<String> {
        safe_lock(&self.shared.blocked, "blocked set")
            .keys()
            .cloned()
            .collect()
    }

    fn is_blocked_name(&self, name: &str) -> bool {
        safe_lock(&self.shared.blocked, "blocked set").contains_key(name)
    }

    /// One watchdog pass. Returns the number of processes terminated.
    pub fn run_watchdog_cycle(&self) -> usize {
        self.shared.run_watchdog_cycle()
    }

    pub fn is_watchdog_running(&self) -> bool {
        safe_lock(&self.watchdog, "watchdog")
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop the watchdog regardless of the blocked set. Used on process exit.
    pub fn shutdown(&self) {
        self.stop_watchdog();
    }

    fn ensure_watchdog(&self) {
        let mut slot = safe_lock(&self.watchdog, "watchdog");
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        if let Some(finished) = slot.take() {
            finished.stop();
        }

        let shared = Arc::clone(&self.shared);
        let spawned = PeriodicTask::spawn("usage-watchdog", self.watchdog_interval, move || {
            if shared.blocked_is_empty() {
                return ControlFlow::Break(());
            }
            shared.run_watchdog_cycle();
            if shared.blocked_is_empty() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        match spawned {
            Ok(task) => {
                info!("Watchdog started");
                *slot = Some(task);
            }
            Err(e) => error!("Failed to start watchdog: {e}"),
        }
    }

    fn stop_watchdog(&self) {
        let task = safe_lock(&self.watchdog, "watchdog").take();
        if let Some(task) = task {
            task.stop();
            info!("Watchdog stopped");
        }
    }

    /// The full name plus, for composite titles, each trimmed fragment with
    /// aliases applied. Fragments shorter than `min_fragment_len` are dropped
    /// unless an alias maps them.
    fn blocked_names(&self, name: &str) -> Vec<String> {
        let mut names = vec![name.to_string()];
        if !name.contains(self.title_separator.as_str()) {
            return names;
        }
        for fragment in name.split(self.title_separator.as_str()) {
            let fragment = fragment.trim();
            if fragment.is_empty() {
                continue;
            }
            let alias = self
                .aliases
                .iter()
                .find(|alias| fragment.contains(alias.token.as_str()));
            let resolved = match alias {
                Some(alias) => alias.executable.as_str(),
                None if fragment.chars().count() < self.shared.min_fragment_len => {
                    debug!("Fragment '{fragment}' of '{name}' is too short to block");
                    continue;
                }
                None => fragment,
            };
            if !names.iter().any(|n| n == resolved) {
                names.push(resolved.to_string());
            }
        }
        names
    }
}

fn breach_message(app: &TrackedApplication, breach: &Breach) -> String {
    match &breach.target {
        QuotaTarget::Application(_) => format!(
            "{} has exceeded its {} limit ({} used).",
            app.name,
            breach.kind,
            format_duration(breach.usage)
        ),
        QuotaTarget::Group(group) => format!(
            "{} has exceeded the {} limit of group {group} ({} used).",
            app.name,
            breach.kind,
            format_duration(breach.usage)
        ),
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
