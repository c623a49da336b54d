use crate::accumulator::{UsageAccumulator, UsageRecord};
use crate::clock::{elapsed_between, Clock};
use crate::config::EngineConfig;
use crate::constants::UNKNOWN_APP_NAME;
use crate::enforcement::{EnforcementController, EnforcementSettings};
use crate::error::EngineError;
use crate::models::{AppKey, QuotaTarget, TrackedApplication};
use crate::notify::Notifier;
use crate::platform::{FocusedWindow, ProcessControl, WindowProbe};
use crate::quota::{QuotaStore, UsageSource};
use crate::safe_lock;
use crate::store::{UsageSnapshot, UsageStore};
use crate::ticker::PeriodicTask;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Collaborators injected by the host.
pub struct MonitorDeps {
    pub probe: Arc<dyn WindowProbe>,
    pub processes: Arc<dyn ProcessControl>,
    pub store: Arc<dyn UsageStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// Usage of one limited group, as shown in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUsage {
    pub name: String,
    pub member_count: usize,
    pub total: Duration,
}

/// Raw data for a usage report. Formatting is left to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    pub monitoring_started: Option<NaiveDateTime>,
    pub last_update: Option<NaiveDateTime>,
    pub monitoring_time: Duration,
    pub applications: Vec<UsageRecord>,
    pub groups: Vec<GroupUsage>,
}

struct LoopState {
    active: Option<AppKey>,
    current_date: NaiveDate,
    /// Persisted usage for `current_date` not yet merged into the accumulator.
    carried_over: HashMap<AppKey, Duration>,
    monitoring_started: Option<NaiveDateTime>,
    last_update: Option<NaiveDateTime>,
}

/// Everything the periodic tasks touch.
struct Engine {
    probe: Arc<dyn WindowProbe>,
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
    accumulator: UsageAccumulator,
    quotas: QuotaStore,
    enforcement: EnforcementController,
    state: Mutex<LoopState>,
    /// Serializes store writes. Always taken before `state`.
    flush_lock: Mutex<()>,
}

impl Engine {
    fn load_carried_over(&self, date: NaiveDate) -> HashMap<AppKey, Duration> {
        match self.store.load_carried_over(date) {
            Ok(saved) => {
                debug!("Loaded carried-over usage for {} application(s) on {date}", saved.len());
                saved
            }
            Err(e) => {
                warn!("Failed to load carried-over usage for {date}: {e}");
                HashMap::new()
            }
        }
    }

    fn poll_once(&self) {
        let now = self.clock.now();
        self.check_rollover(now);

        let Some(window) = self.probe.focused_window() else {
            return;
        };
        let app = identify(window);
        let key = app.key();

        {
            let mut state = safe_lock(&self.state, "monitor state");
            if state.active.as_ref() == Some(&key) {
                self.accumulator.ensure(&app, None);
            } else {
                if let Some(previous) = state.active.take() {
                    self.accumulator.stop(&previous);
                }
                let carried_over = state.carried_over.remove(&key);
                if self.accumulator.ensure(&app, carried_over) {
                    debug!("Tracking {app}");
                }
                self.accumulator.start(&key);
                state.active = Some(key.clone());
            }
            state.last_update = Some(now);
        }

        let evaluation = self.quotas.evaluate(&key, now, &self.accumulator);
        self.enforcement.apply(&app, &evaluation);
    }

    /// Close the previous day if the calendar date changed since the last
    /// tick: commit at midnight, flush, clear, and load the new day's
    /// carry-over.
    fn check_rollover(&self, now: NaiveDateTime) {
        let today = now.date();
        if safe_lock(&self.state, "monitor state").current_date == today {
            return;
        }

        let _writing = safe_lock(&self.flush_lock, "usage flush");
        {
            let mut state = safe_lock(&self.state, "monitor state");
            if state.current_date == today {
                return;
            }

            info!("Day rolled over from {} to {today}", state.current_date);
            let midnight = state
                .current_date
                .succ_opt()
                .map_or(now, |next| next.and_time(NaiveTime::MIN))
                .min(now);
            self.accumulator.stop_all_at(midnight);
            let snapshot = UsageSnapshot {
                date: state.current_date,
                records: self.accumulator.snapshot(),
            };
            if let Err(e) = self.store.flush(&snapshot) {
                error!("Failed to flush usage for {}: {e}", snapshot.date);
            }
            self.accumulator.clear();

            state.active = None;
            state.current_date = today;
            state.carried_over = self.load_carried_over(today);
        }
        self.enforcement.forget_unblocked();
    }

    fn flush(&self) -> Result<(), EngineError> {
        let _writing = safe_lock(&self.flush_lock, "usage flush");
        let snapshot = {
            let state = safe_lock(&self.state, "monitor state");
            UsageSnapshot {
                date: state.current_date,
                records: self.accumulator.snapshot(),
            }
        };
        self.store.flush(&snapshot)?;
        debug!(
            "Flushed usage for {} application(s) on {}",
            snapshot.records.len(),
            snapshot.date
        );
        Ok(())
    }

    fn commit_sessions(&self) {
        self.accumulator.stop_all();
        safe_lock(&self.state, "monitor state").active = None;
    }
}

fn identify(window: FocusedWindow) -> TrackedApplication {
    let title = window.title.trim();
    let name = if title.is_empty() {
        UNKNOWN_APP_NAME
    } else {
        title
    };
    TrackedApplication::new(name, window.process_id, window.executable_path)
}

pub struct Monitor {
    engine: Arc<Engine>,
    poll_interval: Duration,
    flush_interval: Duration,
    monitoring: AtomicBool,
    poller: Mutex<Option<PeriodicTask>>,
    flusher: Mutex<Option<PeriodicTask>>,
}

impl Monitor {
    pub fn new(config: &EngineConfig, deps: MonitorDeps) -> Self {
        let today = deps.clock.now().date();
        let engine = Engine {
            probe: deps.probe,
            store: deps.store,
            accumulator: UsageAccumulator::new(Arc::clone(&deps.clock)),
            clock: deps.clock,
            quotas: QuotaStore::new(),
            enforcement: EnforcementController::new(
                EnforcementSettings::from(config),
                deps.processes,
                deps.notifier,
            ),
            state: Mutex::new(LoopState {
                active: None,
                current_date: today,
                carried_over: HashMap::new(),
                monitoring_started: None,
                last_update: None,
            }),
            flush_lock: Mutex::new(()),
        };
        let carried_over = engine.load_carried_over(today);
        safe_lock(&engine.state, "monitor state").carried_over = carried_over;

        Self {
            engine: Arc::new(engine),
            poll_interval: config.poll_interval(),
            flush_interval: config.flush_interval(),
            monitoring: AtomicBool::new(false),
            poller: Mutex::new(None),
            flusher: Mutex::new(None),
        }
    }

    /// Start the poller and flusher. No-op if already monitoring.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.monitoring.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let now = self.engine.clock.now();
        safe_lock(&self.engine.state, "monitor state").monitoring_started = Some(now);

        let engine = Arc::clone(&self.engine);
        let poller = PeriodicTask::spawn("usage-poller", self.poll_interval, move || {
            engine.poll_once();
            ControlFlow::Continue(())
        });
        let poller = match poller {
            Ok(task) => task,
            Err(e) => {
                self.monitoring.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let engine = Arc::clone(&self.engine);
        let flusher = PeriodicTask::spawn("usage-flush", self.flush_interval, move || {
            if let Err(e) = engine.flush() {
                error!("Periodic usage flush failed: {e}");
            }
            ControlFlow::Continue(())
        });
        let flusher = match flusher {
            Ok(task) => task,
            Err(e) => {
                poller.stop();
                self.monitoring.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        *safe_lock(&self.poller, "poller") = Some(poller);
        *safe_lock(&self.flusher, "flusher") = Some(flusher);
        info!("Monitoring started");
        Ok(())
    }

    /// Stop polling, commit every running session and flush.
    ///
    /// The watchdog keeps running while anything is blocked.
    pub fn stop(&self) {
        if self.monitoring.swap(false, Ordering::SeqCst) {
            self.halt_tasks();
            info!("Monitoring stopped");
        }
        self.engine.commit_sessions();
        if let Err(e) = self.engine.flush() {
            error!("Failed to flush usage on stop: {e}");
        }
    }

    /// Stop monitoring and the watchdog. Call before the process exits.
    pub fn shutdown(&self) {
        self.stop();
        self.engine.enforcement.shutdown();
        info!("Shut down");
    }

    fn halt_tasks(&self) {
        let poller = safe_lock(&self.poller, "poller").take();
        if let Some(task) = poller {
            task.stop();
        }
        let flusher = safe_lock(&self.flusher, "flusher").take();
        if let Some(task) = flusher {
            task.stop();
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// One polling step: rollover check, probe, focus switch, evaluation and
    /// enforcement.
    pub fn poll_once(&self) {
        self.engine.poll_once();
    }

    pub fn flush(&self) -> Result<(), EngineError> {
        self.engine.flush()
    }

    pub fn current_total(&self, app: &AppKey) -> Duration {
        self.engine.accumulator.current_total(app)
    }

    /// Every application tracked today, with its current total.
    pub fn tracked_applications(&self) -> Vec<UsageRecord> {
        self.engine.accumulator.snapshot()
    }

    pub fn report(&self) -> UsageReport {
        let (monitoring_started, last_update) = {
            let state = safe_lock(&self.engine.state, "monitor state");
            (state.monitoring_started, state.last_update)
        };
        let monitoring_time = monitoring_started
            .zip(last_update)
            .map_or(Duration::ZERO, |(start, end)| elapsed_between(start, end));

        let groups = self
            .engine
            .quotas
            .groups()
            .into_iter()
            .filter(|group| {
                self.engine
                    .quotas
                    .limit(&QuotaTarget::Group(group.name.clone()))
                    .is_some()
            })
            .map(|group| GroupUsage {
                total: self.engine.accumulator.usage_of_group(&group),
                member_count: group.len(),
                name: group.name,
            })
            .collect();

        UsageReport {
            monitoring_started,
            last_update,
            monitoring_time,
            applications: self.tracked_applications(),
            groups,
        }
    }

    pub fn quotas(&self) -> &QuotaStore {
        &self.engine.quotas
    }

    pub fn enforcement(&self) -> &EnforcementController {
        &self.engine.enforcement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MonitorMode;
    use crate::enforcement::EnforcementState;
    use crate::models::LimitRule;
    use crate::notify::NotificationCategory;
    use crate::test_utils::{
        monday, FakeProbe, FakeProcesses, Journal, MemoryStore, RecordingNotifier,
    };
    use std::thread;

    struct Fixture {
        clock: Arc<ManualClock>,
        probe: Arc<FakeProbe>,
        processes: Arc<FakeProcesses>,
        notifier: Arc<RecordingNotifier>,
        store: Arc<MemoryStore>,
        journal: Journal,
        monitor: Monitor,
    }

    fn setup_with(config: EngineConfig, store: MemoryStore, start: NaiveDateTime) -> Fixture {
        let journal = Journal::default();
        let clock = Arc::new(ManualClock::new(start));
        let probe = Arc::new(FakeProbe::new());
        let processes = Arc::new(FakeProcesses::new(journal.clone()));
        let notifier = Arc::new(RecordingNotifier::new(journal.clone()));
        let store = Arc::new(store);

        let monitor = Monitor::new(
            &config,
            MonitorDeps {
                probe: Arc::clone(&probe) as Arc<dyn WindowProbe>,
                processes: Arc::clone(&processes) as Arc<dyn ProcessControl>,
                store: Arc::clone(&store) as Arc<dyn UsageStore>,
                notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
                clock: Arc::clone(&clock) as Arc<dyn Clock>,
            },
        );

        Fixture {
            clock,
            probe,
            processes,
            notifier,
            store,
            journal,
            monitor,
        }
    }

    fn setup() -> Fixture {
        setup_with(EngineConfig::default(), MemoryStore::new(), monday(9, 0, 0))
    }

    fn tick(f: &Fixture, secs: u64) {
        for _ in 0..secs {
            f.monitor.poll_once();
            f.clock.advance(Duration::from_secs(1));
        }
    }

    #[test]
    fn test_focus_switch_accumulates_per_application() {
        let f = setup();
        let editor = AppKey::new("Editor");
        let terminal = AppKey::new("Terminal");

        f.probe.focus(10, "Editor");
        tick(&f, 10);
        f.probe.focus(20, "Terminal");
        tick(&f, 5);
        f.probe.focus(10, "Editor");
        tick(&f, 5);
        f.monitor.poll_once();

        assert_eq!(f.monitor.current_total(&editor), Duration::from_secs(15));
        assert_eq!(f.monitor.current_total(&terminal), Duration::from_secs(5));
        assert_eq!(f.monitor.tracked_applications().len(), 2);
    }

    #[test]
    fn test_no_focus_keeps_current_session() {
        let f = setup();
        f.probe.focus(10, "Editor");
        f.monitor.poll_once();

        f.probe.clear();
        f.clock.advance(Duration::from_secs(30));
        f.monitor.poll_once();

        assert_eq!(f.monitor.current_total(&AppKey::new("Editor")), Duration::from_secs(30));
    }

    #[test]
    fn test_empty_title_is_unknown() {
        let f = setup();
        f.probe.focus(10, "   ");
        f.monitor.poll_once();

        let tracked = f.monitor.tracked_applications();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].application.name, UNKNOWN_APP_NAME);
    }

    #[test]
    fn test_identity_includes_executable_path() {
        let f = setup();
        f.probe.focus_with_path(10, "Editor", "/usr/bin/editor");
        tick(&f, 5);
        f.probe.focus_with_path(11, "Editor", "/opt/editor");
        tick(&f, 5);
        f.probe.focus_with_path(12, "Editor", "/usr/bin/editor");
        f.monitor.poll_once();

        let usr = AppKey::with_path("Editor", "/usr/bin/editor");
        assert_eq!(f.monitor.current_total(&usr), Duration::from_secs(5));
        let tracked = f.monitor.tracked_applications();
        assert_eq!(tracked.len(), 2);
        assert!(tracked.iter().any(|r| r.application.process_id == 12));
    }

    #[test]
    fn test_carried_over_usage_seeds_first_sighting() {
        let store = MemoryStore::new().with_carried_over(
            monday(0, 0, 0).date(),
            AppKey::new("Editor"),
            Duration::from_secs(100),
        );
        let f = setup_with(EngineConfig::default(), store, monday(9, 0, 0));

        f.probe.focus(10, "Editor");
        tick(&f, 5);
        f.probe.focus(20, "Terminal");
        tick(&f, 1);
        f.probe.focus(10, "Editor");
        tick(&f, 1);

        assert_eq!(f.monitor.current_total(&AppKey::new("Editor")), Duration::from_secs(106));
    }

    #[test]
    fn test_carry_over_load_failure_is_not_fatal() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let f = setup_with(EngineConfig::default(), store, monday(9, 0, 0));

        f.probe.focus(10, "Editor");
        tick(&f, 3);
        assert_eq!(f.monitor.current_total(&AppKey::new("Editor")), Duration::from_secs(3));
    }

    #[test]
    fn test_day_rollover_flushes_and_clears() {
        let f = setup_with(EngineConfig::default(), MemoryStore::new(), monday(23, 59, 50));
        let editor = AppKey::new("Editor");

        f.probe.focus(10, "Editor");
        tick(&f, 10); // 23:59:50 .. 23:59:59, clock now at midnight
        f.monitor.poll_once();

        let flushed = f.store.last_flush().unwrap();
        assert_eq!(flushed.date, monday(0, 0, 0).date());
        assert_eq!(flushed.records.len(), 1);
        assert_eq!(flushed.records[0].total, Duration::from_secs(10));

        // The new day starts from zero and the session resumes
        assert_eq!(f.monitor.current_total(&editor), Duration::ZERO);
        f.clock.advance(Duration::from_secs(5));
        assert_eq!(f.monitor.current_total(&editor), Duration::from_secs(5));
    }

    #[test]
    fn test_rollover_without_focus() {
        let f = setup_with(EngineConfig::default(), MemoryStore::new(), monday(23, 59, 0));
        f.probe.focus(10, "Editor");
        f.monitor.poll_once();

        f.probe.clear();
        f.clock.advance(Duration::from_secs(120));
        f.monitor.poll_once();

        // Only the minute before midnight belongs to the old day
        let flushed = f.store.last_flush().unwrap();
        assert_eq!(flushed.date, monday(0, 0, 0).date());
        assert_eq!(flushed.records[0].total, Duration::from_secs(60));
        assert!(f.monitor.tracked_applications().is_empty());
    }

    #[test]
    fn test_rollover_drops_warning_state() {
        let f = setup_with(EngineConfig::default(), MemoryStore::new(), monday(23, 0, 0));
        let editor = AppKey::new("Editor");
        f.monitor
            .quotas()
            .set_limit(
                QuotaTarget::Application(editor.clone()),
                LimitRule::daily(Duration::from_secs(3600), f.clock.now()),
            )
            .unwrap();

        f.probe.focus(10, "Editor");
        f.monitor.poll_once();
        f.clock.advance(Duration::from_secs(3500));
        f.monitor.poll_once();
        assert_eq!(f.monitor.enforcement().state_of(&editor), EnforcementState::Warned);

        f.probe.clear();
        f.clock.advance(Duration::from_secs(200));
        f.monitor.poll_once();
        assert_eq!(f.monitor.enforcement().state_of(&editor), EnforcementState::Unrestricted);
    }

    #[test]
    fn test_slow_flush_does_not_stall_polling() {
        let f = setup();
        f.probe.focus(10, "Editor");
        f.monitor.poll_once();
        f.store.set_flush_delay(Duration::from_millis(600));

        thread::scope(|s| {
            let flushing = s.spawn(|| f.monitor.flush());
            for _ in 0..200 {
                if f.store.is_flushing() {
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
            assert!(f.store.is_flushing());

            let started = std::time::Instant::now();
            f.clock.advance(Duration::from_secs(1));
            f.monitor.poll_once();
            assert!(started.elapsed() < Duration::from_millis(300));

            assert!(flushing.join().unwrap().is_ok());
        });
        assert_eq!(f.store.flushes().len(), 1);
    }

    #[test]
    fn test_flush_includes_running_session() {
        let f = setup();
        f.probe.focus(10, "Editor");
        tick(&f, 30);

        f.monitor.flush().unwrap();
        let flushed = f.store.last_flush().unwrap();
        assert_eq!(flushed.date, monday(0, 0, 0).date());
        assert_eq!(flushed.records[0].total, Duration::from_secs(30));
    }

    #[test]
    fn test_flush_failure_is_reported() {
        let f = setup();
        f.store.set_failing(true);
        assert!(f.monitor.flush().is_err());
    }

    #[test]
    fn test_end_to_end_strict_daily_limit() {
        let config = EngineConfig {
            mode: MonitorMode::Strict,
            warning_threshold_secs: 300,
            watchdog_interval_ms: 50,
            ..EngineConfig::default()
        };
        let f = setup_with(config, MemoryStore::new(), monday(8, 0, 0));
        f.monitor
            .quotas()
            .set_limit(
                QuotaTarget::Application(AppKey::new("Editor")),
                LimitRule::daily(Duration::from_secs(3000), f.clock.now()),
            )
            .unwrap();

        f.processes.launch(10, "editor");
        f.probe.focus(10, "Editor");

        tick(&f, 3001);
        assert_eq!(f.notifier.count(NotificationCategory::Warning), 30);
        assert_eq!(f.notifier.count(NotificationCategory::Breach), 0);

        // Usage reaches 3001s on this tick
        tick(&f, 1);
        assert_eq!(f.notifier.count(NotificationCategory::Breach), 1);

        let warnings = f.notifier.notifications();
        assert!(warnings[0].message.contains("5m 0s"));

        let breach_at = f.journal.position("notify:breach").unwrap();
        let terminate_at = f.journal.position("terminate:10").unwrap();
        assert_eq!(terminate_at, breach_at + 1);
        assert!(!f.processes.is_running(10));
        assert!(f.monitor.enforcement().is_watchdog_running());
        assert_eq!(f.monitor.enforcement().blocked(), vec!["Editor".to_string()]);

        // Remaining ticks of the hour: no further breach notifications
        tick(&f, 598);
        assert_eq!(f.notifier.count(NotificationCategory::Breach), 1);

        f.monitor.shutdown();
        assert!(!f.monitor.enforcement().is_watchdog_running());
    }

    #[test]
    fn test_group_breach_attributed_to_focused_app() {
        let f = setup();
        let quotas = f.monitor.quotas();
        quotas.create_group("Games").unwrap();
        quotas.add_to_group("Games", AppKey::new("Chess")).unwrap();
        quotas.add_to_group("Games", AppKey::new("Solitaire")).unwrap();
        quotas
            .set_limit(
                QuotaTarget::Group("Games".into()),
                LimitRule::daily(Duration::from_secs(3600), f.clock.now()),
            )
            .unwrap();

        f.probe.focus(1, "Chess");
        f.monitor.poll_once();
        f.clock.advance(Duration::from_secs(35 * 60));
        f.probe.focus(2, "Solitaire");
        f.monitor.poll_once();
        f.clock.advance(Duration::from_secs(25 * 60));
        f.monitor.poll_once();
        assert_eq!(f.notifier.count(NotificationCategory::Breach), 0);

        f.clock.advance(Duration::from_secs(60));
        f.monitor.poll_once();

        let notes = f.notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.starts_with("Solitaire"));
        assert!(notes[0].message.contains("group Games"));
        assert!(f.processes.terminated().is_empty());
    }

    #[test]
    fn test_report() {
        let f = setup();
        let quotas = f.monitor.quotas();
        quotas.create_group("Work").unwrap();
        quotas.add_to_group("Work", AppKey::new("Editor")).unwrap();
        quotas.add_to_group("Work", AppKey::new("Terminal")).unwrap();
        quotas.create_group("Unlimited").unwrap();
        quotas
            .set_limit(
                QuotaTarget::Group("Work".into()),
                LimitRule::weekly(Duration::from_secs(40 * 3600), f.clock.now()),
            )
            .unwrap();

        f.monitor.start().unwrap();
        f.monitor.stop();

        f.probe.focus(10, "Editor");
        tick(&f, 20);
        f.probe.focus(20, "Terminal");
        tick(&f, 10);
        f.monitor.poll_once();

        let report = f.monitor.report();
        assert_eq!(report.monitoring_started, Some(monday(9, 0, 0)));
        assert_eq!(report.last_update, Some(monday(9, 0, 30)));
        assert_eq!(report.monitoring_time, Duration::from_secs(30));
        assert_eq!(report.applications.len(), 2);
        assert_eq!(report.applications[0].application.name, "Editor");
        assert_eq!(
            report.groups,
            vec![GroupUsage {
                name: "Work".into(),
                member_count: 2,
                total: Duration::from_secs(30),
            }]
        );
    }

    #[test]
    fn test_start_stop_commits_sessions() {
        let config = EngineConfig {
            poll_interval_ms: 10,
            ..EngineConfig::default()
        };
        let f = setup_with(config, MemoryStore::new(), monday(9, 0, 0));
        let editor = AppKey::new("Editor");
        f.probe.focus(10, "Editor");

        f.monitor.start().unwrap();
        assert!(f.monitor.is_monitoring());
        f.monitor.start().unwrap();

        for _ in 0..200 {
            if f.monitor.tracked_applications().len() == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        f.clock.advance(Duration::from_secs(30));
        f.monitor.stop();

        assert!(!f.monitor.is_monitoring());
        assert_eq!(f.monitor.current_total(&editor), Duration::from_secs(30));
        let flushed = f.store.last_flush().unwrap();
        assert_eq!(flushed.records[0].total, Duration::from_secs(30));

        // Nothing runs after stop
        f.clock.advance(Duration::from_secs(30));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(f.monitor.current_total(&editor), Duration::from_secs(30));
    }

    #[test]
    fn test_watchdog_outlives_monitoring() {
        let config = EngineConfig {
            mode: MonitorMode::Strict,
            watchdog_interval_ms: 20,
            ..EngineConfig::default()
        };
        let f = setup_with(config, MemoryStore::new(), monday(9, 0, 0));
        f.monitor
            .quotas()
            .set_limit(
                QuotaTarget::Application(AppKey::new("Game")),
                LimitRule::daily(Duration::from_secs(5), f.clock.now()),
            )
            .unwrap();

        f.probe.focus(30, "Game");
        tick(&f, 7);
        f.monitor.stop();
        assert!(f.monitor.enforcement().is_watchdog_running());

        f.processes.launch(31, "game");
        for _ in 0..200 {
            if !f.processes.is_running(31) {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!f.processes.is_running(31));

        f.monitor.enforcement().unblock("Game");
        assert!(!f.monitor.enforcement().is_watchdog_running());
    }
}
