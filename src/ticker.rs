use crate::error::EngineError;
use log::{debug, error};
use std::ops::ControlFlow;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct PeriodicTask {
    name: String,
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn a thread that calls `tick` every `interval`, first after one
    /// full interval.
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self, EngineError>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                loop {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    if tick().is_break() {
                        debug!("{thread_name} finished");
                        break;
                    }

                    deadline = next_deadline(deadline, interval, Instant::now(), &thread_name);
                }
            })?;

        Ok(Self {
            name: name.to_string(),
            stop_tx,
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the thread has exited, either because it was stopped or
    /// because the closure asked to finish.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the thread and wait for the tick in progress, if any, to end.
    pub fn stop(self) {
        // A closed channel also wakes the thread, so a failed send is fine
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            error!("{} thread panicked", self.name);
        }
    }
}

fn next_deadline(previous: Instant, interval: Duration, now: Instant, name: &str) -> Instant {
    let mut deadline = previous + interval;
    let mut skipped = 0u32;
    while deadline <= now {
        deadline += interval;
        skipped += 1;
    }
    if skipped > 0 {
        debug!("{name} overran its interval, skipped {skipped} tick(s)");
    }
    deadline
}
