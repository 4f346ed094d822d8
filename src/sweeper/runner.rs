//! Background loop that runs a [`Sweeper`] on a fixed interval.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::engine::Sweeper;
use super::protected::panic_message;
use super::stats::SweepStats;
use crate::error::{Result, SweeperError};

/// Shortest interval the loop will honor
pub const MIN_INTERVAL: Duration = Duration::from_secs(5);

/// Delay before the first sweep after `start`
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Name given to the loop thread
pub const THREAD_NAME: &str = "retention-sweeper";

/// Timing for the background loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    interval: Duration,
    initial_delay: Duration,
}

impl RunnerOptions {
    /// `interval` is floored to [`MIN_INTERVAL`]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

/// Lifecycle of a [`Runner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// One-shot stop flag that sleepers can wait on
#[derive(Debug, Default)]
struct StopSignal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    fn raise(&self) {
        *lock(&self.raised) = true;
        self.cond.notify_all();
    }

    fn is_raised(&self) -> bool {
        *lock(&self.raised)
    }

    /// Sleep up to `timeout`; returns true if the signal was raised
    fn wait(&self, timeout: Duration) -> bool {
        let guard = lock(&self.raised);
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the runner and its loop threads
#[derive(Default)]
struct Shared {
    /// Held for the duration of each sweep so loop generations never overlap
    pass_guard: Mutex<()>,
    last_stats: Mutex<Option<SweepStats>>,
    sweeps_completed: AtomicU64,
}

struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<StopSignal>,
    /// Disconnects when the loop thread exits
    done: Receiver<()>,
}

/// Owns the background sweep loop.
pub struct Runner {
    sweeper: Arc<Sweeper>,
    options: RunnerOptions,
    state: RunnerState,
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl Runner {
    pub fn new(sweeper: Arc<Sweeper>, options: RunnerOptions) -> Self {
        Self {
            sweeper,
            options,
            state: RunnerState::Stopped,
            shared: Arc::new(Shared::default()),
            worker: None,
        }
    }

    /// Spawn the loop. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.state == RunnerState::Running {
            return Ok(());
        }

        if let Some(old) = self.worker.take() {
            if old.handle.is_finished() {
                let _ = old.handle.join();
            } else {
                // Left over from a timed-out stop; it exits after its sweep
                tracing::warn!("Previous sweep loop still finishing, starting a new one");
            }
        }

        self.state = RunnerState::Starting;

        let stop = Arc::new(StopSignal::default());
        let (done_tx, done) = mpsc::channel::<()>();
        let sweeper = Arc::clone(&self.sweeper);
        let shared = Arc::clone(&self.shared);
        let options = self.options;
        let loop_stop = Arc::clone(&stop);

        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let _done = done_tx;
                run_loop(|| sweeper.cleanup_once(), &shared, &loop_stop, options);
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker { handle, stop, done });
                self.state = RunnerState::Running;
                tracing::info!(
                    interval_secs = options.interval.as_secs(),
                    roots = self.sweeper.policy().len(),
                    "Sweeper started"
                );
                Ok(())
            }
            Err(e) => {
                self.state = RunnerState::Stopped;
                Err(SweeperError::io(THREAD_NAME, e))
            }
        }
    }

    /// Signal the loop to stop and wait up to `timeout` for it to exit.
    ///
    /// A sweep already in progress is allowed to finish. Returns false if the
    /// loop did not exit in time; the thread is then left to finish on its
    /// own.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        let Some(worker) = self.worker.take() else {
            self.state = RunnerState::Stopped;
            return true;
        };

        self.state = RunnerState::Stopping;
        worker.stop.raise();

        match worker.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                let _ = worker.handle.join();
                self.state = RunnerState::Stopped;
                tracing::info!("Sweeper stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Sweeper did not stop in time"
                );
                // Keep the handle so a later start can reap it
                self.worker = Some(worker);
                false
            }
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunnerState::Running
    }

    pub fn options(&self) -> RunnerOptions {
        self.options
    }

    /// Stats of the most recent completed sweep
    pub fn last_stats(&self) -> Option<SweepStats> {
        *lock(&self.shared.last_stats)
    }

    pub fn sweeps_completed(&self) -> u64 {
        self.shared.sweeps_completed.load(Ordering::SeqCst)
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop.raise();
        }
    }
}

fn run_loop<F>(sweep: F, shared: &Shared, stop: &StopSignal, options: RunnerOptions)
where
    F: Fn() -> SweepStats,
{
    if stop.wait(options.initial_delay) {
        return;
    }

    while !stop.is_raised() {
        {
            let _pass = lock(&shared.pass_guard);
            match panic::catch_unwind(AssertUnwindSafe(&sweep)) {
                Ok(stats) => {
                    *lock(&shared.last_stats) = Some(stats);
                }
                Err(payload) => {
                    tracing::error!(panic = %panic_message(&*payload), "Sweep panicked");
                }
            }
            shared.sweeps_completed.fetch_add(1, Ordering::SeqCst);
        }

        if stop.wait(options.interval) {
            break;
        }
    }
}
