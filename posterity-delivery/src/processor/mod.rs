//! Delivery scheduler orchestration

pub mod attempt;
pub mod batch;
pub mod cadence;
pub mod scan;

use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::FutureExt;
use posterity_common::{Signal, internal};
use posterity_store::RecordStore;
use serde::Deserialize;
use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::{
    clock::{Clock, SystemClock},
    error::{DeliveryError, panic_message},
    notifier::Notifier,
    types::{DriverState, RunSummary, Trigger},
};

fn default_schedule() -> String {
    "0 0 0 * * *".to_string()
}

const fn default_timezone() -> Tz {
    chrono_tz::UTC
}

const fn default_notifier_timeout() -> u64 {
    30
}

fn default_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Clears the running flag when a run ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Scheduler for delivering letters when they fall due
///
/// Batch runs come from two triggers: the recurring cadence (see
/// [`DeliveryScheduler::serve`]) and [`DeliveryScheduler::run_batch_now`].
/// At most one batch runs at a time. A manual run waits for an in-flight run
/// to finish; a cadence tick that finds a run in flight is skipped.
#[derive(Debug, Deserialize)]
pub struct DeliveryScheduler {
    /// When the recurring run fires, as a cron expression with seconds
    ///
    /// Default: `"0 0 0 * * *"` (every day at midnight)
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// Reference time zone for the cadence and for deciding what "today" is
    ///
    /// Default: UTC
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    /// How long a single notifier call may take before it counts as failed
    /// (in seconds)
    ///
    /// Default: 30
    #[serde(default = "default_notifier_timeout")]
    pub notifier_timeout_secs: u64,

    /// The record store (initialized in `init()`)
    #[serde(skip)]
    pub(crate) store: Option<Arc<dyn RecordStore>>,

    /// The notifier (initialized in `init()`)
    #[serde(skip)]
    pub(crate) notifier: Option<Arc<dyn Notifier>>,

    /// Parsed form of `schedule` (initialized in `init()`)
    #[serde(skip)]
    cadence: Option<cron::Schedule>,

    #[serde(skip, default = "default_clock")]
    pub(crate) clock: Arc<dyn Clock>,

    /// Held for the duration of every batch run
    #[serde(skip)]
    run_lock: Mutex<()>,

    #[serde(skip)]
    running: AtomicBool,

    #[serde(skip)]
    started: AtomicBool,
}

impl Default for DeliveryScheduler {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            timezone: default_timezone(),
            notifier_timeout_secs: default_notifier_timeout(),
            store: None,
            notifier: None,
            cadence: None,
            clock: default_clock(),
            run_lock: Mutex::new(()),
            running: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }
}

impl DeliveryScheduler {
    /// Replace the source of "now"
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Initialize the delivery scheduler
    ///
    /// # Errors
    ///
    /// Returns an error if `schedule` is not a valid cron expression
    pub fn init(
        &mut self,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(), DeliveryError> {
        internal!("Initialising Delivery Scheduler ...");

        self.cadence = Some(cadence::parse_schedule(&self.schedule)?);
        self.store = Some(store);
        self.notifier = Some(notifier);

        internal!(
            "Delivery scheduler initialized with schedule={:?}, timezone={}, notifier_timeout={}s",
            self.schedule,
            self.timezone,
            self.notifier_timeout_secs
        );

        Ok(())
    }

    /// Whether a batch run is executing right now
    pub fn state(&self) -> DriverState {
        if self.running.load(Ordering::SeqCst) {
            DriverState::Running
        } else {
            DriverState::Idle
        }
    }

    /// When the recurring trigger will next fire
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler is not initialized or the schedule
    /// never fires again
    pub fn next_run(&self) -> Result<DateTime<Utc>, DeliveryError> {
        let schedule = self.cadence()?;
        cadence::next_run_after(schedule, self.clock.now(), self.timezone)
    }

    fn cadence(&self) -> Result<&cron::Schedule, DeliveryError> {
        self.cadence.as_ref().ok_or_else(|| {
            DeliveryError::NotInitialized(
                "Delivery scheduler not initialized. Call init() first.".to_string(),
            )
        })
    }

    /// Run a batch now, waiting for any in-flight run to finish first
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails or the run panics; the scheduler is
    /// left idle either way
    pub async fn run_batch_now(&self) -> Result<RunSummary, DeliveryError> {
        let _guard = self.run_lock.lock().await;
        self.execute(Trigger::Manual).await
    }

    /// Run a batch for the recurring trigger
    ///
    /// Returns `None` without running if another run is in flight.
    pub async fn run_scheduled(&self) -> Option<Result<RunSummary, DeliveryError>> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            info!("Delivery run already in progress, skipping scheduled run");
            return None;
        };

        Some(self.execute(Trigger::Scheduled).await)
    }

    /// Execute a batch run; the caller must hold `run_lock`
    async fn execute(&self, trigger: Trigger) -> Result<RunSummary, DeliveryError> {
        let _running = RunningGuard::new(&self.running);

        let result = AssertUnwindSafe(batch::run_batch_internal(self, trigger))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(DeliveryError::RunPanicked(panic_message(payload.as_ref())))
            });

        if let Err(e) = &result {
            error!(%trigger, error = %e, "Delivery run failed");
        }

        result
    }

    /// Run the recurring trigger
    ///
    /// Sleeps until the next occurrence of `schedule`, runs a batch, and
    /// repeats until a shutdown signal is received. A run in progress when
    /// the signal arrives is allowed to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler is not initialized or the schedule
    /// has no further occurrences
    pub async fn serve(
        &self,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), DeliveryError> {
        internal!("Delivery scheduler starting");

        let schedule = self.cadence()?;
        let mut last_fired: Option<DateTime<Utc>> = None;

        loop {
            let now = self.clock.now();
            let from = last_fired.map_or(now, |last| last.max(now));
            let next = cadence::next_run_after(schedule, from, self.timezone)?;
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next_run = %next, "Next delivery run scheduled");

            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    last_fired = Some(next);
                    if let Some(Ok(summary)) = self.run_scheduled().await {
                        debug!("{summary}");
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Delivery scheduler received shutdown signal");
                        }
                        Err(e) => {
                            error!("Delivery scheduler shutdown channel error: {e}");
                        }
                    }
                    break;
                }
            }
        }

        internal!("Delivery scheduler shutdown complete");
        Ok(())
    }

    /// Arm the recurring trigger on a background task
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::AlreadyStarted`] if the trigger is already
    /// armed and has not been stopped, or an error if the scheduler is not
    /// initialized
    pub fn start(self: &Arc<Self>) -> Result<SchedulerHandle, DeliveryError> {
        self.cadence()?;

        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DeliveryError::AlreadyStarted);
        }

        let (shutdown, receiver) = broadcast::channel(1);
        let scheduler = Arc::clone(self);
        let task = tokio::spawn(async move { scheduler.serve(receiver).await });

        internal!(level = INFO, "Delivery scheduler armed with schedule {:?}", self.schedule);

        Ok(SchedulerHandle {
            scheduler: Arc::clone(self),
            shutdown,
            task,
        })
    }
}

/// Owner of a running recurring trigger
#[derive(Debug)]
pub struct SchedulerHandle {
    scheduler: Arc<DeliveryScheduler>,
    shutdown: broadcast::Sender<Signal>,
    task: JoinHandle<Result<(), DeliveryError>>,
}

impl SchedulerHandle {
    /// Signal the recurring trigger to stop and wait for it to exit
    ///
    /// Once stopped, the scheduler may be started again.
    ///
    /// # Errors
    ///
    /// Returns an error if the trigger task failed
    pub async fn stop(self) -> Result<(), DeliveryError> {
        // The task may already have exited, in which case nobody is listening.
        let _ = self.shutdown.send(Signal::Shutdown);

        let joined = self.task.await;
        self.scheduler.started.store(false, Ordering::SeqCst);

        joined.map_err(|e| DeliveryError::TaskFailed(e.to_string()))?
    }
}
