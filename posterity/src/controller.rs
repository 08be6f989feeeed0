use std::sync::{Arc, LazyLock};

use posterity_common::{Signal, internal, logging};
use posterity_delivery::{
    DeliveryScheduler, NotifierConfig, Receipt, RunSummary, due_window,
    notifier::{self, ConfigurationStatus},
};
use posterity_store::{DeliveryStatus, Letter, LetterId, RecordStore, StoreConfig};
use serde::Deserialize;
use tokio::sync::broadcast;

/// Top-level configuration, and the owner of everything it configures
///
/// ```ron
/// Posterity (
///     store: File(path: "/var/lib/posterity"),
///     notifier: Log,
///     scheduler: (schedule: "0 0 0 * * *", timezone: "UTC"),
/// )
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Posterity {
    #[serde(default)]
    store: StoreConfig,
    #[serde(alias = "email", default)]
    notifier: NotifierConfig,
    #[serde(alias = "delivery", default)]
    scheduler: DeliveryScheduler,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

/// A letter together with how it should be presented to its owner
#[derive(Debug)]
pub struct LetterReport {
    pub letter: Letter,
    pub status: DeliveryStatus,
}

impl std::fmt::Display for LetterReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = &self.letter;
        writeln!(f, "Letter:       {}", letter.id)?;
        writeln!(f, "Title:        {}", letter.title.as_deref().unwrap_or("(untitled)"))?;
        writeln!(f, "Due:          {}", letter.due_at.to_rfc3339())?;
        writeln!(f, "Status:       {}", self.status)?;
        writeln!(f, "State:        {}", letter.state())?;
        writeln!(f, "Retries:      {}", letter.retry_count())?;
        if let Some(at) = letter.delivered_at() {
            writeln!(f, "Delivered at: {}", at.to_rfc3339())?;
        }
        if let Some(error) = letter.last_error() {
            writeln!(f, "Last error:   {error}")?;
        }
        Ok(())
    }
}

impl Posterity {
    /// Build the store and notifier, and hand them to the scheduler
    fn prepare(self) -> anyhow::Result<Arc<DeliveryScheduler>> {
        let store = self.store.into_store()?;
        let notifier = self.notifier.build()?;

        let mut scheduler = self.scheduler;
        scheduler.init(store, notifier)?;

        Ok(Arc::new(scheduler))
    }

    /// Run the recurring delivery trigger until shutdown
    ///
    /// # Errors
    ///
    /// This function will return an error if the store, notifier, or
    /// scheduler fail to initialise.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        let scheduler = self.prepare()?;

        internal!("Controller running");
        internal!(level = INFO, "Next delivery run at {}", scheduler.next_run()?);

        let ret = tokio::select! {
            r = scheduler.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(anyhow::Error::from)
            }
            r = shutdown() => {
                r
            }
        };

        internal!("Shutting down...");

        ret
    }

    /// Perform a single batch run immediately
    ///
    /// # Errors
    ///
    /// Returns an error if initialisation fails or the run cannot scan the store
    pub async fn run_now(self) -> anyhow::Result<RunSummary> {
        let scheduler = self.prepare()?;
        Ok(scheduler.run_batch_now().await?)
    }

    /// Report which email settings are usable, if email delivery is configured
    pub fn email_config(&self) -> Option<ConfigurationStatus> {
        match &self.notifier {
            NotifierConfig::Resend(config) => Some(config.status()),
            NotifierConfig::Log => None,
        }
    }

    /// Send a test letter through the configured notifier
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the notifier fails
    pub async fn send_test_email(&self, address: &str) -> anyhow::Result<Receipt> {
        let notifier = self.notifier.build()?;
        let receipt =
            notifier::send_test_letter(notifier.as_ref(), address, self.scheduler.timezone).await?;
        Ok(receipt)
    }

    /// Look up a letter and its owner-facing delivery status
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the letter does not exist
    pub async fn letter_status(self, id: LetterId) -> anyhow::Result<LetterReport> {
        let store: Arc<dyn RecordStore> = self.store.into_store()?;
        let letter = store.get_letter(&id).await?;

        let today = due_window(chrono::Utc::now(), self.scheduler.timezone);
        let status = letter.status(today.start);

        Ok(LetterReport { letter, status })
    }
}
