//! Typed error handling for delivery operations.
//!
//! Failures are split by how far they reach:
//! - [`NotifyError`]: the notifier could not deliver one letter
//! - [`AttemptFailure`]: one attempt failed, for whatever reason; the run continues
//! - [`DeliveryError`]: the run (or the scheduler itself) could not proceed

use posterity_store::StoreError;
use thiserror::Error;

/// Failure reported by a [`crate::Notifier`].
///
/// The display form is what ends up in a letter's `last_error`.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Required notifier settings are absent or still placeholders.
    #[error("Missing email configuration: {}. Please update your configuration.", .0.join(", "))]
    NotConfigured(Vec<&'static str>),

    /// The provider refused or failed the message.
    #[error("{0}")]
    Rejected(String),

    /// The provider could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The notifier did not answer within the configured bound.
    #[error("Notifier timed out after {0}s")]
    Timeout(u64),

    /// The destination address is not syntactically valid.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Why a single delivery attempt did not end with the letter recorded as sent.
///
/// Notifier and persistence failures are counted the same way in a run
/// summary but stay distinguishable here and in the logs.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    /// The notifier reported a failure (or timed out).
    #[error(transparent)]
    Notifier(#[from] NotifyError),

    /// The notifier or the attempt itself panicked.
    #[error("Unexpected error: {0}")]
    Panicked(String),

    /// The resulting state could not be written to the store.
    #[error("Failed to record delivery state: {0}")]
    Persistence(#[from] StoreError),
}

impl AttemptFailure {
    /// Returns `true` if the failure happened while writing state back.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Errors that abort a batch run or stop the scheduler.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The due-letter query failed; nothing was attempted.
    #[error("Scan failed: {0}")]
    Scan(#[source] StoreError),

    /// The configured cadence is not a valid cron expression.
    #[error("Invalid schedule: {0}")]
    Schedule(#[from] cron::error::Error),

    /// The cadence never fires again.
    #[error("Schedule has no upcoming run")]
    NoUpcomingRun,

    /// `init()` has not been called.
    #[error("Delivery scheduler not initialized: {0}")]
    NotInitialized(String),

    /// The recurring trigger is already armed.
    #[error("Delivery scheduler already started")]
    AlreadyStarted,

    /// The batch run panicked.
    #[error("Delivery run panicked: {0}")]
    RunPanicked(String),

    /// The background scheduler task could not be joined.
    #[error("Scheduler task failed: {0}")]
    TaskFailed(String),
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_failure_detail_is_verbatim() {
        let failure = AttemptFailure::from(NotifyError::Rejected("timeout".to_string()));
        assert_eq!(failure.to_string(), "timeout");
        assert!(!failure.is_persistence());
    }

    #[test]
    fn test_not_configured_lists_settings() {
        let error = NotifyError::NotConfigured(vec!["api_key", "from"]);
        assert_eq!(
            error.to_string(),
            "Missing email configuration: api_key, from. Please update your configuration."
        );
    }

    #[test]
    fn test_persistence_failure() {
        let failure = AttemptFailure::from(StoreError::Internal("disk full".to_string()));
        assert!(failure.is_persistence());
        assert_eq!(
            failure.to_string(),
            "Failed to record delivery state: Internal error: disk full"
        );
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
