//! One delivery attempt: a single notifier call and a single state write

use std::{panic::AssertUnwindSafe, time::Duration};

use chrono_tz::Tz;
use futures_util::FutureExt;
use posterity_store::{DeliveryPatch, DueLetter, RecordStore};
use tracing::{error, info, warn};

use crate::{
    clock::Clock,
    error::{AttemptFailure, NotifyError, panic_message},
    notifier::{LetterContent, Notifier, Receipt},
    types::{AttemptOutcome, AttemptResult},
};

/// Everything an attempt needs, borrowed from the scheduler for one run
pub struct AttemptContext<'a> {
    pub store: &'a dyn RecordStore,
    pub notifier: &'a dyn Notifier,
    pub clock: &'a dyn Clock,
    pub notifier_timeout: Duration,
    pub timezone: Tz,
}

/// Call the notifier once, bounded by the configured timeout.
///
/// Panics inside the notifier are caught and reported as failures.
async fn notify(ctx: &AttemptContext<'_>, due: &DueLetter) -> Result<Receipt, AttemptFailure> {
    let content = LetterContent::new(&due.letter, ctx.timezone);
    let send = tokio::time::timeout(
        ctx.notifier_timeout,
        ctx.notifier.send(&due.recipient, &content),
    );

    match AssertUnwindSafe(send).catch_unwind().await {
        Ok(Ok(result)) => result.map_err(AttemptFailure::Notifier),
        Ok(Err(_elapsed)) => Err(AttemptFailure::Notifier(NotifyError::Timeout(
            ctx.notifier_timeout.as_secs(),
        ))),
        Err(payload) => Err(AttemptFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Attempt delivery of one due letter and persist the result.
///
/// Exactly one notifier call and one state write are made. The returned
/// outcome is `Sent` only if both succeeded.
pub async fn attempt_delivery_internal(
    ctx: &AttemptContext<'_>,
    due: &DueLetter,
) -> AttemptOutcome {
    let letter_id = due.letter.id;
    let notified = notify(ctx, due).await;

    let patch = match &notified {
        Ok(_) => DeliveryPatch::Sent {
            at: ctx.clock.now(),
        },
        Err(failure) => DeliveryPatch::Failed {
            error: failure.to_string(),
        },
    };

    let result = match (ctx.store.update_delivery_state(&letter_id, &patch).await, notified) {
        (Ok(_), Ok(receipt)) => {
            info!(
                letter_id = %letter_id,
                message_id = ?receipt.message_id,
                "Letter delivered"
            );
            AttemptResult::Sent {
                message_id: receipt.message_id,
            }
        }
        (Ok(letter), Err(failure)) => {
            warn!(
                letter_id = %letter_id,
                retry_count = letter.retry_count(),
                error = %failure,
                "Letter delivery failed"
            );
            AttemptResult::Failed(failure)
        }
        (Err(e), notified) => {
            error!(
                letter_id = %letter_id,
                error = %e,
                notifier_succeeded = notified.is_ok(),
                "Failed to record delivery state"
            );
            AttemptResult::Failed(AttemptFailure::Persistence(e))
        }
    };

    AttemptOutcome { letter_id, result }
}
