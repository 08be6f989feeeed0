//! A single batch run: scan, attempt each letter in turn, summarize

use std::{panic::AssertUnwindSafe, time::Duration};

use futures_util::FutureExt;
use tracing::{error, info};

use crate::{
    error::{AttemptFailure, DeliveryError, panic_message},
    processor::{
        DeliveryScheduler,
        attempt::{self, AttemptContext},
        scan,
    },
    types::{AttemptOutcome, AttemptResult, RunSummary, Trigger},
};

/// Run one batch over every letter due in the current window.
///
/// Letters are attempted sequentially. A panic while handling one letter is
/// recorded as that letter's failure and the run moves on.
///
/// # Errors
///
/// Returns an error if the scheduler is not initialized or the scan fails;
/// in both cases no letter has been attempted.
pub async fn run_batch_internal(
    scheduler: &DeliveryScheduler,
    trigger: Trigger,
) -> Result<RunSummary, DeliveryError> {
    let (Some(store), Some(notifier)) = (&scheduler.store, &scheduler.notifier) else {
        return Err(DeliveryError::NotInitialized(
            "Delivery scheduler not initialized. Call init() first.".to_string(),
        ));
    };

    let started_at = scheduler.clock.now();
    let window = scan::due_window(started_at, scheduler.timezone);
    info!(%trigger, window_start = %window.start, window_end = %window.end, "Delivery run starting");

    let due = scan::scan_due_internal(store.as_ref(), &window).await?;

    let ctx = AttemptContext {
        store: store.as_ref(),
        notifier: notifier.as_ref(),
        clock: scheduler.clock.as_ref(),
        notifier_timeout: Duration::from_secs(scheduler.notifier_timeout_secs),
        timezone: scheduler.timezone,
    };

    let mut outcomes = Vec::with_capacity(due.len());
    for item in &due {
        let outcome = AssertUnwindSafe(attempt::attempt_delivery_internal(&ctx, item))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(letter_id = %item.letter.id, error = %message, "Delivery attempt panicked");
                AttemptOutcome {
                    letter_id: item.letter.id,
                    result: AttemptResult::Failed(AttemptFailure::Panicked(message)),
                }
            });
        outcomes.push(outcome);
    }

    let summary = RunSummary {
        trigger,
        window,
        started_at,
        finished_at: scheduler.clock.now(),
        outcomes,
    };

    info!(
        %trigger,
        processed = summary.processed(),
        sent = summary.sent(),
        failed = summary.failed(),
        "Delivery run complete"
    );

    Ok(summary)
}
