//! Finding the letters that are due in the current window

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use posterity_store::{DueLetter, DueWindow, RecordStore};
use tracing::{debug, error};

use crate::error::DeliveryError;

/// The first instant of `date` in `tz`.
///
/// When a DST transition skips local midnight, the day starts at the first
/// local time that exists.
fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);

    (0..=24 * 60)
        .map(|minutes| midnight + Duration::minutes(minutes))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map_or_else(
            || Utc.from_utc_datetime(&midnight),
            |start| start.with_timezone(&Utc),
        )
}

/// The calendar day containing `now` in the reference zone `tz`, as a
/// half-open UTC interval.
#[must_use]
pub fn due_window(now: DateTime<Utc>, tz: Tz) -> DueWindow {
    let today = now.with_timezone(&tz).date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);

    DueWindow {
        start: start_of_day(today, tz),
        end: start_of_day(tomorrow, tz),
    }
}

/// Read every letter due before the end of `window` that has not been sent.
///
/// # Errors
///
/// Returns [`DeliveryError::Scan`] if the store query fails.
pub async fn scan_due_internal(
    store: &dyn RecordStore,
    window: &DueWindow,
) -> Result<Vec<DueLetter>, DeliveryError> {
    let due = store.find_due_undelivered(window).await.map_err(|e| {
        error!(error = %e, "Failed to scan for due letters");
        DeliveryError::Scan(e)
    })?;

    debug!(
        window_start = %window.start,
        window_end = %window.end,
        count = due.len(),
        "Scanned for due letters"
    );

    Ok(due)
}
