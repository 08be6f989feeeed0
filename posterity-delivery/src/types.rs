//! Results reported by the delivery scheduler

use chrono::{DateTime, Utc};
use posterity_store::{DueWindow, LetterId};

use crate::error::AttemptFailure;

/// What started a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The recurring daily cadence
    Scheduled,
    /// An operator asked for a run now
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        })
    }
}

/// Whether a batch run is currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
}

/// How a single attempt ended
#[derive(Debug)]
pub enum AttemptResult {
    /// The notifier accepted the letter and the letter is recorded as sent
    Sent { message_id: Option<String> },
    Failed(AttemptFailure),
}

/// The outcome of attempting one due letter
#[derive(Debug)]
pub struct AttemptOutcome {
    pub letter_id: LetterId,
    pub result: AttemptResult,
}

impl AttemptOutcome {
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self.result, AttemptResult::Sent { .. })
    }
}

/// Aggregate result of one batch run
///
/// Every scanned letter contributes exactly one outcome, so
/// `processed() == sent() + failed()` always holds.
#[derive(Debug)]
pub struct RunSummary {
    pub trigger: Trigger,
    pub window: DueWindow,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<AttemptOutcome>,
}

impl RunSummary {
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_sent()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.processed() - self.sent()
    }

    /// The outcome recorded for `id`, if it was part of this run
    #[must_use]
    pub fn outcome_for(&self, id: &LetterId) -> Option<&AttemptOutcome> {
        self.outcomes.iter().find(|o| &o.letter_id == id)
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} run: processed {}, sent {}, failed {}",
            self.trigger,
            self.processed(),
            self.sent(),
            self.failed()
        )
    }
}
