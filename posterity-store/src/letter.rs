//! Letters, their recipients, and the delivery bookkeeping carried on each letter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::StoreError,
    types::{LetterId, RecipientId},
};

/// Where a letter is in its delivery lifecycle.
///
/// `Unscheduled` and `Pending` both mean "never delivered, never failed" and
/// are treated identically by the scanner. `Sent` is terminal. `Failed` stays
/// eligible for the next run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryState {
    #[default]
    Unscheduled,
    Pending,
    Sent,
    Failed,
}

impl DeliveryState {
    /// Returns `true` once no further delivery may be attempted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent)
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unscheduled => "unscheduled",
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        })
    }
}

/// The person a letter is addressed to (its author, some time ago)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub name: Option<String>,
    pub address: String,
}

impl Recipient {
    #[must_use]
    pub fn new(name: Option<String>, address: impl Into<String>) -> Self {
        Self {
            id: RecipientId::generate(),
            name,
            address: address.into(),
        }
    }
}

/// A message to be delivered to its owner on or after `due_at`.
///
/// Delivery bookkeeping is private: it changes only through
/// [`Letter::apply`], which keeps `is_delivered` in step with `state`.
/// Persisted records that break that rule are rejected on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LetterRecord")]
pub struct Letter {
    pub id: LetterId,
    pub owner: RecipientId,
    pub title: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,

    #[serde(default)]
    state: DeliveryState,
    #[serde(default)]
    is_delivered: bool,
    #[serde(default)]
    delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    retry_count: u32,
    #[serde(default)]
    last_error: Option<String>,
}

/// A letter as read from storage, before its bookkeeping is checked
#[derive(Deserialize)]
struct LetterRecord {
    id: LetterId,
    owner: RecipientId,
    title: Option<String>,
    body: String,
    created_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
    #[serde(default)]
    state: DeliveryState,
    #[serde(default)]
    is_delivered: bool,
    #[serde(default)]
    delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    retry_count: u32,
    #[serde(default)]
    last_error: Option<String>,
}

impl TryFrom<LetterRecord> for Letter {
    type Error = StoreError;

    fn try_from(record: LetterRecord) -> Result<Self, Self::Error> {
        if record.is_delivered != (record.state == DeliveryState::Sent) {
            return Err(StoreError::InconsistentDelivery(record.id));
        }

        Ok(Self {
            id: record.id,
            owner: record.owner,
            title: record.title,
            body: record.body,
            created_at: record.created_at,
            due_at: record.due_at,
            state: record.state,
            is_delivered: record.is_delivered,
            delivered_at: record.delivered_at,
            sent_at: record.sent_at,
            retry_count: record.retry_count,
            last_error: record.last_error,
        })
    }
}

impl Letter {
    /// Create a new letter awaiting delivery
    #[must_use]
    pub fn new(
        owner: RecipientId,
        title: Option<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LetterId::generate(),
            owner,
            title,
            body: body.into(),
            created_at,
            due_at,
            state: DeliveryState::Pending,
            is_delivered: false,
            delivered_at: None,
            sent_at: None,
            retry_count: 0,
            last_error: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> DeliveryState {
        self.state
    }

    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        self.is_delivered
    }

    #[must_use]
    pub const fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    #[must_use]
    pub const fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Apply the outcome of one delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyDelivered`] if the letter has already been
    /// sent; a sent letter is never written to again.
    pub fn apply(&mut self, patch: &DeliveryPatch) -> Result<(), StoreError> {
        if self.state.is_terminal() {
            return Err(StoreError::AlreadyDelivered(self.id));
        }

        match patch {
            DeliveryPatch::Sent { at } => {
                self.state = DeliveryState::Sent;
                self.is_delivered = true;
                self.delivered_at = Some(*at);
                self.sent_at = Some(*at);
                self.retry_count = 0;
                self.last_error = None;
            }
            DeliveryPatch::Failed { error } => {
                self.state = DeliveryState::Failed;
                self.is_delivered = false;
                self.retry_count = self.retry_count.saturating_add(1);
                self.last_error = Some(error.clone());
            }
        }

        Ok(())
    }

    /// How this letter should be presented to its owner, given the start of
    /// the current day.
    #[must_use]
    pub fn status(&self, today_start: DateTime<Utc>) -> DeliveryStatus {
        match self.state {
            DeliveryState::Sent => DeliveryStatus::Delivered,
            DeliveryState::Failed => DeliveryStatus::DeliveryFailed,
            DeliveryState::Unscheduled | DeliveryState::Pending if self.due_at < today_start => {
                DeliveryStatus::PendingDelivery
            }
            DeliveryState::Unscheduled | DeliveryState::Pending => DeliveryStatus::Scheduled,
        }
    }
}

/// The state change resulting from one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryPatch {
    /// The notifier accepted the letter at `at`
    Sent { at: DateTime<Utc> },
    /// The attempt failed; `error` describes the most recent failure
    Failed { error: String },
}

/// Owner-facing delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    DeliveryFailed,
    /// Due before today and not yet delivered
    PendingDelivery,
    Scheduled,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Delivered => "Delivered",
            Self::DeliveryFailed => "Delivery Failed",
            Self::PendingDelivery => "Pending Delivery",
            Self::Scheduled => "Scheduled",
        })
    }
}

/// A due letter joined with its resolved recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueLetter {
    pub letter: Letter,
    pub recipient: Recipient,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;

    fn letter() -> Letter {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        Letter::new(
            RecipientId::generate(),
            Some("Hello".to_string()),
            "Dear me",
            created,
            created + Duration::days(365),
        )
    }

    #[test]
    fn test_new_letter_is_pending() {
        let letter = letter();
        assert_eq!(letter.state(), DeliveryState::Pending);
        assert!(!letter.is_delivered());
        assert_eq!(letter.retry_count(), 0);
        assert_eq!(letter.last_error(), None);
    }

    #[test]
    fn test_failures_accumulate_and_success_resets() {
        let mut letter = letter();

        letter
            .apply(&DeliveryPatch::Failed {
                error: "timeout".to_string(),
            })
            .unwrap();
        letter
            .apply(&DeliveryPatch::Failed {
                error: "mailbox full".to_string(),
            })
            .unwrap();

        assert_eq!(letter.state(), DeliveryState::Failed);
        assert!(!letter.is_delivered());
        assert_eq!(letter.retry_count(), 2);
        assert_eq!(letter.last_error(), Some("mailbox full"));

        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 5).unwrap();
        letter.apply(&DeliveryPatch::Sent { at }).unwrap();

        assert_eq!(letter.state(), DeliveryState::Sent);
        assert!(letter.is_delivered());
        assert_eq!(letter.delivered_at(), Some(at));
        assert_eq!(letter.sent_at(), Some(at));
        assert_eq!(letter.retry_count(), 0);
        assert_eq!(letter.last_error(), None);
    }

    #[test]
    fn test_sent_letter_is_immutable() {
        let mut letter = letter();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 5).unwrap();
        letter.apply(&DeliveryPatch::Sent { at }).unwrap();
        let before = letter.clone();

        let result = letter.apply(&DeliveryPatch::Failed {
            error: "late".to_string(),
        });
        assert!(matches!(result, Err(StoreError::AlreadyDelivered(id)) if id == letter.id));

        let result = letter.apply(&DeliveryPatch::Sent {
            at: at + Duration::days(1),
        });
        assert!(result.is_err());
        assert_eq!(letter, before);
    }

    #[test]
    fn test_load_rejects_inconsistent_delivery_flag() {
        let letter = letter();
        let stored = ron::to_string(&letter).unwrap();
        assert_eq!(ron::from_str::<Letter>(&stored).unwrap(), letter);

        let tampered = stored.replace("is_delivered:false", "is_delivered:true");
        assert_ne!(tampered, stored);

        let err = ron::from_str::<Letter>(&tampered).unwrap_err();
        assert!(err.to_string().contains("Inconsistent delivery state"));

        let mut sent = letter.clone();
        sent.apply(&DeliveryPatch::Sent { at: sent.due_at }).unwrap();
        let stored = ron::to_string(&sent).unwrap();
        assert_eq!(ron::from_str::<Letter>(&stored).unwrap(), sent);

        let tampered = stored.replace("is_delivered:true", "is_delivered:false");
        assert_ne!(tampered, stored);
        assert!(ron::from_str::<Letter>(&tampered).is_err());
    }

    #[test]
    fn test_display_status() {
        let mut letter = letter();
        let due_day = letter.due_at;

        assert_eq!(
            letter.status(due_day - Duration::days(10)),
            DeliveryStatus::Scheduled
        );
        assert_eq!(
            letter.status(due_day + Duration::days(1)),
            DeliveryStatus::PendingDelivery
        );

        letter
            .apply(&DeliveryPatch::Failed {
                error: "boom".to_string(),
            })
            .unwrap();
        assert_eq!(letter.status(due_day), DeliveryStatus::DeliveryFailed);

        letter.apply(&DeliveryPatch::Sent { at: due_day }).unwrap();
        assert_eq!(letter.status(due_day), DeliveryStatus::Delivered);
        assert_eq!(DeliveryStatus::Delivered.to_string(), "Delivered");
    }
}
