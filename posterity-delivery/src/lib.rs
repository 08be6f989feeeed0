//! Scheduled delivery of letters
//!
//! This crate provides:
//! - A due-letter scanner over the record store, windowed by calendar day
//! - An attempt engine that sends one letter and records exactly one outcome
//! - A scheduler that serializes batch runs from a daily cadence and a manual trigger
//! - The notifier interface, with an HTTP email notifier and a dry-run notifier

mod clock;
mod error;
pub mod notifier;
mod processor;
mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AttemptFailure, DeliveryError, NotifyError};
pub use notifier::{LetterContent, Notifier, NotifierConfig, Receipt};
pub use processor::{DeliveryScheduler, SchedulerHandle, scan::due_window};
pub use types::{AttemptOutcome, AttemptResult, DriverState, RunSummary, Trigger};
