//! Outbound delivery of a single letter
//!
//! A [`Notifier`] turns one letter and its recipient into one outbound
//! message. Ordinary failures are returned as [`NotifyError`]; the attempt
//! engine treats a panic inside a notifier as a failure too.

mod log;
mod render;
mod resend;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use posterity_store::{Letter, Recipient};
use serde::Deserialize;

pub use self::{
    log::LogNotifier,
    render::{RenderedLetter, render},
    resend::{ConfigurationStatus, ResendConfig, ResendNotifier},
};
use crate::error::NotifyError;

/// The parts of a letter a notifier needs to render it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterContent {
    pub title: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    /// Zone the dates are presented in; the same zone that decides which day a letter is due
    pub timezone: Tz,
}

impl LetterContent {
    #[must_use]
    pub fn new(letter: &Letter, timezone: Tz) -> Self {
        Self {
            title: letter.title.clone(),
            body: letter.body.clone(),
            created_at: letter.created_at,
            due_at: letter.due_at,
            timezone,
        }
    }
}

/// Acknowledgement from a notifier that a message was accepted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    /// Identifier assigned by the transport, when it provides one
    pub message_id: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Deliver `letter` to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] if the message could not be handed to the
    /// transport or the transport rejected it.
    async fn send(&self, recipient: &Recipient, letter: &LetterContent)
    -> Result<Receipt, NotifyError>;
}

/// Which notifier to deliver through
#[derive(Debug, Clone, Default, Deserialize)]
pub enum NotifierConfig {
    /// Send email through the Resend HTTP API
    Resend(ResendConfig),
    /// Log the rendered letter instead of sending it
    #[default]
    Log,
}

impl NotifierConfig {
    /// Build the configured notifier.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Transport`] if the HTTP client cannot be created.
    pub fn build(&self) -> Result<Arc<dyn Notifier>, NotifyError> {
        Ok(match self {
            Self::Resend(config) => Arc::new(ResendNotifier::new(config.clone())?),
            Self::Log => Arc::new(LogNotifier),
        })
    }
}

/// Check that `address` looks like `local@domain.tld` with no whitespace.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Send a canned letter to `address` to check the notifier end to end.
///
/// # Errors
///
/// Returns [`NotifyError::InvalidAddress`] without contacting the notifier
/// if `address` is malformed, otherwise whatever the notifier reports.
pub async fn send_test_letter(
    notifier: &dyn Notifier,
    address: &str,
    timezone: Tz,
) -> Result<Receipt, NotifyError> {
    if !is_valid_address(address) {
        return Err(NotifyError::InvalidAddress(address.to_string()));
    }

    let now = Utc::now();
    let recipient = Recipient::new(Some("Test User".to_string()), address);
    let letter = LetterContent {
        title: Some("Test Letter".to_string()),
        body: "This is a test letter to verify that email delivery is working correctly."
            .to_string(),
        created_at: now,
        due_at: now,
        timezone,
    };

    notifier.send(&recipient, &letter).await
}
