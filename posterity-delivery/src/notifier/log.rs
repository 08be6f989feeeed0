use async_trait::async_trait;
use posterity_store::Recipient;
use tracing::info;

use super::{LetterContent, Notifier, Receipt, render};
use crate::error::NotifyError;

/// Renders letters and writes them to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        letter: &LetterContent,
    ) -> Result<Receipt, NotifyError> {
        let rendered = render(recipient.name.as_deref(), letter);
        info!(
            to = %recipient.address,
            subject = %rendered.subject,
            "\n{}",
            rendered.text
        );

        Ok(Receipt::default())
    }
}
