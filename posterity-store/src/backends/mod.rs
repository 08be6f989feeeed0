//! Backend storage implementations for the record store
//!
//! - `memory`: In-memory storage for tests and short-lived deployments
//! - `test`: Memory storage with fault injection and synchronization hooks
//! - `file`: File-based storage for production use

pub mod file;
pub mod memory;

use std::collections::HashMap;

pub use file::{FileStore, FileStoreBuilder};
pub use memory::MemoryStore;
pub use test::TestStore;
use tracing::warn;

use crate::{
    letter::{DueLetter, Letter, Recipient},
    types::{DueWindow, RecipientId},
};

/// Select the due, undelivered letters and join each with its recipient.
///
/// Letters whose owner cannot be resolved are skipped; they cannot be
/// addressed, and attempting them would only inflate their retry count.
pub(crate) fn join_due<'a>(
    letters: impl IntoIterator<Item = &'a Letter>,
    recipients: &HashMap<RecipientId, Recipient>,
    window: &DueWindow,
) -> Vec<DueLetter> {
    let mut due: Vec<DueLetter> = letters
        .into_iter()
        .filter(|letter| window.admits(letter.due_at) && !letter.state().is_terminal())
        .filter_map(|letter| {
            let Some(recipient) = recipients.get(&letter.owner) else {
                warn!(
                    letter_id = %letter.id,
                    owner = %letter.owner,
                    "Due letter has no resolvable recipient, skipping"
                );
                return None;
            };

            Some(DueLetter {
                letter: letter.clone(),
                recipient: recipient.clone(),
            })
        })
        .collect();

    due.sort_by(|a, b| {
        a.letter
            .due_at
            .cmp(&b.letter.due_at)
            .then_with(|| a.letter.id.cmp(&b.letter.id))
    });

    due
}
