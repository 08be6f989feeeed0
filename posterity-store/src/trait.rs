use async_trait::async_trait;

use crate::{
    letter::{DeliveryPatch, DueLetter, Letter, Recipient},
    types::{DueWindow, LetterId, RecipientId},
};

/// Storage for letters and their recipients.
///
/// Implementations must make [`RecordStore::update_delivery_state`] an atomic
/// read-modify-write of a single letter. Nothing else is assumed: the store
/// does not prevent two overlapping scans from observing the same letter.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Store a new recipient.
    ///
    /// # Errors
    /// If a recipient with the same id exists, or the write fails
    async fn insert_recipient(&self, recipient: Recipient) -> crate::Result<()>;

    /// Store a new letter. Its owner must already exist.
    ///
    /// # Errors
    /// If the owner is unknown, the id is taken, or the write fails
    async fn insert_letter(&self, letter: Letter) -> crate::Result<()>;

    /// Read a single letter.
    ///
    /// # Errors
    /// If the letter does not exist or cannot be read
    async fn get_letter(&self, id: &LetterId) -> crate::Result<Letter>;

    /// Read a single recipient.
    ///
    /// # Errors
    /// If the recipient does not exist or cannot be read
    async fn get_recipient(&self, id: &RecipientId) -> crate::Result<Recipient>;

    /// Every letter due before `window.end` that has not been sent, joined with
    /// its recipient and ordered by due instant.
    ///
    /// # Errors
    /// If the underlying records cannot be read
    async fn find_due_undelivered(&self, window: &DueWindow) -> crate::Result<Vec<DueLetter>>;

    /// Atomically apply `patch` to one letter and return the updated record.
    ///
    /// # Errors
    /// If the letter does not exist, is already delivered, or cannot be written
    async fn update_delivery_state(
        &self,
        id: &LetterId,
        patch: &DeliveryPatch,
    ) -> crate::Result<Letter>;
}
