use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use crate::{
    StoreError,
    letter::{DeliveryPatch, DueLetter, Letter, Recipient},
    r#trait::RecordStore,
    types::{DueWindow, LetterId, RecipientId},
};

/// In-memory record store
///
/// Letters and recipients live in `HashMap`s behind `RwLock`s. Updates take
/// the write lock for the whole read-modify-write, which makes every
/// [`RecordStore::update_delivery_state`] call atomic.
///
/// # Capacity Management
/// An optional capacity bounds the number of letters. Inserting beyond it
/// fails, which is useful for exercising error paths and guards against
/// unbounded growth if this store is used outside of tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub(crate) letters: Arc<RwLock<HashMap<LetterId, Letter>>>,
    pub(crate) recipients: Arc<RwLock<HashMap<RecipientId, Recipient>>>,
    /// Maximum number of letters to store (None = unlimited)
    capacity: Option<usize>,
}

impl MemoryStore {
    /// Create a new empty store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store holding at most `capacity` letters
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Number of letters stored
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.letters
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Remove every letter and recipient
    pub fn clear(&self) {
        self.letters
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        self.recipients
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_recipient(&self, recipient: Recipient) -> crate::Result<()> {
        let mut recipients = self.recipients.write()?;
        if recipients.contains_key(&recipient.id) {
            return Err(StoreError::AlreadyExists(recipient.id.to_string()));
        }
        recipients.insert(recipient.id, recipient);
        Ok(())
    }

    async fn insert_letter(&self, letter: Letter) -> crate::Result<()> {
        if !self.recipients.read()?.contains_key(&letter.owner) {
            return Err(StoreError::RecipientNotFound(letter.owner));
        }

        let mut letters = self.letters.write()?;
        if letters.contains_key(&letter.id) {
            return Err(StoreError::AlreadyExists(letter.id.to_string()));
        }
        if let Some(cap) = self.capacity
            && letters.len() >= cap
        {
            return Err(StoreError::Internal(format!(
                "Memory store capacity exceeded: {}/{cap} letters",
                letters.len()
            )));
        }

        letters.insert(letter.id, letter);
        Ok(())
    }

    async fn get_letter(&self, id: &LetterId) -> crate::Result<Letter> {
        self.letters
            .read()?
            .get(id)
            .cloned()
            .ok_or(StoreError::LetterNotFound(*id))
    }

    async fn get_recipient(&self, id: &RecipientId) -> crate::Result<Recipient> {
        self.recipients
            .read()?
            .get(id)
            .cloned()
            .ok_or(StoreError::RecipientNotFound(*id))
    }

    async fn find_due_undelivered(&self, window: &DueWindow) -> crate::Result<Vec<DueLetter>> {
        let letters = self.letters.read()?;
        let recipients = self.recipients.read()?;

        Ok(super::join_due(letters.values(), &recipients, window))
    }

    async fn update_delivery_state(
        &self,
        id: &LetterId,
        patch: &DeliveryPatch,
    ) -> crate::Result<Letter> {
        let mut letters = self.letters.write()?;
        let letter = letters
            .get_mut(id)
            .ok_or(StoreError::LetterNotFound(*id))?;

        letter.apply(patch)?;
        Ok(letter.clone())
    }
}
