//! Record store for letters awaiting delivery
//!
//! The store is the source of truth for every letter and its delivery
//! bookkeeping. Delivery code never caches records between runs; it reads
//! what is due through [`RecordStore::find_due_undelivered`] and writes back
//! one [`DeliveryPatch`] per attempt.

pub mod backends;
pub mod config;
pub mod error;
pub mod letter;
pub mod r#trait;
pub mod types;

pub use backends::{FileStore, MemoryStore, TestStore};
pub use config::StoreConfig;
pub use error::{Result, SerializationError, StoreError, ValidationError};
pub use letter::{DeliveryPatch, DeliveryState, DeliveryStatus, DueLetter, Letter, Recipient};
pub use r#trait::RecordStore;
pub use types::{DueWindow, LetterId, RecipientId};
