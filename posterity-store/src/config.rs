use std::{path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::{
    backends::{FileStore, MemoryStore},
    r#trait::RecordStore,
};

/// Configuration for the record store
///
/// File-backed store in RON config:
/// ```ron
/// Posterity (
///     store: File(
///         path: "/var/lib/posterity",
///     ),
/// )
/// ```
///
/// Memory-backed store with a capacity limit:
/// ```ron
/// Posterity (
///     store: Memory(
///         capacity: Some(1000),
///     ),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum StoreConfig {
    /// File-based store (production)
    File { path: PathBuf },
    /// Memory-based store (testing/development)
    Memory {
        /// Maximum number of letters to store (omit for unlimited)
        #[serde(default)]
        capacity: Option<usize>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::File {
            path: FileStore::default().path().to_path_buf(),
        }
    }
}

impl StoreConfig {
    /// Build and initialise the configured store
    ///
    /// # Errors
    /// If the file store path is invalid or its directories cannot be created
    pub fn into_store(self) -> crate::Result<Arc<dyn RecordStore>> {
        match self {
            Self::File { path } => {
                let store = FileStore::builder().path(path).build()?;
                store.init()?;
                Ok(Arc::new(store))
            }
            Self::Memory { capacity } => Ok(capacity.map_or_else(
                || Arc::new(MemoryStore::new()) as Arc<dyn RecordStore>,
                |capacity| Arc::new(MemoryStore::with_capacity(capacity)),
            )),
        }
    }
}
