use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use posterity_common::internal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::{fs, sync::Mutex};
use tracing::error;

use crate::{
    StoreError, ValidationError,
    letter::{DeliveryPatch, DueLetter, Letter, Recipient},
    r#trait::RecordStore,
    types::{DueWindow, LetterId, RecipientId},
};

const LETTERS_DIR: &str = "letters";
const RECIPIENTS_DIR: &str = "recipients";
const TEMP_SUFFIX: &str = ".tmp";

const SENSITIVE_PREFIXES: [&str; 9] = [
    "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
];

/// File-based record store
///
/// Each record is a bincode file named after its ULID:
/// - `{path}/letters/{id}.bin`
/// - `{path}/recipients/{id}.bin`
///
/// # Atomicity
/// Writes go to `{id}.bin.tmp` and are then renamed over the target, so a
/// crash never leaves a half-written record behind. Mutations are serialized
/// through an in-process lock, which makes each delivery-state update a single
/// read-modify-write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/posterity"),
            write_lock: Arc::default(),
        }
    }
}

impl<'de> Deserialize<'de> for FileStore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct FileStoreHelper {
            path: PathBuf,
        }

        let helper = FileStoreHelper::deserialize(deserializer)?;
        Self::validate_path(&helper.path).map_err(serde::de::Error::custom)?;

        Ok(Self {
            path: helper.path,
            write_lock: Arc::default(),
        })
    }
}

/// Builder for [`FileStore`]
#[derive(Debug, Default)]
pub struct FileStoreBuilder {
    path: Option<PathBuf>,
}

impl FileStoreBuilder {
    #[must_use]
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Validate the configured path and build the store
    ///
    /// # Errors
    /// If the path is relative, contains `..`, or points into a system directory
    pub fn build(self) -> crate::Result<FileStore> {
        let path = self.path.unwrap_or_else(|| FileStore::default().path);
        FileStore::validate_path(&path)?;

        Ok(FileStore {
            path,
            write_lock: Arc::default(),
        })
    }
}

impl FileStore {
    #[must_use]
    pub fn builder() -> FileStoreBuilder {
        FileStoreBuilder::default()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn validate_path(path: &Path) -> Result<(), ValidationError> {
        if path
            .components()
            .any(|component| component == std::path::Component::ParentDir)
        {
            return Err(ValidationError::ParentComponent(path.display().to_string()));
        }

        if !path.is_absolute() {
            return Err(ValidationError::NotAbsolute(path.display().to_string()));
        }

        if let Some(prefix) = SENSITIVE_PREFIXES
            .iter()
            .find(|prefix| path.starts_with(prefix))
        {
            return Err(ValidationError::SystemDirectory {
                prefix: (*prefix).to_string(),
                path: path.display().to_string(),
            });
        }

        Ok(())
    }

    /// Create the store directories and remove temp files left by a crash
    ///
    /// # Errors
    /// - If the directories cannot be created
    /// - If the path exists but is not a directory
    pub fn init(&self) -> crate::Result<()> {
        internal!("Initialising record store at {} ...", self.path.display());

        if self.path.try_exists()? && !self.path.is_dir() {
            return Err(ValidationError::NotDirectory(self.path.display().to_string()).into());
        }

        let mut cleaned = 0;
        for dir in [LETTERS_DIR, RECIPIENTS_DIR] {
            let dir = self.path.join(dir);
            std::fs::create_dir_all(&dir)?;

            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.file_name().to_string_lossy().ends_with(TEMP_SUFFIX) {
                    std::fs::remove_file(entry.path())?;
                    cleaned += 1;
                }
            }
        }

        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} orphaned temp files from record store"
            );
        }

        Ok(())
    }

    fn letter_path(&self, id: &LetterId) -> PathBuf {
        self.path.join(LETTERS_DIR).join(id.filename())
    }

    fn recipient_path(&self, id: &RecipientId) -> PathBuf {
        self.path.join(RECIPIENTS_DIR).join(id.filename())
    }

    async fn write_record<T: Serialize + Sync>(path: &Path, record: &T) -> crate::Result<()> {
        let bytes = bincode::serde::encode_to_vec(record, bincode::config::standard())?;

        let mut temp = path.as_os_str().to_owned();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        fs::write(&temp, bytes).await?;
        fs::rename(&temp, path).await?;
        Ok(())
    }

    async fn read_record<T: DeserializeOwned>(path: &Path) -> crate::Result<Option<T>> {
        match fs::read(path).await {
            Ok(bytes) => {
                let (record, _) =
                    bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_all<T: DeserializeOwned>(&self, dir: &str) -> crate::Result<Vec<T>> {
        let mut entries = fs::read_dir(self.path.join(dir)).await?;
        let mut records = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name();
            let filename = filename.to_string_lossy();

            // Only ULID-named records; temp files and strays are ignored
            if LetterId::from_filename(&filename).is_none() {
                continue;
            }

            // An unreadable record fails the whole read so it cannot drop out of a scan
            let record = Self::read_record(&entry.path()).await.inspect_err(|e| {
                error!(dir, file = %filename, error = %e, "Unreadable record");
            })?;
            records.extend(record);
        }

        Ok(records)
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn insert_recipient(&self, recipient: Recipient) -> crate::Result<()> {
        let _guard = self.write_lock.lock().await;

        let path = self.recipient_path(&recipient.id);
        if fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(recipient.id.to_string()));
        }

        Self::write_record(&path, &recipient).await
    }

    async fn insert_letter(&self, letter: Letter) -> crate::Result<()> {
        let _guard = self.write_lock.lock().await;

        if !fs::try_exists(self.recipient_path(&letter.owner)).await? {
            return Err(StoreError::RecipientNotFound(letter.owner));
        }

        let path = self.letter_path(&letter.id);
        if fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(letter.id.to_string()));
        }

        Self::write_record(&path, &letter).await
    }

    async fn get_letter(&self, id: &LetterId) -> crate::Result<Letter> {
        Self::read_record(&self.letter_path(id))
            .await?
            .ok_or(StoreError::LetterNotFound(*id))
    }

    async fn get_recipient(&self, id: &RecipientId) -> crate::Result<Recipient> {
        Self::read_record(&self.recipient_path(id))
            .await?
            .ok_or(StoreError::RecipientNotFound(*id))
    }

    async fn find_due_undelivered(&self, window: &DueWindow) -> crate::Result<Vec<DueLetter>> {
        let letters: Vec<Letter> = self.read_all(LETTERS_DIR).await?;
        let recipients: HashMap<_, _> = self
            .read_all::<Recipient>(RECIPIENTS_DIR)
            .await?
            .into_iter()
            .map(|recipient| (recipient.id, recipient))
            .collect();

        Ok(super::join_due(&letters, &recipients, window))
    }

    async fn update_delivery_state(
        &self,
        id: &LetterId,
        patch: &DeliveryPatch,
    ) -> crate::Result<Letter> {
        let _guard = self.write_lock.lock().await;

        let path = self.letter_path(id);
        let mut letter: Letter = Self::read_record(&path)
            .await?
            .ok_or(StoreError::LetterNotFound(*id))?;

        letter.apply(patch)?;
        Self::write_record(&path, &letter).await?;

        Ok(letter)
    }
}
