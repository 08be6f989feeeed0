use chrono::{DateTime, Utc};

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            id: ulid::Ulid,
        }

        impl $name {
            /// Wrap an existing ULID
            #[must_use]
            pub const fn new(id: ulid::Ulid) -> Self {
                Self { id }
            }

            /// Generate a new unique identifier
            #[must_use]
            pub fn generate() -> Self {
                Self {
                    id: ulid::Ulid::new(),
                }
            }

            /// Get the underlying ULID
            #[must_use]
            pub const fn ulid(&self) -> ulid::Ulid {
                self.id
            }

            /// Parse a record filename like `01ARYZ6S41.bin`
            ///
            /// Anything that is not exactly a ULID followed by `.bin` is rejected,
            /// including names carrying path separators or `..`.
            #[must_use]
            pub fn from_filename(filename: &str) -> Option<Self> {
                if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
                    return None;
                }

                let stem = filename.strip_suffix(".bin")?;
                ulid::Ulid::from_string(stem).ok().map(Self::new)
            }

            /// The filename this record is stored under
            #[must_use]
            pub fn filename(&self) -> String {
                format!("{}.bin", self.id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.id)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                ulid::Ulid::from_string(s).map(Self::new)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.id.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
                Ok(Self { id })
            }
        }
    };
}

ulid_id!(
    /// Identifier of a letter (ULID, lexicographically sortable by creation time)
    LetterId
);

ulid_id!(
    /// Identifier of a letter's recipient
    RecipientId
);

/// The calendar-day interval a scan is performed for, as UTC instants.
///
/// `start` is inclusive and `end` exclusive. Stores select on `end` only: a
/// letter whose day has already passed without a successful delivery is still
/// due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DueWindow {
    /// Whether a letter due at `due_at` is eligible under this window
    #[must_use]
    pub fn admits(&self, due_at: DateTime<Utc>) -> bool {
        due_at < self.end
    }
}
