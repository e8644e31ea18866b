//! Crate level errors.
use thiserror::Error;

/// Result type for every fallible repository operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the repository operation boundary.
///
/// Validation and domain errors never mutate state; operational errors
/// coming from the storage backend are propagated unchanged, never
/// swallowed.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested time resolution is zero or does not evenly divide a day
    #[error("time resolution {0} does not evenly divide 86400 seconds")]
    InvalidResolution(u32),
    /// An attempt was made to persist or rehydrate a hasher class that is
    /// not in the registered enumeration
    #[error("hasher class {0:?} is not supported")]
    UnsupportedHasher(String),
    /// The repository latched read-only after finding more than one pending
    /// configuration on open
    #[error("repository is read-only: multiple pending configurations were found on open")]
    ReadOnly,
    /// The store holds no configuration covering the present instant
    #[error("no repository configuration is active")]
    NoActiveConfig,
    /// The store was written by something else and may not be interpreted
    #[error("store carries foreign version tag {0:?}")]
    ForeignStore(String),
    /// A stored record disagrees with its recorded integrity tag
    #[error("stored record {key:?} does not match its integrity tag")]
    CorruptRecord {
        /// Store key of the offending record
        key: String,
    },
    /// A store timestamp does not map back to a representable instant
    #[error("store timestamp {0} does not map to a representable instant")]
    Timestamp(i64),
    /// The storage backend refused an operation
    #[error("storage backend: {0}")]
    Storage(failure::Error),
    /// A JSON payload could not be produced or interpreted
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A row envelope could not be encoded or decoded
    #[error("row encoding: {0}")]
    Encoding(#[from] bincode::Error),
    /// A hasher could not be constructed or evaluated
    #[error(transparent)]
    Crypto(#[from] muteacle_crypto::hasher::Error),
}

/// Implicit, contextless wrapping of storage backend errors.
impl From<failure::Error> for Error {
    fn from(err: failure::Error) -> Self {
        Error::Storage(err)
    }
}
