//! Error type shared by the blob store, the metadata store and the services
//! layered on top of them.

use std::{error::Error as StdError, fmt, io};
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Which backing store an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Blob,
    Metadata,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Blob => write!(f, "blob store"),
            StoreKind::Metadata => write!(f, "metadata store"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{store} unavailable: {source}")]
    StorageUnavailable {
        store: StoreKind,
        #[source]
        source: BoxError,
    },
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
    #[error("invalid file name `{0}`")]
    InvalidFileName(String),
    #[error("container `{name}` invalid: {reason}")]
    InvalidContainerName { name: String, reason: String },
    #[error("table name `{0}` invalid: expected 3-63 ASCII letters or digits, starting with a letter")]
    InvalidTableName(String),
    #[error("blob `{0}` not found")]
    BlobNotFound(String),
}

impl MediaError {
    pub fn blob_unavailable(err: impl Into<BoxError>) -> Self {
        Self::StorageUnavailable {
            store: StoreKind::Blob,
            source: err.into(),
        }
    }

    pub fn metadata_unavailable(err: impl Into<BoxError>) -> Self {
        Self::StorageUnavailable {
            store: StoreKind::Metadata,
            source: err.into(),
        }
    }
}

impl From<sqlx::Error> for MediaError {
    fn from(err: sqlx::Error) -> Self {
        Self::metadata_unavailable(err)
    }
}

impl From<io::Error> for MediaError {
    fn from(err: io::Error) -> Self {
        Self::blob_unavailable(err)
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
