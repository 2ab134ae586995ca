//! Object storage holding the photo files.
//!
//! The retention job only needs one capability from storage: delete an
//! object by key. Backends:
//!
//! - **Filesystem**: one file per key under a root directory (default)
//! - **S3**: an S3-compatible bucket (requires the `s3` feature)

mod filesystem;
#[cfg(feature = "s3")]
mod s3;

pub use filesystem::FilesystemStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

use thiserror::Error;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Delete capability over a bucket of photo objects.
///
/// Deleting a key that does not exist succeeds.
pub trait ObjectStore: Send + Sync {
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Backend type name for logging.
    fn backend_name(&self) -> &'static str;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Box<T> {
    fn delete(&self, key: &str) -> StorageResult<()> {
        (**self).delete(key)
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Build the backend named in the configuration.
///
/// There is no fallback backend: purging against the wrong store would mark
/// objects deleted that still exist elsewhere.
pub fn create_store(config: &StorageConfig) -> StorageResult<Box<dyn ObjectStore>> {
    let backend = config.backend.ok_or_else(|| {
        StorageError::Config(
            "No storage backend configured. Set [storage] backend or AWS_STORAGE_BUCKET_NAME".to_string(),
        )
    })?;
    match backend {
        StorageBackend::Filesystem => {
            info!(path = %config.filesystem.path.display(), "Using filesystem object storage");
            Ok(Box::new(FilesystemStore::new(&config.filesystem.path)?))
        }
        #[cfg(feature = "s3")]
        StorageBackend::S3 => {
            let s3_config = config.s3.clone().ok_or_else(|| {
                StorageError::Config("S3 backend requires a [storage.s3] section or AWS_STORAGE_BUCKET_NAME".to_string())
            })?;
            info!(bucket = %s3_config.bucket, "Using S3 object storage");
            Ok(Box::new(S3Store::new(s3_config)?))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(StorageError::Config(
            "S3 storage requires the 's3' feature. Rebuild with: cargo build --features s3".to_string(),
        )),
    }
}
