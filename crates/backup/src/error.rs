use flexpage_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid backup tree: {0}")]
    InvalidTree(String),
}
