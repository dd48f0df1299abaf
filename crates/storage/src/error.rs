use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("core error: {0}")]
    Core(#[from] flexpage_core::CoreError),
}
