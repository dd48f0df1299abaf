use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unknown completion state: {0}")]
    UnknownCompletionState(i64),
}
