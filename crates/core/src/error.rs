use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KbError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("invalid page range: {0}")]
    InvalidRange(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("pdf read error: {0}")]
    Read(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Coarse classification carried on the wire next to the error message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidRange,
    InvalidQuery,
    InvalidArgument,
    ReadError,
    Io,
    Internal,
}

impl KbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KbError::NotFound(_) => ErrorKind::NotFound,
            KbError::InvalidRange(_) => ErrorKind::InvalidRange,
            KbError::InvalidQuery(_) => ErrorKind::InvalidQuery,
            KbError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            KbError::Read(_) => ErrorKind::ReadError,
            KbError::Io(_) => ErrorKind::Io,
            KbError::Serialization(_) | KbError::Worker(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T, E = KbError> = std::result::Result<T, E>;
