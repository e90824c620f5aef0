//! Error types for breadboard-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("invalid circuit: {0}")]
    InvalidCircuit(String),

    #[error("malformed element record: {0}")]
    MalformedRecord(String),
}

pub type Result<T> = std::result::Result<T, Error>;
