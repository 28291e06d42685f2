//! Error types for the texture system

use thiserror::Error;

/// Main error type for the texture system
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no image reader for \"{0}\"")]
    UnknownFormat(String),

    #[error("open failed for \"{0}\": {1}")]
    Open(String, String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("malformed texture container: {0}")]
    Container(String),

    #[error("texture file \"{0}\" is broken")]
    Broken(String),
}
