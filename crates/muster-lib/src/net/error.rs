use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors the pool reports to an agent over the wire.
#[derive(Error, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Agent version '{0}' does not match pool version '{1}'")]
    VersionMismatch(String, String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("No server pool is hosted on this channel")]
    NotAServerPool,
    #[error("Invalid Message")]
    InvalidMessage,
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame exceeded max length")]
    FrameLength,
    #[error("Connection reset by peer")]
    ConnectionReset,
    #[error("I/O Error: {0}")]
    Io(std::io::Error),
    #[error("Serialization Error: {0}")]
    Bincode(bincode::Error),
}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<bincode::Error> for FrameError {
    fn from(e: bincode::Error) -> Self {
        Self::Bincode(e)
    }
}
