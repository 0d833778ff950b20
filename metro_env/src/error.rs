//! Error types for the metro twin environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Socket-level failure (bind, send, receive)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport closed or unable to deliver
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Datagram exceeded the receive buffer
    #[error("Datagram too large: {0} bytes")]
    Oversized(usize),
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }
}
