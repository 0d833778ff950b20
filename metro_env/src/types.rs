//! Common types for the metro twin environment abstraction.

use std::net::SocketAddr;

/// Receive buffer size for a single request datagram.
pub const MAX_DATAGRAM_SIZE: usize = 8192;

/// One inbound datagram and the address to reply to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Raw request bytes
    pub payload: Vec<u8>,

    /// Sender address
    pub peer: SocketAddr,
}

impl Datagram {
    /// Creates a datagram from payload bytes.
    pub fn new(payload: Vec<u8>, peer: SocketAddr) -> Self {
        Self { payload, peer }
    }

    /// Returns true for the zero-length wake datagram.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
