//! Datagram transport abstraction for the data bridge.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::Datagram;
use std::net::SocketAddr;

/// Abstraction for connectionless request/response I/O.
///
/// # Implementations
///
/// - **Production**: `UdpTransport` over a tokio UDP socket
/// - **Simulation**: `SimTransport` (metro_sim), channel based
///
/// # Packet Flow
///
/// ```text
/// PLC / RTU                  Transport                  DataBridge
///   |                           |                          |
///   |-- "GET;sensors;{..}" ---->|                          |
///   |                           |-- recv() -> datagram --->|
///   |                           |<-- send_to(reply, peer) -|
///   |<-- "REP;sensors;{..}" ----|                          |
/// ```
#[async_trait]
pub trait DatagramTransport: Send + Sync + 'static {
    /// Receives the next datagram.
    ///
    /// # Blocking
    /// This method blocks until a datagram arrives. `wake()` is the only
    /// supported way to unblock it from another task.
    async fn recv(&self) -> Result<Datagram, EnvError>;

    /// Sends a datagram to `peer`.
    async fn send_to(&self, payload: &[u8], peer: SocketAddr) -> Result<(), EnvError>;

    /// Delivers an empty datagram to this transport so a blocked `recv()`
    /// returns. Used for cooperative shutdown.
    async fn wake(&self) -> Result<(), EnvError>;

    /// Returns the bound local address.
    fn local_addr(&self) -> Result<SocketAddr, EnvError>;
}
