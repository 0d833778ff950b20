//! Production implementations backed by Tokio.

use crate::error::EnvError;
use crate::network::DatagramTransport;
use crate::types::{Datagram, MAX_DATAGRAM_SIZE};
use crate::context::{stream_seed, TwinContext};
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::net::UdpSocket;

/// Production context backed by Tokio.
///
/// Time comes from the system clock. Randomness comes from the OS unless a
/// non-zero seed is given, in which case telemetry streams are reproducible
/// while the clock stays real.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// 0 = entropy
    seed: u64,
}

impl TokioContext {
    /// Creates a new TokioContext drawing randomness from the OS.
    pub fn new() -> Self {
        Self::seeded(0)
    }

    /// Creates a context whose RNG streams derive from `seed` (0 = entropy).
    pub fn seeded(seed: u64) -> Self {
        Self {
            start: Instant::now(),
            seed,
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TwinContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::debug!("spawning task {}", name);
        tokio::spawn(future);
    }

    fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        if self.seed == 0 {
            ChaCha8Rng::from_entropy()
        } else {
            ChaCha8Rng::seed_from_u64(stream_seed(self.seed, stream))
        }
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

/// UDP transport used by the data bridge in production.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds a UDP socket on `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self, EnvError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    /// Address a local client should use to reach this socket.
    ///
    /// A wildcard bind is mapped onto the loopback address of the same family.
    fn reachable_addr(&self) -> Result<SocketAddr, EnvError> {
        let mut addr = self.socket.local_addr()?;
        if addr.ip().is_unspecified() {
            let loopback = match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            addr.set_ip(loopback);
        }
        Ok(addr)
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn recv(&self) -> Result<Datagram, EnvError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, peer) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok(Datagram::new(buf, peer))
    }

    async fn send_to(&self, payload: &[u8], peer: SocketAddr) -> Result<(), EnvError> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(EnvError::Oversized(payload.len()));
        }
        self.socket.send_to(payload, peer).await?;
        Ok(())
    }

    async fn wake(&self) -> Result<(), EnvError> {
        let target = self.reachable_addr()?;
        let any: SocketAddr = match target.ip() {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let waker = UdpSocket::bind(any).await?;
        waker.send_to(&[], target).await?;
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr, EnvError> {
        Ok(self.socket.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn loopback() -> SocketAddr {
        (Ipv4Addr::LOCALHOST, 0).into()
    }

    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[test]
    fn test_tokio_context_seed() {
        let ctx = TokioContext::new();
        assert_eq!(ctx.seed(), 0);

        // Entropy-seeded streams should not line up
        let a: u64 = ctx.derive_rng(1).gen();
        let b: u64 = ctx.derive_rng(1).gen();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tokio_context_seeded_streams() {
        let ctx = TokioContext::seeded(42);
        assert_eq!(ctx.seed(), 42);

        let a: u64 = ctx.derive_rng(1).gen();
        let b: u64 = ctx.derive_rng(1).gen();
        let c: u64 = ctx.derive_rng(2).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_udp_round_trip() {
        let server = UdpTransport::bind(loopback()).await.unwrap();
        let client = UdpTransport::bind(loopback()).await.unwrap();
        let server_addr = server.local_addr().unwrap();

        client.send_to(b"GET;login;{}", server_addr).await.unwrap();
        let datagram = server.recv().await.unwrap();
        assert_eq!(datagram.payload, b"GET;login;{}".to_vec());
        assert_eq!(datagram.peer, client.local_addr().unwrap());

        server.send_to(b"REP;login;{}", datagram.peer).await.unwrap();
        let reply = client.recv().await.unwrap();
        assert_eq!(reply.payload, b"REP;login;{}".to_vec());
    }

    #[tokio::test]
    async fn test_udp_wake_unblocks_recv() {
        let server = Arc::new(UdpTransport::bind(loopback()).await.unwrap());
        let receiver = Arc::clone(&server);
        let pending = tokio::spawn(async move { receiver.recv().await });

        server.wake().await.unwrap();
        let datagram = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(datagram.is_empty());
    }

    #[tokio::test]
    async fn test_udp_rejects_oversized() {
        let transport = UdpTransport::bind(loopback()).await.unwrap();
        let payload = vec![b'x'; MAX_DATAGRAM_SIZE + 1];
        let target = transport.local_addr().unwrap();
        assert!(matches!(
            transport.send_to(&payload, target).await,
            Err(EnvError::Oversized(_))
        ));
    }
}
