//! In-memory datagram transport with fault injection.
//!
//! A `SimRouter` plays the role of the LAN between the twin and its PLC/RTU
//! clients. Every bound `SimTransport` gets an inbox; delivery honours the
//! router's link-down set so tests can cut a client off and watch the bridge's
//! freshness stamps go stale.

use async_trait::async_trait;
use metro_env::{Datagram, DatagramTransport, EnvError, MAX_DATAGRAM_SIZE};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Inbox depth per endpoint.
const INBOX_CAPACITY: usize = 1024;

#[derive(Default)]
struct RouterState {
    /// Inbox senders by bound address
    inboxes: HashMap<SocketAddr, mpsc::Sender<Datagram>>,

    /// Endpoints whose traffic is silently dropped
    down: HashSet<SocketAddr>,

    /// Datagrams dropped so far
    dropped: u64,
}

/// Shared switchboard for simulated endpoints.
#[derive(Clone, Default)]
pub struct SimRouter {
    state: Arc<Mutex<RouterState>>,
}

impl SimRouter {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a new endpoint at `addr`.
    ///
    /// Rebinding an address replaces the previous inbox.
    pub fn bind(&self, addr: SocketAddr) -> SimTransport {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        self.state().inboxes.insert(addr, tx);
        SimTransport {
            addr,
            router: self.clone(),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Takes an endpoint off the network: everything to or from it is lost.
    pub fn set_link_down(&self, addr: SocketAddr) {
        self.state().down.insert(addr);
    }

    /// Restores an endpoint taken down with `set_link_down`.
    pub fn set_link_up(&self, addr: SocketAddr) {
        self.state().down.remove(&addr);
    }

    /// Heals all links.
    pub fn heal_all(&self) {
        self.state().down.clear();
    }

    /// Checks whether a datagram from `from` would reach `to`.
    pub fn can_communicate(&self, from: SocketAddr, to: SocketAddr) -> bool {
        let state = self.state();
        !state.down.contains(&from) && !state.down.contains(&to)
    }

    /// Number of datagrams dropped by fault injection.
    pub fn dropped(&self) -> u64 {
        self.state().dropped
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, datagram: Datagram, to: SocketAddr) -> Result<(), EnvError> {
        let inbox = {
            let mut state = self.state();
            if state.down.contains(&datagram.peer) || state.down.contains(&to) {
                state.dropped += 1;
                return Ok(());
            }
            let inbox = state.inboxes.get(&to).cloned();
            match inbox {
                Some(tx) => tx,
                // Datagrams to nobody vanish, as they would on a real LAN
                None => {
                    state.dropped += 1;
                    return Ok(());
                }
            }
        };

        inbox
            .try_send(datagram)
            .map_err(|e| EnvError::network(format!("delivery to {} failed: {}", to, e)))
    }
}

/// One endpoint on a `SimRouter`.
pub struct SimTransport {
    addr: SocketAddr,
    router: SimRouter,
    rx: tokio::sync::Mutex<mpsc::Receiver<Datagram>>,
}

impl SimTransport {
    /// The router this endpoint is attached to.
    pub fn router(&self) -> &SimRouter {
        &self.router
    }
}

#[async_trait]
impl DatagramTransport for SimTransport {
    async fn recv(&self) -> Result<Datagram, EnvError> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| EnvError::network("Channel closed"))
    }

    async fn send_to(&self, payload: &[u8], peer: SocketAddr) -> Result<(), EnvError> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(EnvError::Oversized(payload.len()));
        }
        self.router
            .deliver(Datagram::new(payload.to_vec(), self.addr), peer)
    }

    async fn wake(&self) -> Result<(), EnvError> {
        // Local wake-ups bypass fault injection
        let inbox = self.router.state().inboxes.get(&self.addr).cloned();
        match inbox {
            Some(tx) => tx
                .try_send(Datagram::new(Vec::new(), self.addr))
                .map_err(|e| EnvError::network(format!("wake failed: {}", e))),
            None => Err(EnvError::network("endpoint unbound")),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, EnvError> {
        Ok(self.addr)
    }
}
