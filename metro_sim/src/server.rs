//! Receive loop that feeds datagrams to the data bridge.

use crate::bridge::DataBridge;
use metro_env::{DatagramTransport, EnvError, TwinContext};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Serves bridge requests over any datagram transport until stopped.
pub struct BridgeServer<Ctx: TwinContext, Net: DatagramTransport> {
    bridge: Arc<DataBridge<Ctx>>,
    transport: Arc<Net>,
    stop: AtomicBool,
    served: AtomicU64,
}

impl<Ctx: TwinContext, Net: DatagramTransport> BridgeServer<Ctx, Net> {
    pub fn new(bridge: Arc<DataBridge<Ctx>>, transport: Arc<Net>) -> Self {
        Self {
            bridge,
            transport,
            stop: AtomicBool::new(false),
            served: AtomicU64::new(0),
        }
    }

    /// Runs the receive loop. Returns the number of replies sent.
    ///
    /// Transport hiccups are logged and the loop carries on; only a closed
    /// transport ends it early.
    pub async fn serve(&self) -> u64 {
        match self.transport.local_addr() {
            Ok(addr) => info!("📡 Data bridge listening on {}", addr),
            Err(e) => warn!("Data bridge listening on unknown address: {}", e),
        }

        while !self.is_stopped() {
            let datagram = match self.transport.recv().await {
                Ok(datagram) => datagram,
                Err(EnvError::NetworkError(msg)) => {
                    error!("Transport closed: {}", msg);
                    break;
                }
                Err(e) => {
                    warn!("Receive failed: {}", e);
                    continue;
                }
            };
            if self.is_stopped() {
                break;
            }

            let Some(reply) = self.bridge.handle(&datagram.payload) else {
                debug!("No reply for empty datagram from {}", datagram.peer);
                continue;
            };
            match self.transport.send_to(&reply, datagram.peer).await {
                Ok(()) => {
                    self.served.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!("Reply to {} failed: {}", datagram.peer, e),
            }
        }

        info!("Data bridge stopped after {} replies", self.served());
        self.served()
    }

    /// Raises the stop flag and wakes a blocked `serve`.
    pub async fn stop(&self) -> Result<(), EnvError> {
        self.stop.store(true, Ordering::SeqCst);
        self.transport.wake().await
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Replies sent so far.
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    pub fn bridge(&self) -> &Arc<DataBridge<Ctx>> {
        &self.bridge
    }
}
