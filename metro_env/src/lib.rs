//! Metro Twin Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seams that let the twin run either
//! against the real world (tokio clock, OS entropy, UDP sockets) or inside a
//! fully controlled test harness (virtual clock, seeded RNG, in-memory
//! datagrams).
//!
//! # Core Concept
//!
//! Everything that would make a run non-reproducible is routed through a trait:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Randomness (`derive_rng()`), used for synthetic train telemetry
//! - Network (`recv()`, `send_to()`, `wake()`)
//!
//! # Example
//!
//! ```ignore
//! use metro_env::{DatagramTransport, TwinContext};
//!
//! async fn serve<Ctx: TwinContext, Net: DatagramTransport>(ctx: &Ctx, net: &Net) {
//!     while let Ok(datagram) = net.recv().await {
//!         let reply = handle(ctx.system_time(), &datagram.payload);
//!         let _ = net.send_to(&reply, datagram.peer).await;
//!     }
//! }
//! ```

mod context;
mod network;
mod types;
mod error;
mod tokio_impl;

pub use context::{stream_seed, TwinContext};
pub use network::DatagramTransport;
pub use types::{Datagram, MAX_DATAGRAM_SIZE};
pub use error::EnvError;
pub use tokio_impl::{TokioContext, UdpTransport};
