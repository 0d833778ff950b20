//! Metro Twin runtime
//!
//! Hosts the `MetroMap` behind one lock and exposes it two ways:
//! - a tick driver (`TwinWorld`) that advances the network on a fixed interval
//! - a data bridge (`DataBridge` + `BridgeServer`) answering PLC/RTU datagrams
//!
//! Both run against the `metro_env` traits, so the same code runs live (tokio
//! clock, UDP) or deterministically (virtual clock, in-memory datagrams).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        TwinWorld                         │
//! │   tick loop ──lock──► Arc<Mutex<MetroMap>> ◄──lock──┐    │
//! │                                                     │    │
//! │                    BridgeServer ── DataBridge ──────┘    │
//! │                        ▲                                 │
//! └────────────────────────┼─────────────────────────────────┘
//!                          │ REQ "GET;sensors;{..}" / "REP;.."
//!                   UdpTransport | SimTransport
//!                          │
//!                     PLC / RTU clients
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use metro_sim::{SimContext, TwinConfig, TwinWorld};
//!
//! let world = TwinWorld::new(TwinConfig::default(), SimContext::shared(42));
//! for _ in 0..100 {
//!     world.tick();
//! }
//! println!("{} collisions", world.snapshot().collision_count());
//! ```

mod bridge;
mod context;
mod exporter;
mod network;
mod protocol;
mod server;
mod world;
pub mod scenarios;

pub use bridge::{DataBridge, FetchClass, LinkStatus};
pub use context::SimContext;
pub use exporter::{TwinExport, TwinFrame};
pub use network::{SimRouter, SimTransport};
pub use protocol::{ProtocolError, Request, Resource, Verb};
pub use server::BridgeServer;
pub use world::{lock_map, SharedMap, TwinConfig, TwinWorld};
