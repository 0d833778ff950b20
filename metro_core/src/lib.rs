//! Metro Twin Core - the physical-process engine of a metro-rail digital twin
//!
//! Models the plant behind a PLC/RTU testbed:
//! - **Agents**: trains, sensor arrays, signals, stations and junctions
//! - **Orchestrator**: `MetroMap` advances every agent once per tick and
//!   resolves cross-track conflicts
//! - **Layout**: serde-loadable static topology (`MetroLayout`)
//!
//! The core is synchronous and I/O free. Hosts drive `MetroMap::tick` and
//! share the map with the protocol bridge behind one lock.

pub mod error;
pub mod geometry;
pub mod junction;
pub mod layout;
pub mod map;
pub mod sensor;
pub mod signal;
pub mod snapshot;
pub mod station;
pub mod track;
pub mod train;

// Re-export key types for convenience
pub use error::LayoutError;
pub use geometry::{Area, Facing, Point};
pub use junction::Junction;
pub use layout::{MetroLayout, TrainConfig};
pub use map::{ControlMode, MapSettings, MetroMap};
pub use sensor::{SensorArray, SensorRef};
pub use signal::{Signal, SignalRef};
pub use snapshot::MapSnapshot;
pub use station::{Orientation, Station};
pub use track::{PerTrack, Track, TrackId, TrackKind};
pub use train::{Telemetry, Train};
