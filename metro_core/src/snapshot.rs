//! Serializable views of the map state for the render layer and exporters.

use crate::geometry::{Facing, Point};
use crate::junction::{Junction, Occupancy};
use crate::signal::Signal;
use crate::station::{Orientation, Station};
use crate::track::{TrackId, TrackKind};
use crate::train::{Telemetry, Train};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSnapshot {
    pub id: String,
    pub carriages: Vec<Point>,
    pub speed: u32,
    pub dwell: u32,
    pub emergency_stop: bool,
    pub waiting: bool,
    pub collision: bool,
    pub power: bool,
    pub telemetry: Telemetry,
}

impl From<&Train> for TrainSnapshot {
    fn from(train: &Train) -> Self {
        Self {
            id: train.id().to_string(),
            carriages: train.carriages().to_vec(),
            speed: train.speed(),
            dwell: train.dwell(),
            emergency_stop: train.is_emergency_stopped(),
            waiting: train.is_waiting(),
            collision: train.has_collision(),
            power: train.power_state(),
            telemetry: train.telemetry(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub id: String,
    pub position: Point,
    pub facing: Facing,
    pub on: bool,
}

impl From<&Signal> for SignalSnapshot {
    fn from(signal: &Signal) -> Self {
        Self {
            id: signal.id().to_string(),
            position: signal.position(),
            facing: signal.facing(),
            on: signal.is_on(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSnapshot {
    pub id: String,
    pub position: Point,
    pub orientation: Orientation,
    pub signal_position: Point,
    pub docked: bool,
    pub signal_on: bool,
    pub empty_ticks: u32,
}

impl From<&Station> for StationSnapshot {
    fn from(station: &Station) -> Self {
        Self {
            id: station.id().to_string(),
            position: station.position(),
            orientation: station.orientation(),
            signal_position: station.signal_position(),
            docked: station.is_docked(),
            signal_on: station.signal_on(),
            empty_ticks: station.empty_ticks(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionSnapshot {
    pub id: String,
    pub position: Point,
    pub occupancy: [Occupancy; 2],
    pub collision: bool,
}

impl From<&Junction> for JunctionSnapshot {
    fn from(junction: &Junction) -> Self {
        Self {
            id: junction.id().to_string(),
            position: junction.position(),
            occupancy: *junction.occupancy(),
            collision: junction.has_collision(),
        }
    }
}

/// Everything on one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub kind: TrackKind,
    pub points: Vec<Point>,
    pub trains: Vec<TrainSnapshot>,
    pub sensors: Vec<bool>,
    pub signals: Vec<SignalSnapshot>,
    pub stations: Vec<StationSnapshot>,
}

/// Full map state after one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub tick: u64,
    pub tracks: Vec<TrackSnapshot>,
    pub junctions: Vec<JunctionSnapshot>,
}

impl MapSnapshot {
    pub fn track(&self, id: TrackId) -> Option<&TrackSnapshot> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Number of trains currently flagged as crashed.
    pub fn collision_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| &t.trains)
            .filter(|t| t.collision)
            .count()
    }
}
