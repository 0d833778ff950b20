//! Train-detection sensor arrays.
//!
//! Each track owns one array of fixed detection points. Activation is
//! recomputed from scratch every tick, so a sensor has no memory of earlier
//! ticks: it is active exactly while some train's box covers it.

use crate::geometry::Point;
use crate::track::{PerTrack, TrackId};
use crate::train::Train;
use serde::{Deserialize, Serialize};

/// The detection points of one track and their current activation.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorArray {
    track: TrackId,
    points: Vec<Point>,
    states: Vec<bool>,
}

impl SensorArray {
    /// Creates an array with every sensor inactive.
    pub fn new(track: TrackId, points: Vec<Point>) -> Self {
        let states = vec![false; points.len()];
        Self {
            track,
            points,
            states,
        }
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn states(&self) -> &[bool] {
        &self.states
    }

    /// Activation of sensor `idx`; out-of-range indices read as inactive.
    pub fn state(&self, idx: usize) -> bool {
        self.states.get(idx).copied().unwrap_or(false)
    }

    /// Overwrites one sensor. Returns false if `idx` is out of range.
    pub fn set_state(&mut self, idx: usize, state: bool) -> bool {
        match self.states.get_mut(idx) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    /// Indices of all currently active sensors.
    pub fn active_indices(&self) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(idx, &active)| active.then_some(idx))
            .collect()
    }

    /// Recomputes every sensor from the trains' bounding boxes.
    pub fn refresh(&mut self, trains: &[Train]) {
        let areas: Vec<_> = trains.iter().map(Train::area).collect();
        for (state, point) in self.states.iter_mut().zip(&self.points) {
            *state = areas.iter().any(|area| area.contains(point));
        }
    }
}

/// Handle to a subset of one track's sensors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRef {
    pub track: TrackId,
    pub indices: Vec<usize>,
}

impl SensorRef {
    pub fn new(track: TrackId, indices: Vec<usize>) -> Self {
        Self { track, indices }
    }

    /// True when any referenced sensor is active.
    pub fn any_active(&self, sensors: &PerTrack<SensorArray>) -> bool {
        let array = &sensors[self.track];
        self.indices.iter().any(|&idx| array.state(idx))
    }

    /// Forces every referenced sensor to `state`.
    pub fn force(&self, sensors: &mut PerTrack<SensorArray>, state: bool) {
        let array = &mut sensors[self.track];
        for &idx in &self.indices {
            array.set_state(idx, state);
        }
    }
}
