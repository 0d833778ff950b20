//! Track identifiers, per-track storage and track polylines.

use crate::error::LayoutError;
use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// The lines of the metro network.
///
/// Declaration order is the deterministic iteration order used by the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackId {
    /// West-East line
    Weline,
    /// North-South line
    Nsline,
    /// Circle line
    Ccline,
    /// Maintenance line
    Mtline,
}

impl TrackId {
    /// Number of known tracks.
    pub const COUNT: usize = 4;

    /// All tracks in iteration order.
    pub const ALL: [TrackId; TrackId::COUNT] = [
        TrackId::Weline,
        TrackId::Nsline,
        TrackId::Ccline,
        TrackId::Mtline,
    ];

    /// Position of this track in `ALL`.
    pub fn index(self) -> usize {
        match self {
            TrackId::Weline => 0,
            TrackId::Nsline => 1,
            TrackId::Ccline => 2,
            TrackId::Mtline => 3,
        }
    }

    /// Wire key used by the PLC/RTU protocol.
    pub fn key(self) -> &'static str {
        match self {
            TrackId::Weline => "weline",
            TrackId::Nsline => "nsline",
            TrackId::Ccline => "ccline",
            TrackId::Mtline => "mtline",
        }
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for TrackId {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weline" => Ok(TrackId::Weline),
            "nsline" => Ok(TrackId::Nsline),
            "ccline" => Ok(TrackId::Ccline),
            "mtline" => Ok(TrackId::Mtline),
            _ => Err(LayoutError::UnknownTrack(s.to_string())),
        }
    }
}

/// Fixed-size mapping from every `TrackId` to a value.
#[derive(Debug, Clone, PartialEq)]
pub struct PerTrack<T>([T; TrackId::COUNT]);

impl<T> PerTrack<T> {
    /// Builds the mapping by calling `f` once per track, in order.
    pub fn from_fn(f: impl FnMut(TrackId) -> T) -> Self {
        Self(TrackId::ALL.map(f))
    }

    /// Iterates `(track, value)` pairs in track order.
    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &T)> {
        TrackId::ALL.into_iter().zip(self.0.iter())
    }

    /// Mutable variant of `iter`.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TrackId, &mut T)> {
        TrackId::ALL.into_iter().zip(self.0.iter_mut())
    }
}

impl<T: Default> Default for PerTrack<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<TrackId> for PerTrack<T> {
    type Output = T;

    fn index(&self, track: TrackId) -> &T {
        &self.0[track.index()]
    }
}

impl<T> IndexMut<TrackId> for PerTrack<T> {
    fn index_mut(&mut self, track: TrackId) -> &mut T {
        &mut self.0[track.index()]
    }
}

/// Topology of a track polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Ends are not connected; trains hold at the terminal point
    Open,
    /// Last point connects back to the first
    #[default]
    Cyclic,
}

/// A track: the ordered waypoints trains chase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub kind: TrackKind,
    pub points: Vec<Point>,
}

impl Track {
    /// Creates a track from its polyline.
    pub fn new(id: TrackId, kind: TrackKind, points: Vec<Point>) -> Self {
        Self { id, kind, points }
    }

    /// A track with no geometry (used when configuration is missing).
    pub fn empty(id: TrackId) -> Self {
        Self::new(id, TrackKind::Cyclic, Vec::new())
    }

    /// Number of waypoints.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Waypoint at `idx`.
    pub fn point(&self, idx: usize) -> Option<Point> {
        self.points.get(idx).copied()
    }

    /// Waypoint index reached from `idx` by moving one step in `direction`.
    ///
    /// Cyclic tracks wrap around; open tracks stay on their end points.
    pub fn step(&self, idx: usize, direction: i32) -> usize {
        let count = self.points.len() as i64;
        if count == 0 {
            return 0;
        }
        let next = idx as i64 + direction as i64;
        match self.kind {
            TrackKind::Cyclic => next.rem_euclid(count) as usize,
            TrackKind::Open if (0..count).contains(&next) => next as usize,
            TrackKind::Open => idx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::pt;

    fn square(kind: TrackKind) -> Track {
        Track::new(
            TrackId::Ccline,
            kind,
            vec![pt(0, 0), pt(100, 0), pt(100, 100), pt(0, 100)],
        )
    }

    #[test]
    fn test_track_id_round_trip() {
        for track in TrackId::ALL {
            assert_eq!(track.key().parse::<TrackId>().unwrap(), track);
            assert_eq!(TrackId::ALL[track.index()], track);
        }
        assert!(matches!(
            "config".parse::<TrackId>(),
            Err(LayoutError::UnknownTrack(_))
        ));
    }

    #[test]
    fn test_track_id_serde_key() {
        let json = serde_json::to_string(&TrackId::Nsline).unwrap();
        assert_eq!(json, "\"nsline\"");
    }

    #[test]
    fn test_per_track_order() {
        let mut counts: PerTrack<usize> = PerTrack::default();
        counts[TrackId::Ccline] = 3;
        let order: Vec<TrackId> = counts.iter().map(|(id, _)| id).collect();
        assert_eq!(order, TrackId::ALL.to_vec());
        assert_eq!(counts[TrackId::Ccline], 3);
        assert_eq!(counts[TrackId::Weline], 0);
    }

    #[test]
    fn test_cyclic_step_wraps() {
        let track = square(TrackKind::Cyclic);
        assert_eq!(track.step(3, 1), 0);
        assert_eq!(track.step(0, -1), 3);
        assert_eq!(track.step(1, 1), 2);
    }

    #[test]
    fn test_open_step_holds_at_ends() {
        let track = square(TrackKind::Open);
        assert_eq!(track.step(3, 1), 3);
        assert_eq!(track.step(0, -1), 0);
        assert_eq!(track.step(2, -1), 1);
    }
}
