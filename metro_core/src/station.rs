//! Station docking control.

use crate::geometry::{within, Facing, Point};
use crate::map::ControlMode;
use crate::track::TrackId;
use crate::train::Train;
use serde::{Deserialize, Serialize};

/// Middle carriage to platform distance that counts as docked.
pub const DOCK_RANGE: f64 = 5.0;

/// Head to station-signal distance at which a queued train is held.
pub const SIGNAL_APPROACH_RANGE: f64 = 20.0;

/// Distance of the station signal from the platform.
pub const SIGNAL_OFFSET: i32 = 40;

/// How the platform is drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

/// One station on one track.
///
/// While a train is docked the station can raise its blocking signal so that
/// the next train on the line waits at the signal point instead of running
/// into the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    id: String,
    track: TrackId,
    position: Point,
    orientation: Orientation,
    signal_position: Point,
    dwell_ticks: u32,
    docked: bool,
    signal_on: bool,
    empty_ticks: u32,
    /// Train that last got a dwell here, until it clears the platform
    serving: Option<String>,
}

impl Station {
    pub fn new(
        id: impl Into<String>,
        track: TrackId,
        position: Point,
        orientation: Orientation,
        signal_facing: Facing,
        dwell_ticks: u32,
        initial_empty_ticks: u32,
    ) -> Self {
        Self {
            id: id.into(),
            track,
            position,
            orientation,
            signal_position: signal_facing.offset(&position, SIGNAL_OFFSET),
            dwell_ticks: dwell_ticks.max(1),
            docked: false,
            signal_on: false,
            empty_ticks: initial_empty_ticks,
            serving: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn signal_position(&self) -> Point {
        self.signal_position
    }

    pub fn dwell_ticks(&self) -> u32 {
        self.dwell_ticks
    }

    pub fn is_docked(&self) -> bool {
        self.docked
    }

    pub fn signal_on(&self) -> bool {
        self.signal_on
    }

    /// Ticks since a train was last docked.
    pub fn empty_ticks(&self) -> u32 {
        self.empty_ticks
    }

    /// Sets the blocking signal (bridge command path).
    pub fn set_signal(&mut self, on: bool) {
        self.signal_on = on;
    }

    pub fn increment_empty(&mut self) {
        self.empty_ticks = self.empty_ticks.saturating_add(1);
    }

    /// Updates dock state from the trains on this station's track.
    ///
    /// The first train whose middle carriage is at the platform docks and ends
    /// the scan. Trains passed over before that whose head is at the signal
    /// point pick up the blocking signal as their waiting flag.
    ///
    /// A train gets one dwell per visit: once its dwell has run out it is not
    /// docked again until its middle carriage has left the platform.
    pub fn update_docking(&mut self, trains: &mut [Train], mode: ControlMode) {
        for train in trains.iter_mut() {
            if within(&self.position, &train.middle(), DOCK_RANGE) {
                self.docked = true;
                self.empty_ticks = 0;
                if mode == ControlMode::Standalone {
                    self.signal_on = true;
                }
                let departing = self.serving.as_deref() == Some(train.id());
                if train.dwell() == 0 && !departing {
                    train.set_dock_count(self.dwell_ticks);
                    self.serving = Some(train.id().to_string());
                }
                return;
            }
            if within(&self.signal_position, &train.head(), SIGNAL_APPROACH_RANGE) {
                train.set_waiting(self.signal_on);
            }
        }
        self.docked = false;
        self.signal_on = false;
        self.serving = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::pt;
    use crate::track::{Track, TrackKind};

    fn circle() -> Track {
        Track::new(
            TrackId::Ccline,
            TrackKind::Cyclic,
            vec![pt(200, 200), pt(1400, 200), pt(1400, 700), pt(200, 700)],
        )
    }

    fn serangoon() -> Station {
        Station::new(
            "Serangoon",
            TrackId::Ccline,
            pt(930, 200),
            Orientation::Horizontal,
            Facing::Left,
            4,
            10,
        )
    }

    #[test]
    fn test_signal_position_offset() {
        let station = serangoon();
        assert_eq!(station.signal_position(), pt(890, 200));
        let up = Station::new("x", TrackId::Weline, pt(100, 100), Orientation::Vertical, Facing::Up, 1, 0);
        assert_eq!(up.signal_position(), pt(100, 60));
    }

    #[test]
    fn test_dock_assigns_dwell() {
        let track = circle();
        let mut station = serangoon();
        // Middle carriage at (930, 200)
        let mut trains = vec![Train::new("cc01", &track, pt(950, 200), 5, 10).unwrap()];

        station.update_docking(&mut trains, ControlMode::Standalone);
        assert!(station.is_docked());
        assert!(station.signal_on());
        assert_eq!(station.empty_ticks(), 0);
        assert_eq!(trains[0].dwell(), 4);
        assert_eq!(trains[0].speed(), 0);

        // Still docked next tick: dwell is not re-assigned
        trains[0].advance(&track);
        station.update_docking(&mut trains, ControlMode::Standalone);
        assert_eq!(trains[0].dwell(), 3);
    }

    #[test]
    fn test_departing_train_is_not_docked_again() {
        let track = circle();
        let mut station = serangoon();
        // Middle carriage 5 short of the platform
        let mut trains = vec![Train::new("cc01", &track, pt(945, 200), 5, 10).unwrap()];

        station.update_docking(&mut trains, ControlMode::Standalone);
        assert_eq!(trains[0].dwell(), 4);
        for _ in 0..4 {
            trains[0].advance(&track);
            station.update_docking(&mut trains, ControlMode::Standalone);
        }
        // Released 5 past the platform: still in range but not re-docked
        assert_eq!(trains[0].middle(), pt(935, 200));
        assert!(station.is_docked());
        assert_eq!(trains[0].dwell(), 0);
        assert_eq!(trains[0].speed(), 10);

        trains[0].advance(&track);
        station.update_docking(&mut trains, ControlMode::Standalone);
        assert!(!station.is_docked());
        assert_eq!(trains[0].middle(), pt(945, 200));
    }

    #[test]
    fn test_external_mode_leaves_signal_to_plc() {
        let track = circle();
        let mut station = serangoon();
        let mut trains = vec![Train::new("cc01", &track, pt(950, 200), 5, 10).unwrap()];
        station.update_docking(&mut trains, ControlMode::External);
        assert!(station.is_docked());
        assert!(!station.signal_on());
    }

    #[test]
    fn test_queued_train_waits_at_signal() {
        let track = circle();
        let mut station = serangoon();
        station.set_signal(true);
        // Head 10 units before the signal point, nowhere near the platform
        let mut trains = vec![Train::new("cc02", &track, pt(880, 200), 5, 10).unwrap()];

        station.update_docking(&mut trains, ControlMode::External);
        assert!(trains[0].is_waiting());
        assert_eq!(trains[0].speed(), 0);
        assert!(!station.is_docked());
        assert!(!station.signal_on());

        station.update_docking(&mut trains, ControlMode::External);
        assert!(!trains[0].is_waiting());
        assert_eq!(trains[0].speed(), 10);
    }

    #[test]
    fn test_zero_dwell_still_releases() {
        let track = circle();
        let mut station = Station::new(
            "Serangoon",
            TrackId::Ccline,
            pt(930, 200),
            Orientation::Horizontal,
            Facing::Left,
            0,
            0,
        );
        assert_eq!(station.dwell_ticks(), 1);

        let mut trains = vec![Train::new("cc01", &track, pt(950, 200), 5, 10).unwrap()];
        station.update_docking(&mut trains, ControlMode::Standalone);
        assert_eq!(trains[0].speed(), 0);
        trains[0].advance(&track);
        assert_eq!(trains[0].speed(), 10);
        assert_eq!(trains[0].head(), pt(960, 200));
    }

    #[test]
    fn test_empty_counter() {
        let mut station = serangoon();
        station.update_docking(&mut [], ControlMode::Standalone);
        assert!(!station.is_docked());
        station.increment_empty();
        assert_eq!(station.empty_ticks(), 11);
    }
}
