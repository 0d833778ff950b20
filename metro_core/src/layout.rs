//! Static network layout.
//!
//! `MetroLayout` is the already-parsed topology the orchestrator is built
//! from: track polylines, initial trains, sensor points, signals with their
//! trigger sensors, stations, junctions, and the cross-track priority tables.
//! It is plain serde data so a host can load it from JSON, and
//! [`MetroLayout::default_metro`] reproduces the reference four-line network.

use crate::error::LayoutError;
use crate::geometry::{pt, Facing, Point};
use crate::station::Orientation;
use crate::track::{PerTrack, TrackId, TrackKind};
use serde::{Deserialize, Serialize};

/// Initial placement of one train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub id: String,
    /// Head position; should lie on an axis-aligned segment of the track
    pub head: Point,
    /// Number of carriages
    pub length: usize,
}

/// One wayside signal and the sensors that drive its latch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub id: String,
    pub position: Point,
    #[serde(default)]
    pub facing: Facing,
    /// Track whose sensor array holds both trigger sets
    pub trigger_track: TrackId,
    /// Sensor indices that switch the signal ON
    pub on: Vec<usize>,
    /// Sensor indices that switch the signal OFF
    pub off: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: String,
    pub position: Point,
    #[serde(default)]
    pub orientation: Orientation,
    /// Side of the platform the blocking signal sits on
    #[serde(default)]
    pub signal_facing: Facing,
    /// Dwell override; the map default applies when absent
    #[serde(default)]
    pub dwell_ticks: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunctionConfig {
    pub position: Point,
    pub tracks: [TrackId; 2],
    /// Signal indices guarding the crossing, one list per entry of `tracks`
    #[serde(default)]
    pub signals: [Vec<usize>; 2],
}

/// A yield-track signal and the opposing signals it must not be ON with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalConflict {
    pub signal: usize,
    pub opposing_track: TrackId,
    pub opposing: Vec<usize>,
}

/// A yield-track sensor that is reported clear while any of the listed
/// higher-priority sensors is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRule {
    pub sensor: usize,
    pub track: TrackId,
    pub indices: Vec<usize>,
}

/// Everything the map needs to know about one track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackLayout {
    pub id: TrackId,
    #[serde(default)]
    pub kind: TrackKind,
    pub points: Vec<Point>,
    #[serde(default)]
    pub trains: Vec<TrainConfig>,
    #[serde(default)]
    pub sensors: Vec<Point>,
    /// Half-open range of sensor indices reported to the junction PLC
    #[serde(default)]
    pub junction_sensor_range: (usize, usize),
    /// Sensor indices reported to the block PLC, in wire order
    #[serde(default)]
    pub block_sensors: Vec<usize>,
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
    /// Signals driven by the built-in latch
    #[serde(default)]
    pub junction_signals: Vec<usize>,
    /// Signals written by the block PLC, in wire order
    #[serde(default)]
    pub block_signals: Vec<usize>,
    /// `None` means the station table was never supplied
    #[serde(default)]
    pub stations: Option<Vec<StationConfig>>,
    /// Tracks whose junction signals are latched after this track moves
    #[serde(default)]
    pub latch_refresh: Vec<TrackId>,
}

impl TrackLayout {
    /// A track with no geometry and nothing on it.
    pub fn empty(id: TrackId) -> Self {
        Self {
            id,
            kind: TrackKind::Cyclic,
            points: Vec::new(),
            trains: Vec::new(),
            sensors: Vec::new(),
            junction_sensor_range: (0, 0),
            block_sensors: Vec::new(),
            signals: Vec::new(),
            junction_signals: Vec::new(),
            block_signals: Vec::new(),
            stations: Some(Vec::new()),
            latch_refresh: Vec::new(),
        }
    }
}

/// The complete network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetroLayout {
    pub tracks: Vec<TrackLayout>,
    #[serde(default)]
    pub junctions: Vec<JunctionConfig>,
    /// Lowest-priority track at crossings
    pub yield_track: TrackId,
    #[serde(default)]
    pub conflicts: Vec<SignalConflict>,
    #[serde(default)]
    pub priority: Vec<PriorityRule>,
}

impl MetroLayout {
    /// Parses a layout from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn track(&self, id: TrackId) -> Option<&TrackLayout> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut TrackLayout> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    /// Lists every inconsistency `sanitized` would repair.
    pub fn validate(&self) -> Vec<LayoutError> {
        self.sanitized().1
    }

    /// Returns a copy with exactly one entry per track, in `TrackId` order,
    /// and every dangling index removed, together with what was removed.
    pub fn sanitized(&self) -> (MetroLayout, Vec<LayoutError>) {
        let mut errors = Vec::new();

        let mut tracks: Vec<TrackLayout> = TrackId::ALL
            .iter()
            .map(|&id| match self.track(id) {
                Some(track) => track.clone(),
                None => {
                    errors.push(LayoutError::missing(id, "track"));
                    TrackLayout::empty(id)
                }
            })
            .collect();

        let sensor_counts: PerTrack<usize> =
            PerTrack::from_fn(|id| tracks[id.index()].sensors.len());

        for track in tracks.iter_mut() {
            let id = track.id;
            if track.points.is_empty() && !track.trains.is_empty() {
                errors.push(LayoutError::missing(id, "track points"));
                track.trains.clear();
            }
            track.trains.retain(|train| {
                if train.length == 0 {
                    errors.push(LayoutError::invalid_index(id, "carriage count", 0));
                }
                train.length > 0
            });

            let count = track.sensors.len();
            let (start, end) = track.junction_sensor_range;
            if end > count || start > end {
                errors.push(LayoutError::invalid_index(id, "junction sensor range", end));
                let end = end.min(count);
                track.junction_sensor_range = (start.min(end), end);
            }
            retain_valid(&mut track.block_sensors, count, id, "block sensor", &mut errors);

            for signal in track.signals.iter_mut() {
                let limit = sensor_counts[signal.trigger_track];
                let trigger = signal.trigger_track;
                retain_valid(&mut signal.on, limit, trigger, "trigger-on sensor", &mut errors);
                retain_valid(&mut signal.off, limit, trigger, "trigger-off sensor", &mut errors);
            }

            let signals = track.signals.len();
            retain_valid(&mut track.junction_signals, signals, id, "junction signal", &mut errors);
            retain_valid(&mut track.block_signals, signals, id, "block signal", &mut errors);

            match track.stations.as_mut() {
                Some(stations) => {
                    for station in stations.iter_mut().filter(|s| s.dwell_ticks == Some(0)) {
                        errors.push(LayoutError::invalid_value(id, "station dwell", 0));
                        station.dwell_ticks = Some(1);
                    }
                }
                None => {
                    errors.push(LayoutError::missing(id, "stations"));
                    track.stations = Some(Vec::new());
                }
            }
        }

        let signal_counts: PerTrack<usize> =
            PerTrack::from_fn(|id| tracks[id.index()].signals.len());
        let sensor_counts: PerTrack<usize> =
            PerTrack::from_fn(|id| tracks[id.index()].sensors.len());

        let mut junctions = self.junctions.clone();
        for junction in junctions.iter_mut() {
            for (track, indices) in junction.tracks.iter().zip(junction.signals.iter_mut()) {
                retain_valid(indices, signal_counts[*track], *track, "junction signal", &mut errors);
            }
        }

        let yield_track = self.yield_track;
        let conflicts = self
            .conflicts
            .iter()
            .filter(|conflict| {
                let own = conflict.signal < signal_counts[yield_track];
                let opposing = conflict
                    .opposing
                    .iter()
                    .all(|&idx| idx < signal_counts[conflict.opposing_track]);
                if !own {
                    errors.push(LayoutError::invalid_index(yield_track, "conflict signal", conflict.signal));
                } else if !opposing {
                    errors.push(LayoutError::invalid_index(
                        conflict.opposing_track,
                        "opposing signal",
                        conflict.opposing.iter().copied().max().unwrap_or_default(),
                    ));
                }
                own && opposing
            })
            .cloned()
            .collect();

        let mut priority = Vec::with_capacity(self.priority.len());
        for rule in &self.priority {
            if rule.sensor >= sensor_counts[yield_track] {
                errors.push(LayoutError::invalid_index(yield_track, "priority sensor", rule.sensor));
                continue;
            }
            let mut rule = rule.clone();
            retain_valid(&mut rule.indices, sensor_counts[rule.track], rule.track, "priority sensor", &mut errors);
            priority.push(rule);
        }

        let layout = MetroLayout {
            tracks,
            junctions,
            yield_track,
            conflicts,
            priority,
        };
        (layout, errors)
    }

    /// The reference network: west-east, north-south, circle and maintenance
    /// lines with ten trains, twelve junctions and twenty-two stations.
    pub fn default_metro() -> Self {
        use Facing::{Down, Left, Right, Up};
        use TrackId::{Ccline, Mtline, Nsline, Weline};

        let weline = TrackLayout {
            id: Weline,
            kind: TrackKind::Cyclic,
            points: vec![
                pt(50, 200),
                pt(100, 200),
                pt(100, 600),
                pt(600, 600),
                pt(600, 800),
                pt(900, 800),
                pt(900, 400),
                pt(1550, 400),
                pt(1550, 450),
                pt(950, 450),
                pt(950, 850),
                pt(550, 850),
                pt(550, 650),
                pt(50, 650),
            ],
            trains: vec![
                train("we01", 50, 200, 5),
                train("we02", 460, 600, 5),
                train("we03", 1500, 400, 5),
                train("we04", 800, 850, 5),
            ],
            sensors: vec![
                pt(100, 400),
                pt(170, 600),
                pt(270, 600),
                pt(600, 670),
                pt(600, 770),
                pt(900, 730),
                pt(900, 630),
                pt(1370, 400),
                pt(1470, 400),
                pt(1430, 450),
                pt(1330, 450),
                pt(950, 670),
                pt(950, 770),
                pt(550, 730),
                pt(550, 650),
                pt(230, 650),
                pt(130, 650),
                // block sensors
                pt(600, 600),
                pt(1140, 400),
                pt(950, 480),
                pt(640, 850),
            ],
            junction_sensor_range: (0, 17),
            block_sensors: vec![0, 1, 17, 3, 5, 6, 18, 7, 19, 11, 20, 13],
            signals: vec![
                signal("we-0", 160, 600, Up, Ccline, &[12], &[13]),
                signal("we-1", 240, 650, Up, Ccline, &[12], &[13]),
                signal("we-2", 600, 660, Right, Ccline, &[10], &[11]),
                signal("we-3", 550, 740, Left, Ccline, &[10], &[11]),
                signal("we-4", 900, 740, Left, Ccline, &[8], &[9]),
                signal("we-5", 950, 660, Right, Ccline, &[8], &[9]),
                signal("we-6", 1360, 400, Up, Ccline, &[6], &[7]),
                signal("we-7", 1440, 450, Up, Ccline, &[6], &[7]),
                signal("we-8", 100, 340, Right, Weline, &[0], &[1]),
                signal("we-9", 540, 600, Up, Weline, &[17], &[3]),
                signal("we-10", 880, 800, Up, Weline, &[5], &[6]),
                signal("we-11", 1080, 400, Up, Weline, &[18], &[7]),
                signal("we-12", 980, 450, Down, Weline, &[19], &[11]),
                signal("we-13", 700, 850, Up, Weline, &[20], &[13]),
            ],
            junction_signals: (0..8).collect(),
            block_signals: (8..14).collect(),
            stations: Some(vec![
                station("Tuas_Link", 80, 200, Orientation::Horizontal),
                station("Jurong_East", 360, 600, Orientation::Horizontal),
                station("Outram_Park", 750, 800, Orientation::Horizontal),
                station("City_Hall", 900, 500, Orientation::Vertical),
                station("Paya_Lebar", 1250, 400, Orientation::Horizontal),
                station("Changi_Airport", 1550, 430, Orientation::Vertical),
                station("Lavender", 1100, 450, Orientation::Horizontal),
                station("Raffles_Place", 850, 850, Orientation::Horizontal),
                station("Clementi", 430, 650, Orientation::Horizontal),
                station("Boon_Lay", 50, 450, Orientation::Vertical),
            ]),
            latch_refresh: vec![Ccline],
        };

        let nsline = TrackLayout {
            id: Nsline,
            kind: TrackKind::Cyclic,
            points: vec![
                pt(300, 50),
                pt(1200, 50),
                pt(1200, 300),
                pt(800, 300),
                pt(800, 600),
                pt(700, 600),
                pt(700, 100),
                pt(400, 100),
                pt(400, 450),
                pt(300, 450),
            ],
            trains: vec![
                train("ns01", 1000, 50, 4),
                train("ns02", 1100, 300, 4),
                train("ns03", 600, 100, 4),
            ],
            sensors: vec![
                pt(300, 230),
                pt(300, 130),
                pt(1200, 170),
                pt(1200, 270),
                pt(700, 230),
                pt(700, 130),
                pt(400, 170),
                pt(400, 270),
                // block sensors
                pt(300, 340),
                pt(760, 50),
                pt(800, 400),
            ],
            junction_sensor_range: (0, 8),
            block_sensors: vec![8, 1, 9, 2, 10, 4],
            signals: vec![
                signal("ns-0", 300, 240, Left, Ccline, &[0], &[1]),
                signal("ns-1", 400, 160, Right, Ccline, &[0], &[1]),
                signal("ns-2", 700, 240, Right, Ccline, &[2], &[3]),
                signal("ns-3", 1200, 160, Right, Ccline, &[4], &[5]),
                signal("ns-4", 300, 400, Right, Nsline, &[8], &[1]),
                signal("ns-5", 700, 50, Up, Nsline, &[9], &[2]),
                signal("ns-6", 800, 340, Right, Nsline, &[10], &[4]),
            ],
            junction_signals: (0..4).collect(),
            block_signals: (4..7).collect(),
            stations: Some(vec![
                station("Jurong_East", 360, 450, Orientation::Horizontal),
                station("Woodlands", 430, 50, Orientation::Horizontal),
                station("Yishun", 1040, 50, Orientation::Horizontal),
                station("Orchard", 980, 300, Orientation::Horizontal),
                station("City_Hall", 750, 600, Orientation::Horizontal),
                station("Bishan", 550, 100, Orientation::Horizontal),
            ]),
            latch_refresh: vec![Ccline],
        };

        let ccline = TrackLayout {
            id: Ccline,
            kind: TrackKind::Cyclic,
            points: vec![pt(200, 200), pt(1400, 200), pt(1400, 700), pt(200, 700)],
            trains: vec![
                train("cc01", 1100, 200, 5),
                train("cc02", 1300, 700, 5),
                train("cc03", 300, 700, 5),
            ],
            sensors: vec![
                pt(270, 200),
                pt(480, 200),
                pt(670, 200),
                pt(770, 200),
                pt(1170, 200),
                pt(1270, 200),
                pt(1400, 370),
                pt(1400, 500),
                pt(980, 700),
                pt(830, 700),
                pt(630, 700),
                pt(460, 700),
                pt(200, 700),
                pt(200, 530),
                // block sensors
                pt(200, 360),
                pt(600, 200),
                pt(1080, 200),
                pt(1400, 260),
                pt(1320, 700),
            ],
            junction_sensor_range: (0, 14),
            block_sensors: vec![14, 0, 15, 2, 16, 4, 17, 6, 18, 8, 12, 13],
            signals: vec![
                signal("cc-0", 260, 200, Up, Nsline, &[0, 6], &[1, 7]),
                signal("cc-1", 660, 200, Up, Nsline, &[4], &[5]),
                signal("cc-2", 1160, 200, Up, Nsline, &[2], &[3]),
                signal("cc-3", 1400, 360, Right, Weline, &[7, 9], &[8, 10]),
                signal("cc-4", 990, 700, Up, Weline, &[5, 11], &[6, 12]),
                signal("cc-5", 640, 700, Up, Weline, &[3, 13], &[4, 14]),
                signal("cc-6", 210, 700, Up, Weline, &[1, 15], &[2, 16]),
                signal("cc-7", 200, 420, Right, Ccline, &[14], &[0]),
                signal("cc-8", 540, 200, Up, Ccline, &[15], &[2]),
                signal("cc-9", 1020, 200, Up, Ccline, &[16], &[4]),
                signal("cc-10", 1400, 200, Up, Ccline, &[17], &[6]),
                signal("cc-11", 1380, 700, Up, Ccline, &[18], &[8]),
                signal("cc-12", 265, 700, Up, Ccline, &[12], &[13]),
            ],
            junction_signals: (0..7).collect(),
            block_signals: (7..13).collect(),
            stations: Some(vec![
                station("Buona_Vista", 320, 700, Orientation::Horizontal),
                station("Farrer_Road", 200, 300, Orientation::Vertical),
                station("Serangoon", 930, 200, Orientation::Horizontal),
                station("Nicoll_Highway", 1400, 600, Orientation::Vertical),
                station("Bayfront", 1160, 700, Orientation::Horizontal),
                station("Harbourfront", 710, 700, Orientation::Horizontal),
            ]),
            latch_refresh: vec![Weline, Nsline],
        };

        let mtline = TrackLayout {
            id: Mtline,
            kind: TrackKind::Cyclic,
            points: vec![pt(460, 320), pt(640, 320), pt(640, 480), pt(460, 480)],
            trains: Vec::new(),
            sensors: vec![pt(640, 340), pt(640, 460)],
            junction_sensor_range: (0, 2),
            block_sensors: Vec::new(),
            signals: vec![signal("mt-0", 460, 400, Right, Mtline, &[0], &[1])],
            junction_signals: Vec::new(),
            block_signals: Vec::new(),
            stations: Some(Vec::new()),
            latch_refresh: Vec::new(),
        };

        let ns_cc = [Nsline, Ccline];
        let we_cc = [Weline, Ccline];
        let junctions = vec![
            junction(300, 200, ns_cc, 0, 0),
            junction(400, 200, ns_cc, 1, 0),
            junction(700, 200, ns_cc, 2, 1),
            junction(1200, 200, ns_cc, 3, 2),
            junction(1400, 400, we_cc, 6, 3),
            junction(1400, 450, we_cc, 7, 3),
            junction(950, 700, we_cc, 5, 4),
            junction(900, 700, we_cc, 4, 4),
            junction(600, 700, we_cc, 2, 5),
            junction(550, 700, we_cc, 3, 5),
            junction(200, 650, we_cc, 1, 6),
            junction(200, 600, we_cc, 0, 6),
        ];

        let conflicts = vec![
            conflict(0, Nsline, &[0, 1]),
            conflict(1, Nsline, &[2]),
            conflict(2, Nsline, &[3]),
            conflict(3, Weline, &[6, 7]),
            conflict(4, Weline, &[4, 5]),
            conflict(5, Weline, &[2, 3]),
            conflict(6, Weline, &[0, 1]),
        ];

        let priority = vec![
            rule(0, Nsline, &[0]),
            rule(2, Nsline, &[4]),
            rule(4, Nsline, &[2]),
            rule(6, Nsline, &[2]),
            rule(8, Weline, &[7, 9]),
            rule(10, Weline, &[5, 11]),
            rule(12, Weline, &[3, 13]),
            rule(14, Weline, &[1, 15]),
        ];

        MetroLayout {
            tracks: vec![weline, nsline, ccline, mtline],
            junctions,
            yield_track: Ccline,
            conflicts,
            priority,
        }
    }
}

fn retain_valid(
    indices: &mut Vec<usize>,
    limit: usize,
    track: TrackId,
    what: &str,
    errors: &mut Vec<LayoutError>,
) {
    indices.retain(|&idx| {
        if idx >= limit {
            errors.push(LayoutError::invalid_index(track, what, idx));
        }
        idx < limit
    });
}

fn train(id: &str, x: i32, y: i32, length: usize) -> TrainConfig {
    TrainConfig {
        id: id.to_string(),
        head: pt(x, y),
        length,
    }
}

fn signal(
    id: &str,
    x: i32,
    y: i32,
    facing: Facing,
    trigger_track: TrackId,
    on: &[usize],
    off: &[usize],
) -> SignalConfig {
    SignalConfig {
        id: id.to_string(),
        position: pt(x, y),
        facing,
        trigger_track,
        on: on.to_vec(),
        off: off.to_vec(),
    }
}

fn station(id: &str, x: i32, y: i32, orientation: Orientation) -> StationConfig {
    StationConfig {
        id: id.to_string(),
        position: pt(x, y),
        orientation,
        signal_facing: Facing::Left,
        dwell_ticks: None,
    }
}

fn junction(x: i32, y: i32, tracks: [TrackId; 2], first: usize, second: usize) -> JunctionConfig {
    JunctionConfig {
        position: pt(x, y),
        tracks,
        signals: [vec![first], vec![second]],
    }
}

fn conflict(signal: usize, opposing_track: TrackId, opposing: &[usize]) -> SignalConflict {
    SignalConflict {
        signal,
        opposing_track,
        opposing: opposing.to_vec(),
    }
}

fn rule(sensor: usize, track: TrackId, indices: &[usize]) -> PriorityRule {
    PriorityRule {
        sensor,
        track,
        indices: indices.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metro_is_consistent() {
        let layout = MetroLayout::default_metro();
        assert!(layout.validate().is_empty(), "{:?}", layout.validate());

        let trains: usize = layout.tracks.iter().map(|t| t.trains.len()).sum();
        let signals: usize = layout.tracks.iter().map(|t| t.signals.len()).sum();
        let stations: usize = layout
            .tracks
            .iter()
            .map(|t| t.stations.as_ref().map_or(0, Vec::len))
            .sum();
        assert_eq!(trains, 10);
        assert_eq!(signals, 35);
        assert_eq!(stations, 22);
        assert_eq!(layout.junctions.len(), 12);
    }

    #[test]
    fn test_json_round_trip() {
        let layout = MetroLayout::default_metro();
        let json = serde_json::to_string(&layout).unwrap();
        assert!(json.contains("\"ccline\""));
        assert_eq!(MetroLayout::from_json_str(&json).unwrap(), layout);
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "tracks": [
                {"id": "mtline", "points": [[0, 0], [100, 0]],
                 "stations": [{"id": "Depot", "position": [50, 0]}]}
            ],
            "yield_track": "ccline"
        }"#;
        let layout = MetroLayout::from_json_str(json).unwrap();
        let track = layout.track(TrackId::Mtline).unwrap();
        assert_eq!(track.kind, TrackKind::Cyclic);
        let depot = &track.stations.as_ref().unwrap()[0];
        assert_eq!(depot.signal_facing, Facing::Left);
        assert_eq!(depot.orientation, Orientation::Horizontal);
        assert_eq!(depot.dwell_ticks, None);
    }

    #[test]
    fn test_sanitized_fills_missing_tracks() {
        let mut layout = MetroLayout::default_metro();
        layout.tracks.retain(|t| t.id != TrackId::Nsline);

        let (clean, errors) = layout.sanitized();
        assert_eq!(clean.tracks.len(), TrackId::COUNT);
        assert_eq!(clean.tracks[1].id, TrackId::Nsline);
        assert!(clean.tracks[1].points.is_empty());
        assert!(errors.contains(&LayoutError::missing(TrackId::Nsline, "track")));
        // Circle-line signals triggered by the vanished sensors lose their triggers
        let cc0 = &clean.track(TrackId::Ccline).unwrap().signals[0];
        assert!(cc0.on.is_empty());
        assert!(cc0.off.is_empty());
        // Conflicts against vanished signals are dropped
        assert!(clean.conflicts.iter().all(|c| c.opposing_track != TrackId::Nsline));
    }

    #[test]
    fn test_sanitized_drops_dangling_indices() {
        let mut layout = MetroLayout::default_metro();
        {
            let we = layout.track_mut(TrackId::Weline).unwrap();
            we.block_sensors.push(99);
            we.block_signals.push(40);
            we.junction_sensor_range = (0, 30);
            we.stations = None;
            we.trains.push(train("we05", 100, 300, 0));
        }

        let (clean, errors) = layout.sanitized();
        let we = clean.track(TrackId::Weline).unwrap();
        assert_eq!(we.block_sensors.len(), 12);
        assert_eq!(we.block_signals, (8..14).collect::<Vec<_>>());
        assert_eq!(we.junction_sensor_range, (0, 21));
        assert_eq!(we.stations, Some(Vec::new()));
        assert_eq!(we.trains.len(), 4);
        assert!(errors.contains(&LayoutError::invalid_index(TrackId::Weline, "block sensor", 99)));
        assert!(errors.contains(&LayoutError::missing(TrackId::Weline, "stations")));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_sanitized_raises_zero_dwell() {
        let mut layout = MetroLayout::default_metro();
        if let Some(stations) = layout.track_mut(TrackId::Ccline).unwrap().stations.as_mut() {
            stations[0].dwell_ticks = Some(0);
        }

        let (clean, errors) = layout.sanitized();
        let stations = clean.track(TrackId::Ccline).unwrap().stations.as_ref().unwrap();
        assert_eq!(stations[0].dwell_ticks, Some(1));
        assert_eq!(errors, vec![LayoutError::invalid_value(TrackId::Ccline, "station dwell", 0)]);
    }
}
