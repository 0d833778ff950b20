//! Train kinematics and telemetry.
//!
//! A train is a chain of carriage positions that each chase their own
//! next-waypoint index along the track polyline. Motion is a discrete step of
//! `speed` map units per tick, not a physics integration.

use crate::error::LayoutError;
use crate::geometry::{distance, step_towards, within, Area, Point};
use crate::signal::Signal;
use crate::track::{Track, TrackId};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Spacing between consecutive carriages at layout time.
pub const CARRIAGE_SPACING: i32 = 10;

/// Padding around head and tail used for the occupancy box.
pub const AREA_MARGIN: i32 = 5;

/// Reach of a signal around any carriage.
const SIGNAL_CARRIAGE_RANGE: f64 = 5.0;

/// Reach of a signal ahead of the head carriage.
const SIGNAL_HEAD_RANGE: f64 = 20.0;

/// Synthesized field readings, refreshed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Telemetry {
    /// Front-train proximity sensor
    pub front_sensor: bool,
    /// Speedometer reading (km/h)
    pub speed: u32,
    /// Traction supply voltage (V)
    pub voltage: u32,
    /// Traction current (A)
    pub current: u32,
}

/// One train on one track.
#[derive(Debug, Clone, PartialEq)]
pub struct Train {
    id: String,
    track: TrackId,
    initial_head: Point,
    carriages: Vec<Point>,
    targets: Vec<usize>,
    direction: i32,
    speed: u32,
    default_speed: u32,
    dwell: u32,
    emergency_stop: bool,
    waiting: bool,
    collision: bool,
    telemetry: Telemetry,
}

impl Train {
    /// Places a train with its head at `head` on `track`.
    ///
    /// Fails when the track has no geometry or `length` is zero.
    pub fn new(
        id: impl Into<String>,
        track: &Track,
        head: Point,
        length: usize,
        default_speed: u32,
    ) -> Result<Self, LayoutError> {
        if track.point_count() == 0 {
            return Err(LayoutError::missing(track.id, "track points"));
        }
        if length == 0 {
            return Err(LayoutError::invalid_index(track.id, "carriage count", 0));
        }
        let (carriages, targets) = initial_layout(track, head, length);
        Ok(Self {
            id: id.into(),
            track: track.id,
            initial_head: head,
            carriages,
            targets,
            direction: 1,
            speed: default_speed,
            default_speed,
            dwell: 0,
            emergency_stop: false,
            waiting: false,
            collision: false,
            telemetry: Telemetry::default(),
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn len(&self) -> usize {
        self.carriages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carriages.is_empty()
    }

    pub fn carriages(&self) -> &[Point] {
        &self.carriages
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn head(&self) -> Point {
        self.carriages[0]
    }

    pub fn tail(&self) -> Point {
        self.carriages[self.carriages.len() - 1]
    }

    /// The carriage used for station docking.
    pub fn middle(&self) -> Point {
        self.carriages[self.carriages.len() / 2]
    }

    pub fn direction(&self) -> i32 {
        self.direction
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn default_speed(&self) -> u32 {
        self.default_speed
    }

    /// Remaining dwell ticks: 0 running, 1 final dwell tick, more when docked.
    pub fn dwell(&self) -> u32 {
        self.dwell
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stop
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn has_collision(&self) -> bool {
        self.collision
    }

    pub fn telemetry(&self) -> Telemetry {
        self.telemetry
    }

    /// Traction power is on unless emergency-stopped or crashed.
    pub fn power_state(&self) -> bool {
        !(self.emergency_stop || self.collision)
    }

    /// Axis-aligned box over head and tail.
    pub fn area(&self) -> Area {
        Area::spanning(&self.head(), &self.tail(), AREA_MARGIN)
    }

    /// True when any carriage lies within `threshold` of `point`.
    pub fn is_near(&self, point: &Point, threshold: f64) -> bool {
        self.carriages.iter().any(|c| within(c, point, threshold))
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Sets the running speed unless the train is held.
    pub fn set_speed(&mut self, speed: u32) {
        if self.emergency_stop || self.waiting {
            return;
        }
        self.speed = speed;
    }

    pub fn set_emergency_stop(&mut self, stop: bool) {
        self.emergency_stop = stop;
        self.speed = if stop || self.waiting {
            0
        } else {
            self.default_speed
        };
    }

    /// Flags a crash. A crashed train is also emergency-stopped.
    pub fn set_collision(&mut self, collision: bool) {
        self.collision = collision;
        if collision {
            self.set_emergency_stop(true);
        }
    }

    pub fn set_waiting(&mut self, waiting: bool) {
        if self.waiting == waiting {
            return;
        }
        self.waiting = waiting;
        self.speed = if waiting || self.emergency_stop {
            0
        } else {
            self.default_speed
        };
    }

    /// Starts a station dwell of `ticks` ticks.
    pub fn set_dock_count(&mut self, ticks: u32) {
        self.dwell = ticks;
        self.speed = 0;
    }

    // ========================================================================
    // PER-TICK BEHAVIOUR
    // ========================================================================

    /// Checks the gap between this train's head and the tail of `front`.
    ///
    /// Returns true when the front train is within `threshold`.
    pub fn check_collision_with_front(&mut self, front: &Train, threshold: f64) -> bool {
        if self.waiting {
            return false;
        }
        if within(&self.head(), &front.tail(), threshold) {
            if self.dwell == 0 {
                self.speed = 0;
            }
            self.telemetry.front_sensor = true;
            return true;
        }
        if self.speed == 0 && self.dwell <= 1 {
            self.set_speed(self.default_speed);
        }
        self.telemetry.front_sensor = false;
        false
    }

    /// Obeys the first signal in reach, if any.
    pub fn check_signal(&mut self, signals: &[Signal]) {
        let head = self.head();
        let reached = signals.iter().find(|signal| {
            let pos = signal.position();
            self.is_near(&pos, SIGNAL_CARRIAGE_RANGE) || within(&head, &pos, SIGNAL_HEAD_RANGE)
        });
        if let Some(signal) = reached {
            let speed = if signal.is_on() { 0 } else { self.default_speed };
            self.set_speed(speed);
        }
    }

    /// Moves the train one tick along `track`.
    pub fn advance(&mut self, track: &Track) {
        if self.emergency_stop || self.waiting {
            return;
        }
        if self.dwell > 1 {
            self.dwell -= 1;
            return;
        }
        if self.dwell == 1 {
            self.dwell = 0;
            if self.speed == 0 {
                self.speed = self.default_speed;
            }
        }
        let step = self.speed as f64;
        for (pos, target) in self.carriages.iter_mut().zip(self.targets.iter_mut()) {
            let Some(next) = track.point(*target) else {
                continue;
            };
            if distance(pos, &next) <= step {
                *pos = next;
                *target = track.step(*target, self.direction);
            } else {
                *pos = step_towards(pos, &next, step);
            }
        }
    }

    /// Turns the train around on `track`.
    ///
    /// Targets wrap modulo the point count on every track kind, so turning
    /// around twice restores the original targets.
    pub fn reverse_direction(&mut self, track: &Track) {
        self.direction = -self.direction;
        let count = track.point_count() as i64;
        if count == 0 {
            return;
        }
        for target in self.targets.iter_mut() {
            *target = (*target as i64 + self.direction as i64).rem_euclid(count) as usize;
        }
    }

    /// Puts the train back at its initial position with all flags cleared.
    pub fn reset(&mut self, track: &Track) {
        let (carriages, targets) = initial_layout(track, self.initial_head, self.carriages.len());
        self.carriages = carriages;
        self.targets = targets;
        self.direction = 1;
        self.speed = self.default_speed;
        self.dwell = 0;
        self.emergency_stop = false;
        self.waiting = false;
        self.collision = false;
        self.telemetry = Telemetry::default();
    }

    /// Refreshes the synthesized field readings.
    ///
    /// Readings fall in the stopped or moving band depending on the commanded
    /// speed and read zero while power is off.
    pub fn refresh_telemetry<R: Rng>(&mut self, rng: &mut R) {
        let moving = self.speed != 0;
        let speed = if moving {
            rng.gen_range(56..=100)
        } else {
            rng.gen_range(0..=5)
        };
        let voltage = 750 - rng.gen_range(0..=20);
        let current = if moving {
            rng.gen_range(150..=200)
        } else {
            rng.gen_range(10..=30)
        };

        let powered = self.power_state();
        self.telemetry.speed = if powered { speed } else { 0 };
        self.telemetry.voltage = if powered { voltage } else { 0 };
        self.telemetry.current = if powered { current } else { 0 };
    }
}

/// Computes carriage positions and targets for a head placed on `track`.
///
/// The first axis-aligned segment passing through the head picks the target
/// waypoint; carriages trail behind the head, away from that waypoint.
fn initial_layout(track: &Track, head: Point, length: usize) -> (Vec<Point>, Vec<usize>) {
    let target = track
        .points
        .windows(2)
        .position(|seg| {
            (seg[0].x == head.x && head.x == seg[1].x) || (seg[0].y == head.y && head.y == seg[1].y)
        })
        .map_or(0, |idx| idx + 1);

    let (dx, dy) = match track.point(target) {
        Some(aim) => {
            let dy = if head.x == aim.x {
                if head.y > aim.y {
                    1
                } else {
                    -1
                }
            } else {
                0
            };
            let dx = if head.y == aim.y {
                if head.x > aim.x {
                    1
                } else {
                    -1
                }
            } else {
                0
            };
            (dx, dy)
        }
        None => (0, 0),
    };

    let carriages = (0..length as i32)
        .map(|k| {
            Point::new(
                head.x + CARRIAGE_SPACING * dx * k,
                head.y + CARRIAGE_SPACING * dy * k,
            )
        })
        .collect();
    (carriages, vec![target; length])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{pt, Facing};
    use crate::sensor::SensorRef;
    use crate::track::TrackKind;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn circle() -> Track {
        Track::new(
            TrackId::Ccline,
            TrackKind::Cyclic,
            vec![pt(200, 200), pt(1400, 200), pt(1400, 700), pt(200, 700)],
        )
    }

    fn signal_at(position: Point, on: bool) -> Signal {
        let mut signal = Signal::new(
            "cc-x",
            TrackId::Ccline,
            position,
            Facing::Up,
            SensorRef::new(TrackId::Ccline, vec![]),
            SensorRef::new(TrackId::Ccline, vec![]),
        );
        signal.set_state(on);
        signal
    }

    #[test]
    fn test_initial_layout_trails_head() {
        let track = circle();
        let train = Train::new("cc01", &track, pt(1100, 200), 5, 10).unwrap();
        assert_eq!(train.targets(), &[1; 5]);
        assert_eq!(train.head(), pt(1100, 200));
        assert_eq!(train.tail(), pt(1060, 200));
        assert_eq!(train.middle(), pt(1080, 200));

        // Bottom edge runs right to left: carriages trail to the right
        let train = Train::new("cc03", &track, pt(300, 700), 5, 10).unwrap();
        assert_eq!(train.targets(), &[3; 5]);
        assert_eq!(train.tail(), pt(340, 700));
    }

    #[test]
    fn test_new_rejects_empty_track() {
        let track = Track::empty(TrackId::Mtline);
        assert!(matches!(
            Train::new("mt01", &track, pt(0, 0), 5, 10),
            Err(LayoutError::ConfigurationMissing { .. })
        ));
        assert!(Train::new("cc09", &circle(), pt(300, 200), 0, 10).is_err());
    }

    #[test]
    fn test_advance_moves_and_snaps() {
        let track = circle();
        let mut train = Train::new("cc01", &track, pt(1385, 200), 5, 10).unwrap();
        train.advance(&track);
        // Head was 15 away from (1400, 200): moves 10
        assert_eq!(train.head(), pt(1395, 200));
        train.advance(&track);
        // Within one step: snaps and retargets to the next corner
        assert_eq!(train.head(), pt(1400, 200));
        assert_eq!(train.targets()[0], 2);
    }

    #[test]
    fn test_emergency_stop_freezes() {
        let track = circle();
        let mut train = Train::new("cc01", &track, pt(1100, 200), 5, 10).unwrap();
        train.set_emergency_stop(true);
        assert_eq!(train.speed(), 0);
        assert!(!train.power_state());
        // Guarded: commanded speed is ignored while stopped
        train.set_speed(10);
        assert_eq!(train.speed(), 0);
        let before = train.carriages().to_vec();
        train.advance(&track);
        assert_eq!(train.carriages(), before.as_slice());

        train.set_emergency_stop(false);
        assert_eq!(train.speed(), 10);
        assert!(train.power_state());
    }

    #[test]
    fn test_collision_flag_cuts_power() {
        let track = circle();
        let mut train = Train::new("cc01", &track, pt(1100, 200), 5, 10).unwrap();
        train.set_collision(true);
        assert!(train.has_collision());
        assert!(train.is_emergency_stopped());
        train.set_emergency_stop(false);
        assert!(!train.power_state());
    }

    #[test]
    fn test_waiting_is_idempotent() {
        let track = circle();
        let mut train = Train::new("cc01", &track, pt(1100, 200), 5, 10).unwrap();
        train.set_waiting(true);
        assert_eq!(train.speed(), 0);
        train.set_waiting(true);
        assert!(train.is_waiting());
        train.set_waiting(false);
        assert_eq!(train.speed(), 10);
    }

    #[test]
    fn test_dwell_counts_down_before_moving() {
        let track = circle();
        let mut train = Train::new("cc01", &track, pt(1100, 200), 5, 10).unwrap();
        train.set_dock_count(3);
        assert_eq!(train.speed(), 0);

        let start = train.head();
        train.advance(&track);
        train.advance(&track);
        assert_eq!(train.dwell(), 1);
        assert_eq!(train.head(), start);

        // Final dwell tick: speed comes back before the move
        train.advance(&track);
        assert_eq!(train.dwell(), 0);
        assert_eq!(train.speed(), 10);
        assert_eq!(train.head(), pt(1110, 200));

        train.advance(&track);
        assert_eq!(train.head(), pt(1120, 200));
    }

    #[test]
    fn test_reverse_wraps_on_open_track() {
        let track = Track::new(
            TrackId::Mtline,
            TrackKind::Open,
            vec![pt(0, 0), pt(100, 100), pt(200, 200)],
        );
        let mut train = Train::new("mt01", &track, pt(50, 60), 3, 10).unwrap();
        assert_eq!(train.targets(), &[0; 3]);

        train.reverse_direction(&track);
        assert_eq!(train.targets(), &[2; 3]);
        train.reverse_direction(&track);
        assert_eq!(train.targets(), &[0; 3]);
    }

    #[test]
    fn test_collision_with_front() {
        let track = circle();
        let front = Train::new("cc01", &track, pt(1140, 200), 5, 10).unwrap();
        // Front tail at (1100, 200); rear head 20 units behind it
        let mut rear = Train::new("cc02", &track, pt(1080, 200), 5, 10).unwrap();

        assert!(rear.check_collision_with_front(&front, 25.0));
        assert_eq!(rear.speed(), 0);
        assert!(rear.telemetry().front_sensor);

        let far = Train::new("cc03", &track, pt(1300, 200), 5, 10).unwrap();
        assert!(!rear.check_collision_with_front(&far, 25.0));
        assert_eq!(rear.speed(), 10);
        assert!(!rear.telemetry().front_sensor);

        rear.set_waiting(true);
        assert!(!rear.check_collision_with_front(&front, 25.0));
    }

    #[test]
    fn test_check_signal_first_match() {
        let track = circle();
        let mut train = Train::new("cc01", &track, pt(1100, 200), 5, 10).unwrap();
        let signals = vec![
            signal_at(pt(600, 200), true),
            signal_at(pt(1115, 200), true),
            signal_at(pt(1110, 200), false),
        ];
        train.check_signal(&signals);
        assert_eq!(train.speed(), 0);

        let signals = vec![signal_at(pt(1070, 203), false)];
        train.check_signal(&signals);
        assert_eq!(train.speed(), 10);
    }

    #[test]
    fn test_reset_restores_layout() {
        let track = circle();
        let mut train = Train::new("cc01", &track, pt(1100, 200), 5, 10).unwrap();
        let initial = train.clone();
        for _ in 0..40 {
            train.advance(&track);
        }
        train.reverse_direction(&track);
        train.set_collision(true);
        train.set_dock_count(4);

        train.reset(&track);
        assert_eq!(train, initial);
        assert_eq!(train.len(), 5);
    }

    #[test]
    fn test_telemetry_bands() {
        let track = circle();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut train = Train::new("cc01", &track, pt(1100, 200), 5, 10).unwrap();

        for _ in 0..50 {
            train.refresh_telemetry(&mut rng);
            let t = train.telemetry();
            assert!((56..=100).contains(&t.speed));
            assert!((730..=750).contains(&t.voltage));
            assert!((150..=200).contains(&t.current));
        }

        train.set_waiting(true);
        train.refresh_telemetry(&mut rng);
        let t = train.telemetry();
        assert!(t.speed <= 5);
        assert!((10..=30).contains(&t.current));

        train.set_emergency_stop(true);
        train.refresh_telemetry(&mut rng);
        assert_eq!(
            train.telemetry(),
            Telemetry {
                front_sensor: false,
                speed: 0,
                voltage: 0,
                current: 0
            }
        );
    }

    proptest! {
        #[test]
        fn prop_reverse_twice_is_identity(ticks in 0usize..200, head_x in 201i32..1399) {
            let track = circle();
            let mut train = Train::new("cc01", &track, pt(head_x, 200), 5, 10).unwrap();
            for _ in 0..ticks {
                train.advance(&track);
            }
            let before = train.clone();
            train.reverse_direction(&track);
            train.reverse_direction(&track);
            prop_assert_eq!(train, before);
        }

        #[test]
        fn prop_reverse_twice_is_identity_on_open_track(ticks in 0usize..60, head_y in 51i32..449) {
            let track = Track::new(
                TrackId::Nsline,
                TrackKind::Open,
                vec![pt(300, 50), pt(300, 450), pt(400, 450)],
            );
            let mut train = Train::new("ns01", &track, pt(300, head_y), 4, 10).unwrap();
            for _ in 0..ticks {
                train.advance(&track);
            }
            let before = train.clone();
            train.reverse_direction(&track);
            train.reverse_direction(&track);
            prop_assert_eq!(train, before);
        }
    }
}
