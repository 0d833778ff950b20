//! Wayside signals.
//!
//! A signal is a level-sensitive SR latch over two sensor subsets: while ON,
//! any active trigger-off sensor switches it OFF; while OFF, any active
//! trigger-on sensor switches it ON. `set_state` is the only other way to move
//! it, used for administrative overrides coming in over the bridge.

use crate::geometry::{Facing, Point};
use crate::sensor::{SensorArray, SensorRef};
use crate::track::{PerTrack, TrackId};
use serde::{Deserialize, Serialize};

/// One wayside signal. ON means trains must stop, OFF means pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    id: String,
    track: TrackId,
    position: Point,
    facing: Facing,
    on: bool,
    trigger_on: SensorRef,
    trigger_off: SensorRef,
}

impl Signal {
    /// Creates a signal in the OFF state.
    pub fn new(
        id: impl Into<String>,
        track: TrackId,
        position: Point,
        facing: Facing,
        trigger_on: SensorRef,
        trigger_off: SensorRef,
    ) -> Self {
        Self {
            id: id.into(),
            track,
            position,
            facing,
            on: false,
            trigger_on,
            trigger_off,
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

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn trigger_on(&self) -> &SensorRef {
        &self.trigger_on
    }

    pub fn trigger_off(&self) -> &SensorRef {
        &self.trigger_off
    }

    /// Administrative overwrite of the latch output.
    pub fn set_state(&mut self, on: bool) {
        self.on = on;
    }

    /// Runs one latch step against the current sensor readings.
    ///
    /// Returns true when the output changed.
    pub fn update_state(&mut self, sensors: &PerTrack<SensorArray>) -> bool {
        let next = if self.on {
            !self.trigger_off.any_active(sensors)
        } else {
            self.trigger_on.any_active(sensors)
        };
        let changed = next != self.on;
        self.on = next;
        changed
    }

    /// Breaks a junction deadlock in favour of the opposing track.
    ///
    /// Marks the trigger-off sensors as occupied, the trigger-on sensors as
    /// clear and drops the signal to OFF.
    pub fn manual_override_on_deadlock(&mut self, sensors: &mut PerTrack<SensorArray>) {
        self.trigger_off.force(sensors, true);
        self.trigger_on.force(sensors, false);
        self.on = false;
    }
}

/// Handle to one signal of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalRef {
    pub track: TrackId,
    pub index: usize,
}

impl SignalRef {
    pub fn new(track: TrackId, index: usize) -> Self {
        Self { track, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::pt;
    use proptest::prelude::*;

    fn sensors() -> PerTrack<SensorArray> {
        PerTrack::from_fn(|id| SensorArray::new(id, vec![pt(0, 0); 4]))
    }

    fn junction_signal() -> Signal {
        Signal::new(
            "we-0",
            TrackId::Weline,
            pt(160, 600),
            Facing::Up,
            SensorRef::new(TrackId::Ccline, vec![0]),
            SensorRef::new(TrackId::Ccline, vec![1]),
        )
    }

    #[test]
    fn test_latch_arms_and_releases() {
        let mut sensors = sensors();
        let mut signal = junction_signal();
        assert!(!signal.is_on());

        sensors[TrackId::Ccline].set_state(0, true);
        assert!(signal.update_state(&sensors));
        assert!(signal.is_on());

        // Trigger-on sensor clearing does not release the latch
        sensors[TrackId::Ccline].set_state(0, false);
        assert!(!signal.update_state(&sensors));
        assert!(signal.is_on());

        sensors[TrackId::Ccline].set_state(1, true);
        assert!(signal.update_state(&sensors));
        assert!(!signal.is_on());
    }

    #[test]
    fn test_latch_stable_without_triggers() {
        let sensors = sensors();
        let mut signal = junction_signal();
        signal.set_state(true);
        for _ in 0..5 {
            signal.update_state(&sensors);
        }
        assert!(signal.is_on());
    }

    #[test]
    fn test_manual_override_on_deadlock() {
        let mut sensors = sensors();
        let mut signal = junction_signal();
        sensors[TrackId::Ccline].set_state(0, true);
        signal.update_state(&sensors);

        signal.manual_override_on_deadlock(&mut sensors);
        assert!(!signal.is_on());
        assert!(!sensors[TrackId::Ccline].state(0));
        assert!(sensors[TrackId::Ccline].state(1));
    }

    proptest! {
        #[test]
        fn prop_latch_holds_when_no_trigger_active(
            initial in any::<bool>(),
            noise in proptest::collection::vec(any::<bool>(), 2),
            steps in 1usize..20,
        ) {
            // Only sensors outside both trigger sets change; the output must not move
            let mut sensors = sensors();
            sensors[TrackId::Ccline].set_state(2, noise[0]);
            sensors[TrackId::Ccline].set_state(3, noise[1]);
            let mut signal = junction_signal();
            signal.set_state(initial);
            for _ in 0..steps {
                prop_assert!(!signal.update_state(&sensors));
            }
            prop_assert_eq!(signal.is_on(), initial);
        }
    }
}
