//! Track crossings.

use crate::geometry::Point;
use crate::signal::SignalRef;
use crate::track::{PerTrack, TrackId};
use crate::train::Train;
use serde::{Deserialize, Serialize};

/// Extra margin around a train's box when testing junction entry.
pub const ENTRY_MARGIN: i32 = 15;

/// Which train, if any, currently occupies one side of a junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub track: TrackId,
    pub train: Option<usize>,
}

/// A crossing of exactly two tracks.
///
/// Each side records the index of the first train (in configuration order)
/// that covers the crossing point. Two occupied sides is a conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    id: String,
    position: Point,
    slots: [Occupancy; 2],
    signals: Vec<SignalRef>,
}

impl Junction {
    pub fn new(
        id: impl Into<String>,
        position: Point,
        tracks: [TrackId; 2],
        signals: Vec<SignalRef>,
    ) -> Self {
        Self {
            id: id.into(),
            position,
            slots: tracks.map(|track| Occupancy { track, train: None }),
            signals,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn tracks(&self) -> [TrackId; 2] {
        self.slots.map(|slot| slot.track)
    }

    pub fn occupancy(&self) -> &[Occupancy; 2] {
        &self.slots
    }

    /// Signals that guard this crossing.
    pub fn signals(&self) -> &[SignalRef] {
        &self.signals
    }

    /// Both sides occupied at once.
    pub fn has_collision(&self) -> bool {
        self.slots.iter().all(|slot| slot.train.is_some())
    }

    /// Re-detects the occupying train on each side.
    pub fn refresh(&mut self, trains: &PerTrack<Vec<Train>>) {
        let position = self.position;
        for slot in self.slots.iter_mut() {
            slot.train = trains[slot.track]
                .iter()
                .position(|train| train.area().expanded(ENTRY_MARGIN).contains(&position));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::pt;
    use crate::track::{Track, TrackKind};

    fn tracks() -> (Track, Track) {
        let ns = Track::new(
            TrackId::Nsline,
            TrackKind::Cyclic,
            vec![pt(300, 50), pt(300, 450), pt(400, 450), pt(400, 50)],
        );
        let cc = Track::new(
            TrackId::Ccline,
            TrackKind::Cyclic,
            vec![pt(200, 200), pt(1400, 200), pt(1400, 700), pt(200, 700)],
        );
        (ns, cc)
    }

    fn crossing() -> Junction {
        Junction::new("jc-0", pt(300, 200), [TrackId::Nsline, TrackId::Ccline], vec![])
    }

    #[test]
    fn test_collision_needs_both_sides() {
        let (ns, cc) = tracks();
        let mut trains: PerTrack<Vec<Train>> = PerTrack::default();
        let mut junction = crossing();

        junction.refresh(&trains);
        assert!(!junction.has_collision());

        // Circle-line train just past the crossing: box [255, 305] padded by 15
        trains[TrackId::Ccline].push(Train::new("cc01", &cc, pt(300, 200), 5, 10).unwrap());
        junction.refresh(&trains);
        assert_eq!(junction.occupancy()[1].train, Some(0));
        assert!(!junction.has_collision());

        trains[TrackId::Nsline].push(Train::new("ns09", &ns, pt(300, 600), 4, 10).unwrap());
        trains[TrackId::Nsline].push(Train::new("ns01", &ns, pt(300, 230), 4, 10).unwrap());
        junction.refresh(&trains);
        assert_eq!(junction.occupancy()[0].train, Some(1));
        assert!(junction.has_collision());

        trains[TrackId::Ccline].clear();
        junction.refresh(&trains);
        assert!(!junction.has_collision());
        assert_eq!(junction.occupancy()[1].train, None);
    }
}
