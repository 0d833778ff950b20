//! Alternate initial layouts for exercising the safety logic.

use metro_core::{MapSettings, MetroLayout, Point, TrackId, TrainConfig};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScenarioId {
    /// The reference network as configured
    #[default]
    Nominal,

    /// A longer circle-line train in a crowded spot, no avoidance
    FrontCollision,

    /// A north-south and a circle-line train meet on the same crossing
    JunctionConflict,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Nominal,
            ScenarioId::FrontCollision,
            ScenarioId::JunctionConflict,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Nominal => "nominal",
            ScenarioId::FrontCollision => "front_collision",
            ScenarioId::JunctionConflict => "junction_conflict",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Nominal => "Reference network, 10 trains on 3 lines",
            ScenarioId::FrontCollision => "cc03 lengthened and moved to (700, 700), collision avoidance off",
            ScenarioId::JunctionConflict => "ns01 and cc01 both inside the (300, 200) crossing",
        }
    }

    /// Builds the initial layout for this scenario.
    pub fn layout(&self) -> MetroLayout {
        let mut layout = MetroLayout::default_metro();
        match self {
            ScenarioId::Nominal => {}
            ScenarioId::FrontCollision => {
                replace_train(&mut layout, TrackId::Ccline, "cc03", Point::new(700, 700), 6);
            }
            ScenarioId::JunctionConflict => {
                replace_train(&mut layout, TrackId::Nsline, "ns01", Point::new(300, 210), 4);
                replace_train(&mut layout, TrackId::Ccline, "cc01", Point::new(300, 200), 5);
            }
        }
        layout
    }

    /// Adjusts runtime switches the scenario depends on.
    pub fn tune(&self, settings: &mut MapSettings) {
        match self {
            ScenarioId::Nominal => {}
            ScenarioId::FrontCollision | ScenarioId::JunctionConflict => {
                settings.collision_avoidance = false;
            }
        }
    }
}

fn replace_train(layout: &mut MetroLayout, track: TrackId, id: &str, head: Point, length: usize) {
    if let Some(track) = layout.track_mut(track) {
        if let Some(train) = track.trains.iter_mut().find(|t| t.id == id) {
            *train = TrainConfig {
                id: id.to_string(),
                head,
                length,
            };
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nominal" | "default" => Ok(ScenarioId::Nominal),
            "front_collision" | "frontcollision" | "collision" => Ok(ScenarioId::FrontCollision),
            "junction_conflict" | "junctionconflict" | "junction" => {
                Ok(ScenarioId::JunctionConflict)
            }
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metro_core::MetroMap;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn build(scenario: ScenarioId) -> MetroMap {
        let mut settings = MapSettings::default();
        scenario.tune(&mut settings);
        MetroMap::new(&scenario.layout(), settings, ChaCha8Rng::seed_from_u64(42))
    }

    #[test]
    fn test_scenario_parse_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.to_string().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("Junction".parse::<ScenarioId>(), Ok(ScenarioId::JunctionConflict));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_front_collision_layout() {
        let map = build(ScenarioId::FrontCollision);
        assert!(!map.settings().collision_avoidance);
        let cc03 = &map.trains(TrackId::Ccline)[2];
        assert_eq!(cc03.id(), "cc03");
        assert_eq!(cc03.head(), Point::new(700, 700));
        assert_eq!(cc03.len(), 6);
    }

    #[test]
    fn test_junction_conflict_flags_crossing() {
        let mut map = build(ScenarioId::JunctionConflict);
        map.tick();
        let crossing = map
            .junctions()
            .iter()
            .find(|j| j.position() == Point::new(300, 200))
            .map(|j| j.has_collision());
        assert_eq!(crossing, Some(true));
    }

    #[test]
    fn test_nominal_is_reference_network() {
        assert_eq!(ScenarioId::Nominal.layout(), MetroLayout::default_metro());
    }
}
