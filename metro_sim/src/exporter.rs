//! JSON exporter for offline rendering.
//!
//! Collects map snapshots during a run and writes them as one pretty-printed
//! document the render layer can replay.

use crate::scenarios::ScenarioId;
use metro_core::MapSnapshot;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single recorded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinFrame {
    /// Context time in seconds
    pub time_sec: f64,

    /// Full map state
    pub snapshot: MapSnapshot,
}

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwinExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Time of the last frame in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<TwinFrame>,

    /// Trains flagged as crashed in the last frame
    pub collisions: usize,
}

impl TwinExport {
    /// Creates a new export container.
    pub fn new(scenario: ScenarioId, seed: u64) -> Self {
        Self {
            scenario: scenario.name().to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            collisions: 0,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, time_sec: f64, snapshot: MapSnapshot) {
        self.duration_sec = time_sec;
        self.collisions = snapshot.collision_count();
        self.frames.push(TwinFrame { time_sec, snapshot });
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metro_core::{MapSettings, MetroLayout, MetroMap};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_export_round_trips_through_file() {
        let mut map = MetroMap::new(
            &MetroLayout::default_metro(),
            MapSettings::default(),
            ChaCha8Rng::seed_from_u64(9),
        );
        let mut export = TwinExport::new(ScenarioId::Nominal, 9);
        for i in 1..=3 {
            map.tick();
            export.add_frame(i as f64 * 0.1, map.snapshot());
        }
        assert_eq!(export.frames.len(), 3);
        assert!((export.duration_sec - 0.3).abs() < 1e-9);

        let path = std::env::temp_dir().join(format!("metro-export-{}.json", std::process::id()));
        export.write_to_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let loaded: TwinExport = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.scenario, "nominal");
        assert_eq!(loaded.frames.len(), 3);
        for (a, b) in loaded.frames.iter().zip(&export.frames) {
            assert_eq!(a.snapshot, b.snapshot);
        }
    }
}
