//! TwinWorld - the shared map and the tick driver around it.

use crate::exporter::TwinExport;
use crate::scenarios::ScenarioId;
use metro_core::{MapSettings, MapSnapshot, MetroMap};
use metro_env::TwinContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// RNG stream reserved for train telemetry.
pub const TELEMETRY_STREAM: u64 = 1;

/// The map as shared between the tick loop and the data bridge.
pub type SharedMap = Arc<Mutex<MetroMap>>;

/// Locks the map, recovering it if a previous holder panicked.
///
/// A tick either completes or panics before releasing the guard, so a
/// poisoned map is still internally consistent per agent.
pub fn lock_map(map: &SharedMap) -> MutexGuard<'_, MetroMap> {
    map.lock().unwrap_or_else(|poisoned| {
        warn!("Map lock poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Configuration for a twin run.
#[derive(Debug, Clone)]
pub struct TwinConfig {
    /// Wall time between ticks
    pub tick_interval: Duration,

    /// Map behaviour switches
    pub settings: MapSettings,

    /// Initial train layout
    pub scenario: ScenarioId,

    /// Record a snapshot every N ticks (0 = never)
    pub export_every: u64,

    /// A PLC/RTU class counts as offline after this long without a fetch
    pub plc_timeout: Duration,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            settings: MapSettings::default(),
            scenario: ScenarioId::Nominal,
            export_every: 10,
            plc_timeout: Duration::from_secs(2),
        }
    }
}

/// The running twin: configuration, context and the shared map.
pub struct TwinWorld<Ctx: TwinContext> {
    /// Configuration
    pub config: TwinConfig,

    /// Shared context (clock, randomness)
    pub context: Arc<Ctx>,

    map: SharedMap,
}

impl<Ctx: TwinContext> TwinWorld<Ctx> {
    /// Builds the map for the configured scenario.
    pub fn new(config: TwinConfig, context: Arc<Ctx>) -> Self {
        let layout = config.scenario.layout();
        let mut settings = config.settings.clone();
        config.scenario.tune(&mut settings);

        let rng = context.derive_rng(TELEMETRY_STREAM);
        let map = MetroMap::new(&layout, settings, rng);
        info!(
            "🚆 Twin ready: scenario={} mode={} seed={}",
            config.scenario,
            map.settings().mode,
            context.seed()
        );

        Self {
            config,
            context,
            map: Arc::new(Mutex::new(map)),
        }
    }

    /// Returns a handle to the shared map.
    pub fn map(&self) -> SharedMap {
        Arc::clone(&self.map)
    }

    /// Advances the map by one tick and returns the new tick count.
    pub fn tick(&self) -> u64 {
        let mut map = lock_map(&self.map);
        map.tick();
        map.tick_count()
    }

    /// Current state of the whole network.
    pub fn snapshot(&self) -> MapSnapshot {
        lock_map(&self.map).snapshot()
    }

    /// Ticks until `stop` is raised or `max_ticks` have run, sleeping one
    /// interval between ticks. Returns the number of ticks run.
    pub async fn run(
        &self,
        stop: &AtomicBool,
        max_ticks: Option<u64>,
        mut export: Option<&mut TwinExport>,
    ) -> u64 {
        let mut ticks = 0;
        while !stop.load(Ordering::SeqCst) {
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }

            let tick = self.tick();
            ticks += 1;

            if let Some(export) = export.as_deref_mut() {
                if self.config.export_every > 0 && tick % self.config.export_every == 0 {
                    export.add_frame(self.context.now().as_secs_f64(), self.snapshot());
                }
            }
            if tick % 100 == 0 {
                let snapshot = self.snapshot();
                debug!(
                    "  t={:.1}s | tick={} | collisions={}",
                    self.context.now().as_secs_f64(),
                    tick,
                    snapshot.collision_count()
                );
            }

            self.context.sleep(self.config.tick_interval).await;
        }
        ticks
    }
}
