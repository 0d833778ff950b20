//! The map orchestrator.
//!
//! `MetroMap` owns every per-track registry and advances them once per tick:
//! junction check, per-train collision/signal/junction handling and motion,
//! sensor refresh, signal latching, optional auto-correction, then station
//! docking. The bridge reads and writes the same registries between ticks.

use crate::error::LayoutError;
use crate::junction::Junction;
use crate::layout::{MetroLayout, PriorityRule, SignalConflict, TrackLayout, TrainConfig};
use crate::sensor::{SensorArray, SensorRef};
use crate::signal::{Signal, SignalRef};
use crate::snapshot::{
    JunctionSnapshot, MapSnapshot, SignalSnapshot, StationSnapshot, TrackSnapshot, TrainSnapshot,
};
use crate::station::Station;
use crate::track::{PerTrack, Track, TrackId};
use crate::train::Train;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{info, warn};

/// Who drives the signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// The built-in latch logic runs the network on its own
    #[default]
    Standalone,
    /// External PLCs command signals and train power over the bridge
    External,
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMode::Standalone => write!(f, "standalone"),
            ControlMode::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standalone" | "test" => Ok(ControlMode::Standalone),
            "external" | "plc" => Ok(ControlMode::External),
            _ => Err(format!("Unknown control mode: {}", s)),
        }
    }
}

/// Runtime behaviour switches and tuning constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSettings {
    pub mode: ControlMode,
    /// Trains slow down instead of crashing when too close
    pub collision_avoidance: bool,
    /// Force yield-track signals OFF when they conflict with opposing signals
    pub junction_auto_correct: bool,
    /// Break junctions whose bound signals are all ON
    pub deadlock_override: bool,
    pub default_speed: u32,
    /// Dwell for stations without their own setting
    pub default_dwell_ticks: u32,
    /// Head-to-tail distance that counts as a pending collision
    pub collision_threshold: f64,
    /// Empty-counter start value for new stations
    pub initial_empty_ticks: u32,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            mode: ControlMode::Standalone,
            collision_avoidance: true,
            junction_auto_correct: false,
            deadlock_override: false,
            default_speed: 10,
            default_dwell_ticks: 10,
            collision_threshold: 25.0,
            initial_empty_ticks: 10,
        }
    }
}

/// The live network.
pub struct MetroMap {
    settings: MapSettings,
    layout: MetroLayout,
    layout_errors: Vec<LayoutError>,
    tracks: PerTrack<Track>,
    trains: PerTrack<Vec<Train>>,
    sensors: PerTrack<SensorArray>,
    signals: PerTrack<Vec<Signal>>,
    stations: PerTrack<Vec<Station>>,
    junctions: Vec<Junction>,
    rng: ChaCha8Rng,
    tick_count: u64,
}

impl MetroMap {
    /// Builds every agent from `layout`.
    ///
    /// Layout problems are logged and repaired by dropping the offending
    /// entries; they are also kept for `layout_errors`.
    pub fn new(layout: &MetroLayout, settings: MapSettings, rng: ChaCha8Rng) -> Self {
        let (layout, layout_errors) = layout.sanitized();
        for error in &layout_errors {
            warn!("Layout problem: {}", error);
        }

        let tracks = PerTrack::from_fn(|id| {
            let cfg = &layout.tracks[id.index()];
            Track::new(id, cfg.kind, cfg.points.clone())
        });

        let mut map = Self {
            settings,
            layout,
            layout_errors,
            tracks,
            trains: PerTrack::default(),
            sensors: PerTrack::from_fn(|id| SensorArray::new(id, Vec::new())),
            signals: PerTrack::default(),
            stations: PerTrack::default(),
            junctions: Vec::new(),
            rng,
            tick_count: 0,
        };
        for id in TrackId::ALL {
            let trains = map.build_trains(id);
            map.trains[id] = trains;
        }
        map.build_wayside();

        info!(
            "Metro map ready: {} trains, {} signals, {} stations, {} junctions (mode={}, avoidance={})",
            map.trains.iter().map(|(_, t)| t.len()).sum::<usize>(),
            map.signals.iter().map(|(_, s)| s.len()).sum::<usize>(),
            map.stations.iter().map(|(_, s)| s.len()).sum::<usize>(),
            map.junctions.len(),
            map.settings.mode,
            map.settings.collision_avoidance,
        );
        map
    }

    fn track_layout(&self, id: TrackId) -> &TrackLayout {
        &self.layout.tracks[id.index()]
    }

    fn build_trains(&mut self, id: TrackId) -> Vec<Train> {
        let track = &self.tracks[id];
        let mut trains = Vec::new();
        for cfg in &self.layout.tracks[id.index()].trains {
            match Train::new(&cfg.id, track, cfg.head, cfg.length, self.settings.default_speed) {
                Ok(mut train) => {
                    if self.settings.mode == ControlMode::External {
                        // Traction stays off until a PLC powers the train
                        train.set_emergency_stop(true);
                    }
                    trains.push(train);
                }
                Err(error) => {
                    warn!("Dropping train {}: {}", cfg.id, error);
                    self.layout_errors.push(error);
                }
            }
        }
        trains
    }

    /// Rebuilds sensors, signals, stations and junctions from the layout.
    fn build_wayside(&mut self) {
        let settings = &self.settings;
        let layout = &self.layout;

        self.sensors = PerTrack::from_fn(|id| {
            SensorArray::new(id, layout.tracks[id.index()].sensors.clone())
        });

        self.signals = PerTrack::from_fn(|id| {
            layout.tracks[id.index()]
                .signals
                .iter()
                .map(|cfg| {
                    Signal::new(
                        cfg.id.clone(),
                        id,
                        cfg.position,
                        cfg.facing,
                        SensorRef::new(cfg.trigger_track, cfg.on.clone()),
                        SensorRef::new(cfg.trigger_track, cfg.off.clone()),
                    )
                })
                .collect()
        });

        self.stations = PerTrack::from_fn(|id| {
            layout.tracks[id.index()]
                .stations
                .iter()
                .flatten()
                .map(|cfg| {
                    Station::new(
                        cfg.id.clone(),
                        id,
                        cfg.position,
                        cfg.orientation,
                        cfg.signal_facing,
                        cfg.dwell_ticks.unwrap_or(settings.default_dwell_ticks),
                        settings.initial_empty_ticks,
                    )
                })
                .collect()
        });

        self.junctions = layout
            .junctions
            .iter()
            .enumerate()
            .map(|(i, cfg)| {
                let signals = cfg
                    .tracks
                    .iter()
                    .zip(&cfg.signals)
                    .flat_map(|(&track, indices)| {
                        indices.iter().map(move |&index| SignalRef::new(track, index))
                    })
                    .collect();
                Junction::new(format!("jc-{}", i), cfg.position, cfg.tracks, signals)
            })
            .collect();
    }

    // ========================================================================
    // TICK
    // ========================================================================

    /// Advances the whole network by one step.
    pub fn tick(&mut self) {
        let colliding = self.refresh_junctions();
        if self.settings.deadlock_override {
            self.resolve_junction_deadlock();
        }

        let latch = self.settings.mode == ControlMode::Standalone
            || self.settings.collision_avoidance;
        for id in TrackId::ALL {
            self.tick_trains(id, &colliding[id]);
            self.sensors[id].refresh(&self.trains[id]);
            if latch {
                self.refresh_latches(id);
            }
            if self.settings.junction_auto_correct {
                self.auto_correct_signals();
            }
        }

        self.update_stations();
        self.tick_count += 1;
    }

    /// Refreshes every junction and returns, per track, the indices of trains
    /// standing in a conflicting junction.
    fn refresh_junctions(&mut self) -> PerTrack<Vec<usize>> {
        let mut colliding: PerTrack<Vec<usize>> = PerTrack::default();
        for junction in self.junctions.iter_mut() {
            junction.refresh(&self.trains);
            if junction.has_collision() {
                for slot in junction.occupancy() {
                    if let Some(train) = slot.train {
                        colliding[slot.track].push(train);
                    }
                }
            }
        }
        colliding
    }

    fn tick_trains(&mut self, id: TrackId, colliding: &[usize]) {
        let avoidance = self.settings.collision_avoidance;
        let threshold = self.settings.collision_threshold;
        let yields = id == self.layout.yield_track;
        let track = &self.tracks[id];
        let signals = &self.signals[id];
        let trains = &mut self.trains[id];

        let count = trains.len();
        for i in 0..count {
            let mut detected = false;
            if count >= 2 {
                let (train, front) = pair_mut(trains, i, (i + 1) % count);
                detected = train.check_collision_with_front(front, threshold);
                if detected && !avoidance {
                    if !train.has_collision() {
                        warn!("💥 Collision on {}: {} ran into {}", id, train.id(), front.id());
                    }
                    train.set_emergency_stop(true);
                    train.set_collision(true);
                    front.set_emergency_stop(true);
                }
            }

            let train = &mut trains[i];
            if !detected {
                train.check_signal(signals);
            }
            if colliding.contains(&i) {
                if avoidance {
                    if yields {
                        train.set_speed(0);
                    }
                } else {
                    train.set_emergency_stop(true);
                }
            }
            train.refresh_telemetry(&mut self.rng);
            train.advance(track);
        }
    }

    /// Latches the junction signals on the tracks that depend on `id`.
    fn refresh_latches(&mut self, id: TrackId) {
        let layout = &self.layout;
        for &other in &layout.tracks[id.index()].latch_refresh {
            let signals = &mut self.signals[other];
            for &idx in &layout.tracks[other.index()].junction_signals {
                if let Some(signal) = signals.get_mut(idx) {
                    signal.update_state(&self.sensors);
                }
            }
        }
    }

    /// Forces yield-track signals OFF where they are ON together with all of
    /// their opposing signals. Returns how many were corrected.
    pub fn auto_correct_signals(&mut self) -> usize {
        let yield_track = self.layout.yield_track;
        let mut corrected = 0;
        for conflict in &self.layout.conflicts {
            let own_on = self.signals[yield_track]
                .get(conflict.signal)
                .is_some_and(Signal::is_on);
            if !own_on || !self.opposing_all_on(conflict) {
                continue;
            }
            warn!("Correcting {} signal {}: opposing signals are ON", yield_track, conflict.signal);
            if let Some(signal) = self.signals[yield_track].get_mut(conflict.signal) {
                signal.set_state(false);
                corrected += 1;
            }
        }
        corrected
    }

    fn opposing_all_on(&self, conflict: &SignalConflict) -> bool {
        let opposing = &self.signals[conflict.opposing_track];
        conflict
            .opposing
            .iter()
            .all(|&idx| opposing.get(idx).is_some_and(Signal::is_on))
    }

    /// Overrides the second bound signal of every junction whose bound
    /// signals are all ON. Returns how many junctions were overridden.
    pub fn resolve_junction_deadlock(&mut self) -> usize {
        let mut resolved = 0;
        for junction in &self.junctions {
            let bound = junction.signals();
            if bound.len() < 2 {
                continue;
            }
            let all_on = bound.iter().all(|r| {
                self.signals[r.track]
                    .get(r.index)
                    .is_some_and(Signal::is_on)
            });
            if !all_on {
                continue;
            }
            let target = bound[1];
            if let Some(signal) = self.signals[target.track].get_mut(target.index) {
                warn!("Deadlock at {}: overriding {}", junction.id(), signal.id());
                signal.manual_override_on_deadlock(&mut self.sensors);
                resolved += 1;
            }
        }
        resolved
    }

    fn update_stations(&mut self) {
        let mode = self.settings.mode;
        for (id, stations) in self.stations.iter_mut() {
            let trains = &mut self.trains[id];
            for station in stations.iter_mut() {
                station.update_docking(trains, mode);
                if !station.is_docked() {
                    station.increment_empty();
                }
            }
        }
    }

    // ========================================================================
    // RESET
    // ========================================================================

    /// Replaces the trains of one track and rebuilds every wayside agent.
    pub fn reset_trains(&mut self, id: TrackId, configs: Vec<TrainConfig>) {
        info!("Resetting {} with {} trains", id, configs.len());
        if let Some(cfg) = self.layout.tracks.get_mut(id.index()) {
            cfg.trains = configs;
        }
        let trains = self.build_trains(id);
        self.trains[id] = trains;
        self.build_wayside();
    }

    /// Puts every train back at its initial position.
    pub fn reset_all_trains(&mut self) {
        info!("Resetting all trains");
        for (id, trains) in self.trains.iter_mut() {
            for train in trains.iter_mut() {
                train.reset(&self.tracks[id]);
            }
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn settings(&self) -> &MapSettings {
        &self.settings
    }

    pub fn layout(&self) -> &MetroLayout {
        &self.layout
    }

    /// Problems found while building the map.
    pub fn layout_errors(&self) -> &[LayoutError] {
        &self.layout_errors
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn track(&self, id: TrackId) -> &Track {
        &self.tracks[id]
    }

    pub fn trains(&self, id: TrackId) -> &[Train] {
        &self.trains[id]
    }

    pub fn trains_mut(&mut self, id: TrackId) -> &mut [Train] {
        &mut self.trains[id]
    }

    pub fn sensors(&self, id: TrackId) -> &SensorArray {
        &self.sensors[id]
    }

    pub fn sensors_mut(&mut self, id: TrackId) -> &mut SensorArray {
        &mut self.sensors[id]
    }

    pub fn signals(&self, id: TrackId) -> &[Signal] {
        &self.signals[id]
    }

    pub fn stations(&self, id: TrackId) -> &[Station] {
        &self.stations[id]
    }

    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    /// Sensor indices reported to the junction PLC.
    pub fn junction_sensor_range(&self, id: TrackId) -> Range<usize> {
        let (start, end) = self.track_layout(id).junction_sensor_range;
        start..end
    }

    pub fn block_sensor_indices(&self, id: TrackId) -> &[usize] {
        &self.track_layout(id).block_sensors
    }

    pub fn junction_signal_indices(&self, id: TrackId) -> &[usize] {
        &self.track_layout(id).junction_signals
    }

    pub fn block_signal_indices(&self, id: TrackId) -> &[usize] {
        &self.track_layout(id).block_signals
    }

    /// Sensor states as reported to external controllers (0/1).
    ///
    /// Under PLC control without collision avoidance, a yield-track sensor
    /// reads 0 while a higher-priority sensor it conflicts with is active.
    /// The raw sensor state is never modified.
    pub fn reported_sensor_states(&self, id: TrackId) -> Vec<u8> {
        let mut states: Vec<u8> = self.sensors[id].states().iter().map(|&s| s as u8).collect();
        let suppress = self.settings.mode == ControlMode::External
            && !self.settings.collision_avoidance
            && id == self.layout.yield_track;
        if suppress {
            for rule in &self.layout.priority {
                if self.outranked(rule) {
                    if let Some(state) = states.get_mut(rule.sensor) {
                        *state = 0;
                    }
                }
            }
        }
        states
    }

    fn outranked(&self, rule: &PriorityRule) -> bool {
        let higher = &self.sensors[rule.track];
        rule.indices.iter().any(|&idx| higher.state(idx))
    }

    /// Serializable view of the current state.
    pub fn snapshot(&self) -> MapSnapshot {
        let tracks = TrackId::ALL
            .iter()
            .map(|&id| TrackSnapshot {
                id,
                kind: self.tracks[id].kind,
                points: self.tracks[id].points.clone(),
                trains: self.trains[id].iter().map(TrainSnapshot::from).collect(),
                sensors: self.sensors[id].states().to_vec(),
                signals: self.signals[id].iter().map(SignalSnapshot::from).collect(),
                stations: self.stations[id].iter().map(StationSnapshot::from).collect(),
            })
            .collect();
        MapSnapshot {
            tick: self.tick_count,
            tracks,
            junctions: self.junctions.iter().map(JunctionSnapshot::from).collect(),
        }
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Applies `states` to the track's signals in order. Extra values are
    /// ignored.
    pub fn set_signals(&mut self, id: TrackId, states: &[bool]) {
        for (signal, &on) in self.signals[id].iter_mut().zip(states) {
            signal.set_state(on);
        }
    }

    /// Applies `states` to the block-control signals in wire order.
    pub fn set_block_signals(&mut self, id: TrackId, states: &[bool]) {
        let indices = &self.layout.tracks[id.index()].block_signals;
        let signals = &mut self.signals[id];
        for (&idx, &on) in indices.iter().zip(states) {
            if let Some(signal) = signals.get_mut(idx) {
                signal.set_state(on);
            }
        }
    }

    /// Sets the stations' blocking signals in order.
    pub fn set_station_signals(&mut self, id: TrackId, states: &[bool]) {
        for (station, &on) in self.stations[id].iter_mut().zip(states) {
            station.set_signal(on);
        }
    }

    /// Powers trains on or off; an unpowered train is emergency-stopped.
    pub fn set_train_power(&mut self, id: TrackId, power: &[bool]) {
        for (train, &on) in self.trains[id].iter_mut().zip(power) {
            train.set_emergency_stop(!on);
        }
    }

    pub fn set_collision_avoidance(&mut self, enabled: bool) {
        if self.settings.collision_avoidance != enabled {
            info!("Collision avoidance {}", if enabled { "enabled" } else { "disabled" });
        }
        self.settings.collision_avoidance = enabled;
    }

    pub fn set_junction_auto_correct(&mut self, enabled: bool) {
        self.settings.junction_auto_correct = enabled;
    }

    pub fn set_deadlock_override(&mut self, enabled: bool) {
        self.settings.deadlock_override = enabled;
    }
}

/// Two distinct mutable elements of one slice.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
