//! Core environment context trait for the metro twin.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// Mixes a master seed with a consumer stream id.
///
/// Both contexts use this so a seeded production run and a simulation run
/// with the same seed hand out the same per-stream sequences.
pub fn stream_seed(seed: u64, stream: u64) -> u64 {
    seed.wrapping_mul(0x517cc1b727220a95) ^ stream
}

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the simulation loop and the
/// data bridge can run both in production (tokio) and under a virtual clock in
/// tests.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` (metro_sim) - manual clock, seeded RNG
#[async_trait]
pub trait TwinContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time.
    ///
    /// The data bridge stamps every successful fetch with this value and
    /// derives PLC/RTU liveness from it.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Derives a random number generator for one consumer.
    ///
    /// Seeded contexts combine the master seed with `stream` so that each
    /// consumer (telemetry, scenario jitter, ...) gets an independent but
    /// reproducible sequence.
    fn derive_rng(&self, stream: u64) -> ChaCha8Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
