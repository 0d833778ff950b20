//! Simulation context implementing TwinContext for deterministic runs.

use async_trait::async_trait;
use metro_env::{stream_seed, TwinContext};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Simulation context backed by a virtual clock and seeded randomness.
///
/// This implements `TwinContext` using:
/// - A virtual clock that only moves when advanced (or slept on)
/// - Per-stream ChaCha8 generators derived from one master seed
///
/// Clones share the clock, so a tick driver and the data bridge built from
/// the same context agree on "now".
pub struct SimContext {
    /// Master seed for this run
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.clock();
        *time = time.saturating_add(duration.as_nanos() as u64);
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        *self.clock() = time_ns;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.clock()
    }

    fn clock(&self) -> std::sync::MutexGuard<'_, u64> {
        self.virtual_time_ns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl TwinContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Virtual time: sleeping is just moving the clock
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::debug!("spawning sim task {}", name);
        tokio::spawn(future);
    }

    fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(stream_seed(self.seed, stream))
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
