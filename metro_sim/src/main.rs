//! Metro Twin CLI
//!
//! Runs the metro-rail twin: a tick loop over the shared map plus the UDP
//! data bridge PLC/RTU controllers poll. With `--virtual` the twin runs on a
//! virtual clock with no network, as fast as the CPU allows.

use anyhow::Context as _;
use clap::{ArgAction, Parser};
use metro_core::{ControlMode, MapSettings};
use metro_env::{TokioContext, TwinContext, UdpTransport};
use metro_sim::scenarios::ScenarioId;
use metro_sim::{BridgeServer, DataBridge, SimContext, TwinConfig, TwinExport, TwinWorld};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Metro-rail digital twin
#[derive(Parser, Debug)]
#[command(name = "metro-twin")]
#[command(about = "Run the metro-rail digital twin and its PLC/RTU data bridge", long_about = None)]
struct Args {
    /// Seed for train telemetry (0 = OS entropy)
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Address the data bridge listens on
    #[arg(short, long, default_value = "0.0.0.0:3001")]
    bind: SocketAddr,

    /// Milliseconds between ticks
    #[arg(long, default_value = "100")]
    tick_ms: u64,

    /// Who drives the signals (standalone, external)
    #[arg(short, long, default_value = "standalone")]
    mode: ControlMode,

    /// Trains slow down instead of crashing when too close
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    avoidance: bool,

    /// Force conflicting circle-line junction signals OFF
    #[arg(long)]
    auto_correct: bool,

    /// Break junction deadlocks by releasing the circle-line signal
    #[arg(long)]
    deadlock: bool,

    /// Stop after this many seconds of twin time (0 = until Ctrl-C)
    #[arg(short, long, default_value = "0", value_parser = parse_seconds)]
    duration: f64,

    /// Initial train layout (nominal, front_collision, junction_conflict)
    #[arg(short = 'S', long, default_value = "nominal")]
    scenario: ScenarioId,

    /// Export snapshots to this JSON file
    #[arg(long)]
    export: Option<String>,

    /// Record a snapshot every N ticks
    #[arg(long, default_value = "10")]
    export_every: u64,

    /// Seconds without a fetch before a PLC/RTU counts as offline
    #[arg(long, default_value = "2", value_parser = parse_seconds)]
    plc_timeout: f64,

    /// Run on a virtual clock without the data bridge
    #[arg(long = "virtual")]
    virtual_clock: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Parses a finite, non-negative number of seconds.
fn parse_seconds(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{}: {}", s, e))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("{} is not a usable number of seconds", s));
    }
    Ok(secs)
}

impl Args {
    fn config(&self) -> TwinConfig {
        TwinConfig {
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            settings: MapSettings {
                mode: self.mode,
                collision_avoidance: self.avoidance,
                junction_auto_correct: self.auto_correct,
                deadlock_override: self.deadlock,
                ..MapSettings::default()
            },
            scenario: self.scenario,
            export_every: self.export_every,
            plc_timeout: Duration::from_secs_f64(self.plc_timeout),
        }
    }

    fn max_ticks(&self) -> Option<u64> {
        (self.duration > 0.0)
            .then(|| (self.duration * 1000.0 / self.tick_ms.max(1) as f64).ceil() as u64)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Metro Twin v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  scenario: {} ({})", args.scenario, args.scenario.description());

    let mut export = args
        .export
        .as_ref()
        .map(|_| TwinExport::new(args.scenario, args.seed));

    if args.virtual_clock {
        run_virtual(&args, export.as_mut()).await;
    } else {
        run_live(&args, export.as_mut()).await?;
    }

    if let (Some(path), Some(export)) = (&args.export, &export) {
        export
            .write_to_file(path)
            .with_context(|| format!("Failed to write export to {}", path))?;
        info!("Exported {} frames to {}", export.frames.len(), path);
    }
    Ok(())
}

/// Fast-forward run on a virtual clock.
async fn run_virtual(args: &Args, export: Option<&mut TwinExport>) {
    let ticks = args.max_ticks().unwrap_or_else(|| {
        warn!("--virtual without --duration: running 600 ticks");
        600
    });
    let ctx = SimContext::shared(args.seed);
    let world = TwinWorld::new(args.config(), ctx);
    let stop = AtomicBool::new(false);

    let ran = world.run(&stop, Some(ticks), export).await;
    report(ran, &world);
}

/// Real-time run with the UDP data bridge.
async fn run_live(args: &Args, export: Option<&mut TwinExport>) -> anyhow::Result<()> {
    let config = args.config();
    let plc_timeout = config.plc_timeout;
    let ctx = Arc::new(TokioContext::seeded(args.seed));
    let world = TwinWorld::new(config, Arc::clone(&ctx));

    let transport = Arc::new(
        UdpTransport::bind(args.bind)
            .await
            .with_context(|| format!("Failed to bind data bridge on {}", args.bind))?,
    );
    let bridge = Arc::new(DataBridge::new(world.map(), Arc::clone(&ctx), plc_timeout));
    let server = Arc::new(BridgeServer::new(Arc::clone(&bridge), transport));
    let server_task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.serve().await })
    };

    let stop = AtomicBool::new(false);
    tokio::select! {
        _ = world.run(&stop, args.max_ticks(), export) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Ctrl-C handler failed: {}", e);
            }
            info!("Ctrl-C received, shutting down");
            stop.store(true, Ordering::SeqCst);
        }
    }

    if let Err(e) = server.stop().await {
        warn!("Failed to wake data bridge: {}", e);
    }
    match tokio::time::timeout(Duration::from_secs(2), server_task).await {
        Ok(Ok(served)) => info!("Data bridge served {} requests", served),
        Ok(Err(e)) => error!("Data bridge task failed: {}", e),
        Err(_) => warn!("Data bridge did not stop in time"),
    }

    for (class, link) in bridge.plc_links() {
        info!(
            "  PLC {:<9} last={} online={}",
            class.name(),
            link.clock_label(),
            link.online
        );
    }
    for (class, link) in bridge.rtu_links() {
        info!(
            "  RTU {:<9} last={} online={}",
            class.name(),
            link.clock_label(),
            link.online
        );
    }

    let ticks = world.snapshot().tick;
    report(ticks, &world);
    Ok(())
}

fn report<Ctx: TwinContext>(ticks: u64, world: &TwinWorld<Ctx>) {
    let snapshot = world.snapshot();
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if snapshot.collision_count() == 0 {
        info!("✅ {} ticks, no collisions", ticks);
    } else {
        warn!("💥 {} ticks, {} trains crashed", ticks, snapshot.collision_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plc_timeout_must_be_finite() {
        for bad in ["inf", "NaN", "-1"] {
            assert!(Args::try_parse_from(["metro-twin", "--plc-timeout", bad]).is_err());
        }
        let args = Args::try_parse_from(["metro-twin", "--plc-timeout", "0.5"]).unwrap();
        assert_eq!(args.config().plc_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_duration_sets_tick_budget() {
        let args = Args::try_parse_from(["metro-twin", "--duration", "2.5", "--tick-ms", "100"]).unwrap();
        assert_eq!(args.max_ticks(), Some(25));
        let args = Args::try_parse_from(["metro-twin"]).unwrap();
        assert_eq!(args.max_ticks(), None);
        assert!(Args::try_parse_from(["metro-twin", "--duration", "inf"]).is_err());
    }
}
