//! Metro Twin probe
//!
//! Plays a PLC/RTU by hand: sends `VERB;KEY;JSON` to a running twin and prints
//! the reply, optionally polling at an interval.
//!
//! ```text
//! metro-probe GET sensors '{"weline":null}'
//! metro-probe POST signals '{"weline":[1,0,1]}'
//! metro-probe --repeat 10 --interval-ms 500 GET trainsRtu '{"ccline":null}'
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use metro_env::{DatagramTransport, UdpTransport};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "metro-probe")]
#[command(about = "Send one request to a running metro twin", long_about = None)]
struct Args {
    /// Twin data bridge address
    #[arg(short, long, default_value = "127.0.0.1:3001")]
    target: SocketAddr,

    /// GET or POST
    verb: String,

    /// Resource key (login, sensors, blockSensors, stations, trainsPlc, trainsRtu, signals, blockSignals)
    key: String,

    /// JSON payload
    #[arg(default_value = "{}")]
    payload: String,

    /// Milliseconds to wait for each reply
    #[arg(long, default_value = "1000")]
    timeout_ms: u64,

    /// Send the request this many times
    #[arg(long, default_value = "1")]
    repeat: u32,

    /// Milliseconds between repeats
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Builds the request line, checking the payload is JSON before it goes out.
fn request_line(verb: &str, key: &str, payload: &str) -> Result<String> {
    let verb = verb.to_uppercase();
    if verb != "GET" && verb != "POST" {
        bail!("verb must be GET or POST, got {}", verb);
    }
    let json: serde_json::Value =
        serde_json::from_str(payload).context("payload is not valid JSON")?;
    Ok(format!("{};{};{}", verb, key, json))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let line = request_line(&args.verb, &args.key, &args.payload)?;
    let bind: SocketAddr = if args.target.is_ipv4() {
        "0.0.0.0:0".parse()?
    } else {
        "[::]:0".parse()?
    };
    let transport = UdpTransport::bind(bind).await.context("Failed to bind probe socket")?;

    let mut missed = 0;
    for i in 0..args.repeat.max(1) {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
        debug!("-> {} {}", args.target, line);
        transport.send_to(line.as_bytes(), args.target).await?;

        match tokio::time::timeout(Duration::from_millis(args.timeout_ms), transport.recv()).await {
            Ok(Ok(reply)) => println!("{}", String::from_utf8_lossy(&reply.payload)),
            Ok(Err(e)) => {
                warn!("Receive failed: {}", e);
                missed += 1;
            }
            Err(_) => {
                warn!("No reply from {} within {}ms", args.target, args.timeout_ms);
                missed += 1;
            }
        }
    }

    if missed == args.repeat.max(1) {
        bail!("twin at {} did not answer", args.target);
    }
    Ok(())
}
