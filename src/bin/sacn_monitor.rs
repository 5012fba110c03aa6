//! sACN Monitor
//!
//! Listens on one universe and reports receiver events and the levels of a
//! selected address range.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sacn_receiver::{
    AddressRange, AppConfig, Cid, EventDispatcher, EventHandler, MergedResult, SacnReceiver,
};

#[derive(Parser, Debug)]
#[command(name = "sacn-monitor", about = "Monitor an sACN (E1.31) universe")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Universe to listen on
    #[arg(short, long)]
    universe: Option<u16>,

    /// Maximum number of tracked sources
    #[arg(long)]
    source_limit: Option<usize>,

    /// First displayed address
    #[arg(long)]
    start: Option<u16>,

    /// Last displayed address
    #[arg(long)]
    end: Option<u16>,

    /// UDP port
    #[arg(long)]
    port: Option<u16>,

    /// Do not join the universe multicast group
    #[arg(long)]
    no_multicast: bool,

    /// Print events as JSON lines instead of text
    #[arg(long)]
    json: bool,
}

/// Prints events for the selected address range
struct Monitor {
    range: AddressRange,
    json: bool,
}

impl Monitor {
    fn print_json<T: serde::Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Could not serialize event: {}", e),
        }
    }
}

impl EventHandler for Monitor {
    fn socket_closed(&mut self, error: Option<&str>) {
        if self.json {
            self.print_json(&serde_json::json!({ "event": "socket_closed", "error": error }));
            return;
        }
        match error {
            Some(error) => println!("Socket closed: {}", error),
            None => println!("Socket closed"),
        }
    }

    fn merged_data(&mut self, merged: &MergedResult) {
        let levels = merged.range_levels(self.range);
        if self.json {
            self.print_json(&serde_json::json!({
                "event": "merged_data",
                "start_address": self.range.start(),
                "levels": levels,
                "source_count": merged.source_count,
            }));
            return;
        }
        let rendered: Vec<String> = self
            .range
            .addresses()
            .zip(levels)
            .map(|(address, level)| format!("{}={}", address, level))
            .collect();
        println!("[{} sources] {}", merged.source_count, rendered.join(" "));
    }

    fn started_sampling(&mut self) {
        if self.json {
            self.print_json(&serde_json::json!({ "event": "started_sampling" }));
        } else {
            println!("Sampling started");
        }
    }

    fn ended_sampling(&mut self) {
        if self.json {
            self.print_json(&serde_json::json!({ "event": "ended_sampling" }));
        } else {
            println!("Sampling ended");
        }
    }

    fn lost_sources(&mut self, cids: &[Cid]) {
        if self.json {
            self.print_json(&serde_json::json!({ "event": "lost_sources", "cids": cids }));
            return;
        }
        for cid in cids {
            println!("Lost source {}", cid);
        }
    }

    fn exceeded_sources(&mut self) {
        if self.json {
            self.print_json(&serde_json::json!({ "event": "exceeded_sources" }));
        } else {
            println!("Source limit exceeded");
        }
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load_or_default().context("loading default config")?,
    };

    if let Some(universe) = args.universe {
        config.receiver.universe = universe;
    }
    if let Some(limit) = args.source_limit {
        config.receiver.source_limit = limit;
    }
    if let Some(port) = args.port {
        config.receiver.port = port;
    }
    if args.no_multicast {
        config.receiver.join_multicast = false;
    }
    if let Some(start) = args.start {
        config.display.start_address = start;
    }
    if let Some(end) = args.end {
        config.display.end_address = end;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let range = config.display.address_range()?;

    tracing::info!(
        "Monitoring universe {}, addresses {}-{}",
        config.receiver.universe,
        range.start(),
        range.end()
    );

    let mut receiver = SacnReceiver::new();
    let mut dispatcher = EventDispatcher::spawn(
        receiver.subscribe(),
        Monitor {
            range,
            json: args.json,
        },
    )?;

    receiver.start(config.receiver.clone()).await?;

    let mut stats_interval = tokio::time::interval(Duration::from_secs(10));
    stats_interval.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                break;
            }
            _ = stats_interval.tick() => {
                if !receiver.is_running() {
                    tracing::warn!("Receiver stopped unexpectedly");
                    break;
                }
                let stats = receiver.stats();
                tracing::info!(
                    "Datagrams: {}, accepted: {}, out of sequence: {}, malformed: {} ({:.1}% accepted)",
                    stats.datagrams_received,
                    stats.packets_accepted,
                    stats.out_of_sequence,
                    stats.malformed_packets,
                    stats.acceptance_rate() * 100.0
                );
            }
        }
    }

    receiver.stop().await;
    dispatcher.stop();

    tracing::info!("Monitor stopped");
    Ok(())
}
