//! can-bridge - headless CAN bus bridge
//!
//! Relays frames between two CAN buses in both directions, optionally
//! rewriting arbitration IDs on the way through. Endpoints are either
//! in-process virtual buses (for demos and tests) or SocketCAN interfaces
//! (with the `socketcan` feature, Linux only).
//!
//! # Examples
//!
//! ```text
//! # Bridge two SocketCAN interfaces, rewriting 0x100 to 0x200
//! can-bridge --primary socketcan:can0 --secondary socketcan:can1 --rule 100:200
//!
//! # Log all bridged traffic to CSV, stop after 30 seconds
//! can-bridge --primary socketcan:can0 --secondary socketcan:can1 \
//!     --log-file traffic.csv --duration 30
//! ```

mod frame_log;
#[cfg(feature = "socketcan")]
mod socketcan_io;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bridge_relay::{
    BusConnector, BusEndpoint, BusError, EndpointConfig, EngineConfig, InterfaceKind,
    RelayEngine, RelayEvent, RewriteTable,
};
use bridge_sim::{VirtualBusNetwork, VirtualConnector};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::frame_log::{Direction, FrameLogger};

#[derive(Parser, Debug)]
#[command(name = "can-bridge", version, about = "Bidirectional CAN bus bridge with ID rewriting")]
struct Cli {
    /// Primary bus endpoint: "virtual:NAME" or "socketcan:IFACE"
    #[arg(long, default_value = "virtual:vcan0")]
    primary: String,

    /// Secondary bus endpoint: "virtual:NAME" or "socketcan:IFACE"
    #[arg(long, default_value = "virtual:vcan1")]
    secondary: String,

    /// Rewrite rule as hex "ORIG:NEW" (0x prefix optional), repeatable
    #[arg(long = "rule", value_name = "ORIG:NEW")]
    rules: Vec<String>,

    /// Disable automatic bus-off recovery
    #[arg(long)]
    no_bus_off_retry: bool,

    /// Consecutive bus-off episodes tolerated before giving up
    #[arg(long, default_value_t = 3)]
    max_bus_off_retries: u32,

    /// Delay before each reopen attempt during recovery, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 500)]
    bus_off_retry_delay: u64,

    /// Send attempts per frame before dropping it on TX overflow
    #[arg(long, default_value_t = 10)]
    max_send_retries: u32,

    /// First retry backoff delay, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 10)]
    send_retry_delay: u64,

    /// Minimum gap between consecutive sends, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    tx_min_gap: u64,

    /// Pause after dropping a frame to overflow, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 50)]
    tx_overflow_cooldown: u64,

    /// Append bridged traffic to this CSV file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Stop after this many seconds instead of running until Ctrl-C
    #[arg(long, value_name = "SECONDS")]
    duration: Option<f64>,
}

fn parse_endpoint(spec: &str) -> Result<EndpointConfig> {
    match spec.split_once(':') {
        Some(("virtual", name)) if !name.is_empty() => Ok(EndpointConfig::virtual_bus(name)),
        Some(("socketcan", name)) if !name.is_empty() => {
            if cfg!(not(feature = "socketcan")) {
                bail!("built without socketcan support; rebuild with --features socketcan");
            }
            Ok(EndpointConfig::socketcan(name))
        }
        _ => bail!(
            "invalid endpoint '{}': expected \"virtual:NAME\" or \"socketcan:IFACE\"",
            spec
        ),
    }
}

fn parse_rules(rules: &[String]) -> Result<RewriteTable> {
    let pairs: Vec<(&str, &str)> = rules
        .iter()
        .map(|rule| {
            rule.split_once(':')
                .with_context(|| format!("invalid rule '{}': expected ORIG:NEW", rule))
        })
        .collect::<Result<_>>()?;
    RewriteTable::parse(&pairs).map_err(|e| e.into())
}

/// Dispatches opens to the transport matching each endpoint's interface kind
struct CliConnector {
    virtual_buses: VirtualConnector,
    #[cfg(feature = "socketcan")]
    socketcan: socketcan_io::SocketCanConnector,
}

impl CliConnector {
    fn new() -> Self {
        Self {
            virtual_buses: VirtualConnector::new(VirtualBusNetwork::new()),
            #[cfg(feature = "socketcan")]
            socketcan: socketcan_io::SocketCanConnector,
        }
    }
}

#[async_trait]
impl BusConnector for CliConnector {
    async fn open(&self, config: &EndpointConfig) -> Result<Box<dyn BusEndpoint>, BusError> {
        match config.interface {
            InterfaceKind::Virtual => self.virtual_buses.open(config).await,
            #[cfg(feature = "socketcan")]
            InterfaceKind::SocketCan => self.socketcan.open(config).await,
            #[cfg(not(feature = "socketcan"))]
            InterfaceKind::SocketCan => Err(BusError::Config(
                "built without socketcan support".into(),
            )),
        }
    }
}

fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = EngineConfig::new(
        parse_endpoint(&cli.primary).context("bad --primary")?,
        parse_endpoint(&cli.secondary).context("bad --secondary")?,
    );
    config.retry_on_bus_off = !cli.no_bus_off_retry;
    config.max_bus_off_retries = cli.max_bus_off_retries;
    config.bus_off_retry_delay = Duration::from_millis(cli.bus_off_retry_delay);
    config.max_send_retries = cli.max_send_retries;
    config.send_retry_initial_delay = Duration::from_millis(cli.send_retry_delay);
    config.tx_min_gap = Duration::from_millis(cli.tx_min_gap);
    config.tx_overflow_cooldown = Duration::from_millis(cli.tx_overflow_cooldown);
    Ok(config)
}

/// Drains the engine's event stream into logs and the optional CSV file.
/// Log-file write failures disable the file without stopping the bridge.
async fn consume_events(mut events: mpsc::Receiver<RelayEvent>, mut logger: Option<FrameLogger>) {
    while let Some(event) = events.recv().await {
        if let Some(active) = logger.as_mut() {
            let outcome = match &event {
                RelayEvent::FrameReceived { frame, channel } => {
                    active.record(frame, *channel, Direction::Rx)
                }
                RelayEvent::FrameSent { frame, channel } => {
                    active.record(frame, *channel, Direction::Tx)
                }
                _ => Ok(()),
            };
            if let Err(e) = outcome {
                warn!(error = %e, "frame log write failed, disabling CSV logging");
                logger = None;
            }
        }

        match event {
            RelayEvent::FrameReceived { frame, channel } => {
                debug!(%channel, %frame, "received");
            }
            RelayEvent::FrameSent { frame, channel } => {
                debug!(%channel, %frame, "forwarded");
            }
            RelayEvent::SendDropped { reason, channel } => {
                warn!(%channel, %reason, "frame dropped");
            }
            RelayEvent::RecoveryStarted => info!("bus-off detected, attempting recovery"),
            RelayEvent::RecoverySucceeded => info!("bus recovered"),
            RelayEvent::RecoveryFailed => warn!("bus recovery failed"),
            RelayEvent::RunFailed { error } => error!(%error, "bridge run failed"),
            RelayEvent::RunFinished => info!("bridge stopped"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bridge_cli=info,bridge_relay=info,bridge_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = engine_config(&cli)?;
    let rewrite = parse_rules(&cli.rules)?;
    info!(
        primary = %config.primary,
        secondary = %config.secondary,
        rules = rewrite.len(),
        "starting bridge"
    );

    let logger = match &cli.log_file {
        Some(path) => Some(
            FrameLogger::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?,
        ),
        None => None,
    };

    let (event_tx, event_rx) = mpsc::channel(1024);
    let engine = RelayEngine::new(config, rewrite, Box::new(CliConnector::new()), event_tx);
    let stop = engine.stop_handle();

    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping bridge");
            ctrl_c_stop.stop();
        }
    });

    if let Some(seconds) = cli.duration {
        let timed_stop = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
            info!(seconds, "run duration elapsed, stopping bridge");
            timed_stop.stop();
        });
    }

    let consumer = tokio::spawn(consume_events(event_rx, logger));
    let outcome = engine.run().await;
    // The engine dropped its event sender, so the consumer drains and exits
    consumer.await.ok();
    outcome.context("bridge terminated with an error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_specs_parse() {
        let endpoint = parse_endpoint("virtual:vcan0").unwrap();
        assert_eq!(endpoint.interface, InterfaceKind::Virtual);
        assert_eq!(endpoint.channel, "vcan0");

        assert!(parse_endpoint("vcan0").is_err());
        assert!(parse_endpoint("virtual:").is_err());
        assert!(parse_endpoint("serial:ttyUSB0").is_err());
    }

    #[test]
    fn rules_parse_with_and_without_prefix() {
        let table = parse_rules(&["100:200".into(), "0x300:0x400".into()]).unwrap();
        assert_eq!(table.lookup(0x100), Some(0x200));
        assert_eq!(table.lookup(0x300), Some(0x400));
    }

    #[test]
    fn malformed_rule_is_rejected() {
        assert!(parse_rules(&["100".into()]).is_err());
        assert!(parse_rules(&["100:zz".into()]).is_err());
    }

    #[test]
    fn config_reflects_flags() {
        let cli = Cli::parse_from([
            "can-bridge",
            "--no-bus-off-retry",
            "--max-send-retries",
            "5",
            "--tx-min-gap",
            "20",
        ]);
        let config = engine_config(&cli).unwrap();
        assert!(!config.retry_on_bus_off);
        assert_eq!(config.max_send_retries, 5);
        assert_eq!(config.tx_min_gap, Duration::from_millis(20));
    }
}
