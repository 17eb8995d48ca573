//! Firevolx relay server.
//!
//! Accepts WebSocket channels from dashboards and bridges each to a Telnet
//! session on a robot.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use firevolx_core::logging::init_tracing;
use firevolx_device::{DEFAULT_SHELL_PROMPT, DeviceConnector, SimulatedConnector, TelnetConnector};
use firevolx_relay::{RelayConfig, RelayService, router};
use regex::Regex;
use tracing::{info, warn};

/// How the relay reaches devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DeviceMode {
    /// Real Telnet connections.
    Telnet,
    /// Canned robot shells; no device is contacted.
    Simulated,
}

#[derive(Parser, Debug)]
#[command(name = "firevolx-relay")]
#[command(version, about = "WebSocket to Telnet relay for Firevolx robot terminals")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "FIREVOLX_RELAY_ADDR", default_value = "0.0.0.0:8081")]
    addr: SocketAddr,

    /// Device connect and login timeout in seconds.
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Per-command timeout in seconds.
    #[arg(long, default_value_t = 10)]
    exec_timeout_secs: u64,

    /// Timeout for each step of /test-connection in seconds.
    #[arg(long, default_value_t = 5)]
    test_timeout_secs: u64,

    /// Regex matching the device's shell prompt.
    #[arg(long, default_value = DEFAULT_SHELL_PROMPT)]
    shell_prompt: String,

    /// Device backend.
    #[arg(long, value_enum, default_value_t = DeviceMode::Telnet)]
    device_mode: DeviceMode,

    /// Output logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("firevolx_relay=info,tower_http=info", args.log_json);

    let config = RelayConfig {
        shell_prompt: Regex::new(&args.shell_prompt).context("invalid --shell-prompt")?,
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        exec_timeout: Duration::from_secs(args.exec_timeout_secs),
        test_timeout: Duration::from_secs(args.test_timeout_secs),
    };

    let connector: Arc<dyn DeviceConnector> = match args.device_mode {
        DeviceMode::Telnet => Arc::new(TelnetConnector::new()),
        DeviceMode::Simulated => {
            warn!("Simulated device mode: no robot will be contacted");
            Arc::new(SimulatedConnector::new())
        }
    };

    let service = RelayService::new(connector, config);
    let app = router(service.clone());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        device_mode = ?args.device_mode,
        "Starting firevolx-relay"
    );

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await;
    info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
