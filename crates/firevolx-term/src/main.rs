//! Firevolx terminal.
//!
//! Opens a relay-brokered shell on a robot and reads commands from stdin.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use firevolx_core::{
    ConnectTarget, DeviceCatalog, Message, MessageKind, logging::init_tracing,
};
use firevolx_session::{MessageHandler, RelayEndpoint, SessionConfig, SessionManager};
use firevolx_transport::WsConnector;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

#[derive(Parser, Debug)]
#[command(name = "firevolx-term", version, about = "Remote terminal for Firevolx robots")]
struct Cli {
    /// Relay WebSocket URL. Defaults to a relay on the robot itself (ws://<host>:8081/ws).
    #[arg(long, global = true, env = "FIREVOLX_RELAY_URL")]
    relay: Option<String>,

    /// Device catalog file. Defaults to <config_dir>/firevolx/devices.toml.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Output logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open an interactive session on a robot.
    Connect(ConnectArgs),
    /// Check whether the relay accepts connections.
    Probe {
        /// Robot host, for relays running on the robot.
        #[arg(long)]
        host: Option<String>,
    },
    /// List known robots.
    Devices,
}

#[derive(Args, Debug)]
struct ConnectArgs {
    /// Robot id from the catalog.
    #[arg(long, conflicts_with = "host", required_unless_present = "host")]
    device: Option<String>,

    /// Robot host name or IP address.
    #[arg(long)]
    host: Option<String>,

    /// Telnet port.
    #[arg(long)]
    port: Option<u16>,

    /// Login name.
    #[arg(long, short)]
    user: Option<String>,

    /// Login password.
    #[arg(long, env = "FIREVOLX_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("warn", cli.log_json);

    let config = SessionConfig {
        relay: cli
            .relay
            .clone()
            .map_or_else(RelayEndpoint::default, RelayEndpoint::Fixed),
        ..SessionConfig::default()
    };
    let manager = SessionManager::new(config, Arc::new(WsConnector::new()));

    match cli.command {
        Command::Connect(ref args) => {
            let target = resolve_target(args, &load_catalog(cli.catalog.as_deref())?)?;
            run_session(&manager, target).await
        }
        Command::Probe { ref host } => {
            if manager.test_connectivity(host.as_deref()).await {
                println!("Relay reachable");
                Ok(())
            } else {
                bail!("Relay unreachable")
            }
        }
        Command::Devices => {
            for device in load_catalog(cli.catalog.as_deref())?.devices() {
                println!(
                    "{:<10} {:<22} {:<16} {}",
                    device.id,
                    device.name,
                    device.host.as_deref().unwrap_or("-"),
                    device.location
                );
            }
            Ok(())
        }
    }
}

fn load_catalog(path: Option<&std::path::Path>) -> anyhow::Result<DeviceCatalog> {
    let catalog = match path {
        Some(path) => DeviceCatalog::load(path)?,
        None => DeviceCatalog::load_default()?,
    };
    Ok(catalog)
}

fn resolve_target(args: &ConnectArgs, catalog: &DeviceCatalog) -> anyhow::Result<ConnectTarget> {
    let mut target = match (&args.device, &args.host) {
        (Some(device), _) => {
            catalog.target_for(device, args.user.as_deref(), args.password.as_deref())?
        }
        (None, Some(host)) => ConnectTarget {
            host: host.clone(),
            port: None,
            username: args.user.clone().unwrap_or_default(),
            password: args.password.clone(),
        },
        (None, None) => bail!("either --device or --host is required"),
    };
    if let Some(port) = args.port {
        target.port = Some(port);
    }
    if target.username.is_empty() {
        bail!("no login name: pass --user");
    }
    Ok(target)
}

async fn run_session(manager: &SessionManager, target: ConnectTarget) -> anyhow::Result<()> {
    let (tx, mut messages) = mpsc::unbounded_channel::<Message>();
    let handler: MessageHandler = Arc::new(move |m: &Message| {
        let _ = tx.send(m.clone());
    });

    let address = format!("{}:{}", target.host, target.port_or_default());
    let id = manager
        .connect_with_handler(target, handler)
        .await
        .with_context(|| format!("failed to connect to {address}"))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = line.trim();
                if command.is_empty() {
                    continue;
                }
                if command == "exit" {
                    break;
                }
                if let Err(e) = manager.send_command(&id, command) {
                    eprintln!("{e}");
                }
            }
            Some(message) = messages.recv() => {
                print_message(&message);
                let active = manager
                    .get_connection(&id)
                    .is_some_and(|s| s.status.is_active());
                if !active {
                    return Ok(());
                }
            }
        }
    }

    manager.disconnect(&id);
    while let Ok(message) = messages.try_recv() {
        print_message(&message);
    }
    Ok(())
}

fn print_message(message: &Message) {
    match message.kind {
        MessageKind::Output | MessageKind::Input => println!("{}", message.data),
        MessageKind::Status => println!("[{}]", message.data),
        MessageKind::Error => eprintln!("[error] {}", message.data),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn connect_args(argv: &[&str]) -> ConnectArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Connect(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_device_target() {
        let args = connect_args(&["firevolx-term", "connect", "--device", "RBT-002", "-u", "pi", "--port", "2323"]);
        let target = resolve_target(&args, &DeviceCatalog::builtin()).unwrap();
        assert_eq!(target.host, "192.168.1.101");
        assert_eq!(target.port, Some(2323));
        assert_eq!(target.username, "pi");
    }

    #[test]
    fn test_host_target_requires_user() {
        let args = connect_args(&["firevolx-term", "connect", "--host", "10.0.0.5"]);
        assert!(resolve_target(&args, &DeviceCatalog::builtin()).is_err());

        let args = connect_args(&["firevolx-term", "connect", "--host", "10.0.0.5", "--user", "pi"]);
        let target = resolve_target(&args, &DeviceCatalog::builtin()).unwrap();
        assert_eq!(target.port_or_default(), 23);
    }

    #[test]
    fn test_device_and_host_conflict() {
        let result = Cli::try_parse_from([
            "firevolx-term", "connect", "--device", "RBT-001", "--host", "10.0.0.5",
        ]);
        assert!(result.is_err());
        assert!(Cli::try_parse_from(["firevolx-term", "connect"]).is_err());
    }
}
