use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};

use anki_drive_bridge_lib::config::{BridgeConfig, DEFAULT_CONFIG_FILE};
use anki_drive_bridge_lib::{logging, BluestRadio, BluetoothManager, ControlServer};

/// Relays the Anki Drive SDK control protocol to vehicles over Bluetooth LE
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the bridge config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Listen address, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// Write the effective config to `--config` and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level);

    let mut config = BridgeConfig::load(&args.config).await?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if args.init_config {
        config.save(&args.config).await?;
        return Ok(());
    }

    let radio = BluestRadio::new()
        .await
        .context("Failed to open the Bluetooth adapter")?;
    let manager = Arc::new(BluetoothManager::new(
        Arc::new(radio),
        &config.discovery,
        &config.radio,
    ));

    let address = config.server.address();
    let server = ControlServer::bind(&address, manager)
        .await
        .with_context(|| format!("Failed to listen on {}", address))?;
    info!("Listening on {}", server.local_addr()?);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}
