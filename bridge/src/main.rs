#![forbid(unsafe_code)]

mod mqtt;

use std::path::PathBuf;
use std::sync::Arc;

use bridge_core::catalog::loader::load_catalog;
use bridge_core::config::load_from_path;
use bridge_core::tcp;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "TCP-to-MQTT protocol bridge")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", env = "BRIDGE_CONFIG", default_value = "bridge.toml")]
    config: PathBuf,

    /// Override `logging.level` from the config file.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Shorthand for `--log-level debug`.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            // Tracing isn't initialized yet; a config we can't even parse has no log level
            // to honor, so this one error goes straight to stderr.
            eprintln!("failed to load configuration from {}: {err}", cli.config.display());
            std::process::exit(1);
        }
    };

    init_tracing(&cli, &config.logging.level);

    let catalog = match load_catalog(&config.packet_defs.paths, &config.packet_defs.patterns) {
        Ok(catalog) => {
            info!(packets = catalog.len(), "packet catalog loaded");
            Arc::new(catalog)
        }
        Err(err) => {
            error!(error = %err, "packet catalog failed to load");
            std::process::exit(1);
        }
    };

    let sink = mqtt::RumqttcSink::connect(&config.mqtt.client_id, &config.mqtt.host, config.mqtt.port);
    info!(host = %config.mqtt.host, port = config.mqtt.port, client_id = %config.mqtt.client_id, "mqtt client started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, signaling shutdown");
            let _ = shutdown_tx.send(true);
        }
    });

    let config = Arc::new(config);
    if let Err(err) = tcp::run(config, catalog, sink, shutdown_rx).await {
        error!(%err, "tcp bridge exited with error");
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli, configured_level: &str) {
    let default_level = if cli.verbose {
        "debug"
    } else {
        cli.log_level.as_deref().unwrap_or(configured_level)
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
