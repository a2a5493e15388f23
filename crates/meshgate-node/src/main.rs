use std::path::PathBuf;

use clap::Parser;

use meshgate_node::{Gateway, GatewayConfig};

#[derive(Parser)]
#[command(name = "meshgate", about = "Crypto mesh / LoRa radio mesh gateway")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/meshgate/config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match GatewayConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        meshgate_node::logging::init_json(&config.logging.level);
    } else {
        meshgate_node::logging::init(&config.logging.level);
    }

    let mut gateway = match Gateway::from_config(config) {
        Ok(g) => g,
        Err(e) => {
            tracing::error!("failed to build gateway: {e}");
            std::process::exit(1);
        }
    };
    let handle = gateway.handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        handle.shutdown();
    });

    if let Err(e) = gateway.start().await {
        tracing::error!("failed to start gateway: {e}");
        std::process::exit(1);
    }

    if let Err(e) = gateway.run().await {
        tracing::error!("router loop failed: {e}");
    }
    gateway.shutdown().await;
}
