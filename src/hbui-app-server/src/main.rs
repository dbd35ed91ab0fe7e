//! hbui App Server - HTTP API server binary.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hbui_app_server::{ServerConfig, run_with_shutdown};

/// hbui plugin console server
#[derive(Parser)]
#[command(name = "hbui-server")]
#[command(about = "HTTP API server for the Homebridge plugin console")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address (overrides the configuration)
    #[arg(short, long, env = "HBUI_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Run package manager commands through sudo
    #[arg(long)]
    sudo: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let loaded = match &args.config {
        Some(config_path) => ServerConfig::load(config_path),
        None => ServerConfig::from_env(),
    };
    let mut config = match loaded {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(listen) = args.listen {
        config.listen_addr = listen;
        config.sync_ui_port();
    }
    if args.sudo {
        config.plugins.sudo = true;
    }

    info!("Starting hbui server on {}", config.listen_addr);
    info!("Press Ctrl+C to stop");

    let shutdown_timeout = config.shutdown_timeout;

    let shutdown = async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, initiating graceful shutdown (timeout: {}s)...", shutdown_timeout);
            }
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown (timeout: {}s)...", shutdown_timeout);
            }
        }
    };

    let result = run_with_shutdown(config, shutdown).await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}
