//! hbui App Server - HTTP API server for the Homebridge plugin console.
//!
//! This crate provides:
//! - REST API for listing, searching and describing plugins
//! - WebSocket API streaming package manager output for plugin commands
//! - Health checks

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod config;
pub mod error;
pub mod state;
pub mod websocket;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Run the server with the given configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if config.plugins.sudo {
        info!("Package manager commands will run through sudo");
    }
    match &config.plugins.custom_plugin_path {
        Some(path) => info!("Custom plugin path: {}", path.display()),
        None => info!("No custom plugin path configured, using global install paths"),
    }

    let addr: SocketAddr = config.listen_addr.parse()?;
    let state = Arc::new(AppState::new(config));

    info!("Starting hbui server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// Serve on a bound listener until `shutdown` resolves.
///
/// Open connections, such as plugin command sockets, get
/// `shutdown_timeout` seconds to close before the server stops anyway.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let grace = Duration::from_secs(state.config.shutdown_timeout);
    let app = create_router_with_state(state);

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let shutdown = async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    };
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();

    let deadline = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(grace).await,
            Err(_) => std::future::pending().await,
        }
    };

    tokio::select! {
        result = server => result?,
        _ = deadline => {
            warn!("Connections still open after {}s, shutting down anyway", grace.as_secs());
        }
    }

    info!("Server shut down");
    Ok(())
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    create_router_with_state(Arc::new(state))
}

/// Create the application router with an Arc-wrapped state.
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let api_routes = api::routes().merge(websocket::routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Permissive CORS unless origins are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
