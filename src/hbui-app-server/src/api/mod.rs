//! REST API routes and handlers.

mod health;
mod plugins;
pub mod types;

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::state::AppState;

pub use types::HealthResponse;

/// Create the API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/plugins", get(plugins::list_installed))
        .route("/plugins/outdated", get(plugins::list_outdated))
        .route("/plugins/homebridge", get(plugins::homebridge_package))
        .route("/plugins/search/{query}", get(plugins::search))
        .route("/plugins/lookup/{*name}", get(plugins::lookup))
        .route("/plugins/config-schema/{*name}", get(plugins::config_schema))
        .route("/plugins/changelog/{*name}", get(plugins::changelog))
        .route("/plugins/release/{*name}", get(plugins::latest_release))
}
