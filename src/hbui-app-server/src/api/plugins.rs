//! Plugin metadata endpoints.
//!
//! Each request runs a fresh discovery pass; nothing is cached between
//! requests.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use hbui_plugins::{PluginRecord, ReleaseNotes};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// List installed plugins.
pub async fn list_installed(State(state): State<Arc<AppState>>) -> Json<Vec<PluginRecord>> {
    Json(state.plugins.installed_plugins().await.into_vec())
}

/// List installed plugins with an update available.
pub async fn list_outdated(State(state): State<Arc<AppState>>) -> Json<Vec<PluginRecord>> {
    let installed = state.plugins.installed_plugins().await;
    Json(state.plugins.outdated_plugins(&installed))
}

/// Search the registry.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
) -> AppResult<Json<Vec<PluginRecord>>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("Search query cannot be empty".to_string()));
    }

    let installed = state.plugins.installed_plugins().await;
    Ok(Json(state.plugins.search(&installed, query).await?))
}

/// Look up one package on the registry.
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Json<PluginRecord>> {
    Ok(Json(state.plugins.lookup(&name).await?))
}

/// Config schema of an installed plugin.
pub async fn config_schema(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Json<Value>> {
    let installed = state.plugins.installed_plugins().await;
    Ok(Json(state.plugins.config_schema(&installed, &name).await?))
}

/// Changelog of an installed plugin.
pub async fn changelog(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Json<Value>> {
    let installed = state.plugins.installed_plugins().await;
    Ok(Json(state.plugins.changelog(&installed, &name).await?))
}

/// Latest GitHub release of an installed plugin.
pub async fn latest_release(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Json<ReleaseNotes>> {
    let installed = state.plugins.installed_plugins().await;
    Ok(Json(state.plugins.latest_release(&installed, &name).await?))
}

/// The bridge package record.
pub async fn homebridge_package(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<PluginRecord>> {
    Ok(Json(state.plugins.homebridge_package().await?))
}
