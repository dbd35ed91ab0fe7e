//! Application state management.

use std::time::{Duration, Instant};

use hbui_plugins::PluginService;

use crate::config::ServerConfig;

/// Application state shared across request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Plugin management.
    pub plugins: PluginService,
    /// Start time.
    start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ServerConfig) -> Self {
        let plugins = PluginService::new(config.plugins.clone());
        Self::with_plugins(config, plugins)
    }

    /// Create state around an existing plugin service.
    pub fn with_plugins(config: ServerConfig, plugins: PluginService) -> Self {
        Self {
            config,
            plugins,
            start_time: Instant::now(),
        }
    }

    /// Time since the server started.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
