//! Server configuration.

use hbui_plugins::PluginsConfig;
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8581").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Plugin management configuration.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// CORS origins (empty = allow all).
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

fn default_shutdown_timeout() -> u64 {
    30 // 30 seconds for graceful shutdown
}

fn default_listen_addr() -> String {
    "0.0.0.0:8581".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            plugins: PluginsConfig::default(),
            cors_origins: vec![],
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file.
    ///
    /// Environment variables still override the plugin settings.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.plugins.apply_env();
        config.sync_ui_port();
        Ok(config)
    }

    /// Load from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HBUI_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        config.plugins.apply_env();
        config.sync_ui_port();
        Ok(config)
    }

    /// Use the listen port as the console port advertised in its own
    /// config schema.
    pub fn sync_ui_port(&mut self) {
        if let Ok(addr) = self.listen_addr.parse::<std::net::SocketAddr>() {
            self.plugins.ui_port = addr.port();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8581");
        assert_eq!(config.shutdown_timeout, 30);
        assert_eq!(config.plugins.ui_port, 8581);
    }

    #[test]
    fn test_sync_ui_port() {
        let mut config = ServerConfig {
            listen_addr: "127.0.0.1:9000".to_string(),
            ..Default::default()
        };
        config.sync_ui_port();
        assert_eq!(config.plugins.ui_port, 9000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "listen_addr": "127.0.0.1:8080", "plugins": { "sudo": true } }"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.plugins.ui_port, 8080);
        assert_eq!(config.plugins.command_timeout_secs, 300);
    }
}
