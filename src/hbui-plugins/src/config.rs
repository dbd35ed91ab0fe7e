//! Plugin management configuration.

use std::path::PathBuf;
use std::time::Duration;

use hbui_registry::{DEFAULT_GITHUB_API_URL, DEFAULT_REGISTRY_URL};
use serde::{Deserialize, Serialize};

/// Plugin management configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Operator-configured plugin directory outside the global package paths
    #[serde(default)]
    pub custom_plugin_path: Option<PathBuf>,

    /// Path-list override (`NODE_PATH` syntax); replaces the default search paths
    #[serde(default)]
    pub node_path: Option<String>,

    /// Explicit location of the `homebridge` package directory
    #[serde(default)]
    pub homebridge_package_path: Option<PathBuf>,

    /// Minimum Node.js version plugins are expected to run on
    #[serde(default = "default_min_node_version")]
    pub min_node_version: String,

    /// Run package manager commands through `sudo -E -n`
    #[serde(default)]
    pub sudo: bool,

    /// Port the console listens on (injected into its own config schema)
    #[serde(default = "default_ui_port")]
    pub ui_port: u16,

    /// Package name of the console itself
    #[serde(default = "default_ui_package_name")]
    pub ui_package_name: String,

    /// Bridge pin (injected into the `homebridge-alexa` config schema)
    #[serde(default)]
    pub bridge_pin: Option<String>,

    /// Public package registry
    #[serde(default = "default_registry_url")]
    pub registry_url: String,

    /// GitHub API used for release notes
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Wall-clock limit for a single package manager command, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Overrides the detected package manager command (argv prefix)
    #[serde(default)]
    pub npm_command: Option<Vec<String>>,
}

fn default_min_node_version() -> String {
    "18.15.0".to_string()
}

fn default_ui_port() -> u16 {
    8581
}

fn default_ui_package_name() -> String {
    "homebridge-config-ui-x".to_string()
}

fn default_registry_url() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

fn default_command_timeout() -> u64 {
    300 // 5 minutes
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            custom_plugin_path: None,
            node_path: None,
            homebridge_package_path: None,
            min_node_version: default_min_node_version(),
            sudo: false,
            ui_port: default_ui_port(),
            ui_package_name: default_ui_package_name(),
            bridge_pin: None,
            registry_url: default_registry_url(),
            github_api_url: default_github_api_url(),
            command_timeout_secs: default_command_timeout(),
            npm_command: None,
        }
    }
}

impl PluginsConfig {
    /// Load from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from environment variables.
    pub fn apply_env(&mut self) {
        if let Some(path) = non_empty_var("HBUI_CUSTOM_PLUGIN_PATH") {
            self.custom_plugin_path = Some(PathBuf::from(path));
        }

        if let Some(node_path) = non_empty_var("NODE_PATH") {
            self.node_path = Some(node_path);
        }

        if let Some(path) = non_empty_var("HBUI_HOMEBRIDGE_PACKAGE_PATH") {
            self.homebridge_package_path = Some(PathBuf::from(path));
        }

        if let Some(version) = non_empty_var("HBUI_MIN_NODE_VERSION") {
            self.min_node_version = version;
        }

        if let Some(sudo) = non_empty_var("HBUI_SUDO") {
            self.sudo = matches!(sudo.as_str(), "1" | "true" | "yes");
        }

        if let Some(pin) = non_empty_var("HBUI_BRIDGE_PIN") {
            self.bridge_pin = Some(pin);
        }

        if let Some(url) = non_empty_var("HBUI_REGISTRY_URL") {
            self.registry_url = url;
        }
    }

    /// Get command timeout as Duration.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PluginsConfig::default();
        assert_eq!(config.command_timeout(), Duration::from_secs(300));
        assert_eq!(config.ui_package_name, "homebridge-config-ui-x");
        assert_eq!(config.registry_url, "https://registry.npmjs.org");
        assert!(!config.sudo);
        assert!(config.custom_plugin_path.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PluginsConfig = serde_json::from_str(
            r#"{ "custom_plugin_path": "/var/lib/homebridge/node_modules", "sudo": true }"#,
        )
        .unwrap();
        assert_eq!(
            config.custom_plugin_path,
            Some(PathBuf::from("/var/lib/homebridge/node_modules"))
        );
        assert!(config.sudo);
        assert_eq!(config.ui_port, 8581);
    }
}
