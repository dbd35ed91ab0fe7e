//! Package manager search path resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::config::PluginsConfig;

/// Passed to every package manager invocation.
pub const NO_UPDATE_NOTIFIER: &str = "--no-update-notifier";

/// POSIX library locations searched when no path-list override is set.
const POSIX_DEFAULT_PATHS: [&str; 2] = ["/usr/local/lib/node_modules", "/usr/lib/node_modules"];

/// Time allowed for `npm -g prefix`.
const PREFIX_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolves the package manager command and the directories that may
/// contain installed plugins.
#[derive(Debug, Clone)]
pub struct PathResolver {
    custom_plugin_path: Option<PathBuf>,
    node_path: Option<String>,
    npm_command: Vec<String>,
}

impl PathResolver {
    /// Create a resolver from the plugin configuration.
    pub fn new(config: &PluginsConfig) -> Self {
        let npm_command = match &config.npm_command {
            Some(cmd) if !cmd.is_empty() => cmd.clone(),
            _ => detect_npm_command(),
        };

        Self {
            custom_plugin_path: config.custom_plugin_path.clone(),
            node_path: config.node_path.clone(),
            npm_command,
        }
    }

    /// The package manager argv prefix (binary plus fixed flags).
    pub fn npm_command(&self) -> &[String] {
        &self.npm_command
    }

    /// Ordered, deduplicated list of existing directories to scan.
    pub async fn search_paths(&self) -> Vec<PathBuf> {
        let defaults = if self.node_path.is_some() {
            Vec::new()
        } else {
            let mut defaults = platform_default_paths();
            if let Some(prefix_modules) = self.global_prefix_modules().await {
                defaults.push(prefix_modules);
            }
            defaults
        };

        let paths = assemble_search_paths(
            self.custom_plugin_path.as_deref(),
            self.node_path.as_deref(),
            defaults,
        );

        let existing: Vec<PathBuf> = paths.into_iter().filter(|p| p.is_dir()).collect();
        tracing::debug!(paths = ?existing, "Resolved plugin search paths");
        existing
    }

    /// `<npm -g prefix>/lib/node_modules` (`<prefix>/node_modules` on Windows).
    async fn global_prefix_modules(&self) -> Option<PathBuf> {
        let (program, args) = self.npm_command.split_first()?;

        let output = tokio::time::timeout(
            PREFIX_QUERY_TIMEOUT,
            Command::new(program).args(args).args(["-g", "prefix"]).output(),
        )
        .await;

        let output = match output {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(output)) => {
                tracing::warn!(
                    "Global prefix query exited with {:?}",
                    output.status.code()
                );
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to query global prefix: {}", e);
                return None;
            }
            Err(_) => {
                tracing::warn!("Global prefix query timed out");
                return None;
            }
        };

        let prefix = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if prefix.is_empty() {
            return None;
        }

        let prefix = PathBuf::from(prefix);
        Some(if cfg!(windows) {
            prefix.join("node_modules")
        } else {
            prefix.join("lib").join("node_modules")
        })
    }
}

/// Combine the custom path, the path-list override and the defaults.
///
/// The custom path comes first. Override entries follow; when an override
/// is present the defaults are ignored. Empty entries and duplicates are
/// dropped, keeping the first occurrence.
pub fn assemble_search_paths(
    custom_plugin_path: Option<&Path>,
    node_path: Option<&str>,
    defaults: Vec<PathBuf>,
) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(custom) = custom_plugin_path {
        candidates.push(custom.to_path_buf());
    }

    match node_path {
        Some(node_path) => candidates.extend(std::env::split_paths(node_path)),
        None => candidates.extend(defaults),
    }

    let mut paths: Vec<PathBuf> = Vec::with_capacity(candidates.len());
    for path in candidates {
        if path.as_os_str().is_empty() || paths.contains(&path) {
            continue;
        }
        paths.push(path);
    }
    paths
}

/// Standard library locations for the current platform.
fn platform_default_paths() -> Vec<PathBuf> {
    if cfg!(windows) {
        dirs::data_dir()
            .map(|appdata| vec![appdata.join("npm").join("node_modules")])
            .unwrap_or_default()
    } else {
        POSIX_DEFAULT_PATHS.iter().map(PathBuf::from).collect()
    }
}

/// Locate the package manager binary.
///
/// On Windows the `npm.cmd` shim is looked up under the roaming app-data
/// directory, then under the Node.js install in Program Files. Elsewhere
/// `npm` is resolved through `PATH`.
fn detect_npm_command() -> Vec<String> {
    if cfg!(windows) {
        let candidates = [
            dirs::data_dir().map(|appdata| appdata.join("npm").join("npm.cmd")),
            std::env::var_os("ProgramFiles")
                .map(|pf| PathBuf::from(pf).join("nodejs").join("npm.cmd")),
        ];

        match candidates.into_iter().flatten().find(|p| p.exists()) {
            Some(npm) => {
                return vec![
                    npm.to_string_lossy().into_owned(),
                    NO_UPDATE_NOTIFIER.to_string(),
                ];
            }
            None => {
                tracing::error!(
                    "Cannot find npm binary. You will not be able to manage plugins or update \
                     Homebridge. You might be able to fix this problem by running: npm install -g npm"
                );
            }
        }
    }

    vec!["npm".to_string(), NO_UPDATE_NOTIFIER.to_string()]
}
