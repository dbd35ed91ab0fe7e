//! Plugin metadata service.
//!
//! The one entry point the transport layer talks to. Operations that need
//! to know what is installed take an [`InstalledPlugins`] produced by
//! [`PluginService::installed_plugins`].

use std::path::{Path, PathBuf};

use hbui_registry::{PluginRecord, RegistryClient, RegistryError, ReleaseClient, ReleaseNotes};
use serde_json::{Value, json};

use crate::config::PluginsConfig;
use crate::discovery::{
    CHANGELOG_FILE, HOMEBRIDGE_PACKAGE, InstalledPlugins, PluginDiscovery, SCHEMA_FILE,
    path_exists,
};
use crate::error::{PluginError, Result};
use crate::locks::InstallLocks;
use crate::manifest::MANIFEST_FILE;
use crate::paths::PathResolver;
use crate::runner::{CommandRequest, CommandRunner, OutputSink};

/// Plugin whose config schema receives the bridge pin.
pub const ALEXA_PLUGIN: &str = "homebridge-alexa";

/// Package manager action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginAction {
    Install,
    Update,
    Uninstall,
}

impl PluginAction {
    /// Package manager sub-command.
    pub fn npm_command(self) -> &'static str {
        match self {
            Self::Install | Self::Update => "install",
            Self::Uninstall => "uninstall",
        }
    }

    /// Argument naming the package.
    pub fn package_arg(self, name: &str) -> String {
        match self {
            Self::Install | Self::Update => format!("{}@latest", name),
            Self::Uninstall => name.to_string(),
        }
    }
}

impl std::fmt::Display for PluginAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Update => write!(f, "update"),
            Self::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// Discovers, searches, installs and describes plugins.
#[derive(Clone)]
pub struct PluginService {
    config: PluginsConfig,
    resolver: PathResolver,
    registry: RegistryClient,
    releases: ReleaseClient,
    discovery: PluginDiscovery,
    runner: CommandRunner,
    locks: InstallLocks,
}

impl PluginService {
    /// Create a service from configuration.
    pub fn new(config: PluginsConfig) -> Self {
        let resolver = PathResolver::new(&config);
        let registry = RegistryClient::with_url(&config.registry_url);
        let releases = ReleaseClient::with_url(&config.github_api_url);
        let discovery = PluginDiscovery::new(&config, resolver.clone(), registry.clone());
        let runner = CommandRunner::new(&config);

        Self {
            config,
            resolver,
            registry,
            releases,
            discovery,
            runner,
            locks: InstallLocks::new(),
        }
    }

    /// Replace the command runner (e.g. to shorten the timeout).
    pub fn with_runner(mut self, runner: CommandRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &PluginsConfig {
        &self.config
    }

    pub fn locks(&self) -> &InstallLocks {
        &self.locks
    }

    /// Discover and enrich every installed plugin.
    pub async fn installed_plugins(&self) -> InstalledPlugins {
        self.discovery.discover().await
    }

    /// Installed plugins with an update available.
    pub fn outdated_plugins(&self, installed: &InstalledPlugins) -> Vec<PluginRecord> {
        installed.outdated()
    }

    /// Registry search; installed records take precedence.
    pub async fn search(
        &self,
        installed: &InstalledPlugins,
        query: &str,
    ) -> Result<Vec<PluginRecord>> {
        Ok(self
            .registry
            .search_by_keyword(query, installed.plugins())
            .await?)
    }

    /// Look a single package up on the registry.
    pub async fn lookup(&self, name: &str) -> Result<PluginRecord> {
        match self.registry.lookup(name).await {
            Ok(record) => Ok(record),
            Err(RegistryError::NotFound { .. }) => Err(PluginError::not_found(name)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn install(
        &self,
        installed: &InstalledPlugins,
        name: &str,
        sink: &OutputSink,
    ) -> Result<()> {
        let location = match &self.config.custom_plugin_path {
            Some(custom) => custom.clone(),
            None => self.default_install_location(installed)?,
        };
        self.execute(PluginAction::Install, name, &location, sink)
            .await
    }

    pub async fn update(
        &self,
        installed: &InstalledPlugins,
        name: &str,
        sink: &OutputSink,
    ) -> Result<()> {
        let location = self.existing_location(installed, name)?;
        self.execute(PluginAction::Update, name, &location, sink)
            .await
    }

    pub async fn uninstall(
        &self,
        installed: &InstalledPlugins,
        name: &str,
        sink: &OutputSink,
    ) -> Result<()> {
        let location = self.existing_location(installed, name)?;
        self.execute(PluginAction::Uninstall, name, &location, sink)
            .await?;

        // npm removes an emptied node_modules directory.
        if let Some(custom) = &self.config.custom_plugin_path
            && !path_exists(custom).await
        {
            tracing::info!("Recreating custom plugin directory {:?}", custom);
            tokio::fs::create_dir_all(custom).await?;
        }
        Ok(())
    }

    /// The bridge's own package, enriched with registry metadata.
    pub async fn homebridge_package(&self) -> Result<PluginRecord> {
        self.discovery
            .discover_homebridge()
            .await
            .ok_or_else(|| PluginError::not_found(HOMEBRIDGE_PACKAGE))
    }

    /// Update the bridge package in place.
    pub async fn update_homebridge(&self, sink: &OutputSink) -> Result<()> {
        let package = self.homebridge_package().await?;
        let location = package
            .install_path
            .ok_or_else(|| PluginError::not_found(HOMEBRIDGE_PACKAGE))?;
        self.execute(PluginAction::Install, HOMEBRIDGE_PACKAGE, &location, sink)
            .await
    }

    /// The plugin's config schema, with console-provided defaults filled in.
    pub async fn config_schema(&self, installed: &InstalledPlugins, name: &str) -> Result<Value> {
        let package_dir = installed_package_dir(installed, name)?;
        let content = read_plugin_file(&package_dir.join(SCHEMA_FILE), name).await?;
        let mut schema: Value = serde_json::from_str(&content)?;

        if name == self.config.ui_package_name {
            set_property_default(&mut schema, "port", json!(self.config.ui_port));
        }

        if name == ALEXA_PLUGIN
            && let Some(pin) = &self.config.bridge_pin
        {
            set_property_default(&mut schema, "pin", json!(pin));
        }

        Ok(schema)
    }

    /// `{"changelog": <CHANGELOG.md>}` for an installed plugin.
    pub async fn changelog(&self, installed: &InstalledPlugins, name: &str) -> Result<Value> {
        let package_dir = installed_package_dir(installed, name)?;
        let changelog = read_plugin_file(&package_dir.join(CHANGELOG_FILE), name).await?;
        Ok(json!({ "changelog": changelog }))
    }

    /// Latest GitHub release of an installed plugin (or `homebridge`).
    pub async fn latest_release(
        &self,
        installed: &InstalledPlugins,
        name: &str,
    ) -> Result<ReleaseNotes> {
        let record = if name == HOMEBRIDGE_PACKAGE {
            self.homebridge_package().await?
        } else {
            installed
                .get(name)
                .cloned()
                .ok_or_else(|| PluginError::not_found(name))?
        };

        let homepage = record
            .links
            .homepage
            .as_deref()
            .ok_or_else(|| PluginError::not_found(format!("{} has no homepage", name)))?;

        self.releases
            .latest_release_for_homepage(homepage)
            .await
            .map_err(|e| {
                tracing::debug!(plugin = name, "No release notes: {}", e);
                PluginError::not_found(format!("release notes for {}", name))
            })
    }

    /// Full argv for an action at `location`.
    pub fn action_argv(&self, action: PluginAction, name: &str, location: &Path) -> Vec<String> {
        let mut argv = self.resolver.npm_command().to_vec();
        argv.push(action.npm_command().to_string());

        if !self.is_custom_location(location) || cfg!(windows) {
            argv.push("-g".to_string());
        }
        if self.saves_to_manifest(location) {
            argv.push("--save".to_string());
        }

        argv.push(action.package_arg(name));
        argv
    }

    fn is_custom_location(&self, location: &Path) -> bool {
        self.config.custom_plugin_path.as_deref() == Some(location)
    }

    fn saves_to_manifest(&self, location: &Path) -> bool {
        self.is_custom_location(location)
            && location
                .parent()
                .is_some_and(|parent| parent.join(MANIFEST_FILE).exists())
    }

    async fn execute(
        &self,
        action: PluginAction,
        name: &str,
        location: &Path,
        sink: &OutputSink,
    ) -> Result<()> {
        let cwd = location
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| location.to_path_buf());
        let argv = self.action_argv(action, name, location);

        let guard = self.locks.acquire(location).await;
        tracing::info!(plugin = name, %action, location = ?guard.path(), "Starting plugin command");

        let result = self
            .runner
            .run(CommandRequest::new(argv, cwd))
            .await?
            .with_guard(guard)
            .forward_to(sink)
            .await;

        match &result {
            Ok(()) => tracing::info!(plugin = name, %action, "Plugin command succeeded"),
            Err(e) => tracing::warn!(plugin = name, %action, "Plugin command failed: {}", e),
        }
        result
    }

    /// Where a fresh install goes without a custom plugin path: beside the
    /// console's own package, else the first search path.
    fn default_install_location(&self, installed: &InstalledPlugins) -> Result<PathBuf> {
        installed
            .get(&self.config.ui_package_name)
            .and_then(|ui| ui.install_path.clone())
            .or_else(|| installed.search_paths().first().cloned())
            .ok_or_else(|| {
                PluginError::Configuration("Cannot determine the plugin install location".into())
            })
    }

    /// Where an installed plugin currently lives. Globally installed
    /// plugins stay in the global tree even when a custom path is set.
    fn existing_location(&self, installed: &InstalledPlugins, name: &str) -> Result<PathBuf> {
        let record = installed
            .get(name)
            .ok_or_else(|| PluginError::not_found(name))?;

        match &self.config.custom_plugin_path {
            Some(custom) if !record.global_install => Ok(custom.clone()),
            _ => record
                .install_path
                .clone()
                .ok_or_else(|| PluginError::not_found(name)),
        }
    }
}

fn installed_package_dir(installed: &InstalledPlugins, name: &str) -> Result<PathBuf> {
    installed
        .get(name)
        .and_then(PluginRecord::package_dir)
        .ok_or_else(|| PluginError::not_found(name))
}

async fn read_plugin_file(path: &Path, name: &str) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            Err(PluginError::not_found(format!("{} for {}", file, name)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Set `schema.properties.<property>.default` when the property exists.
fn set_property_default(schema: &mut Value, property: &str, value: Value) {
    let pointer = format!("/schema/properties/{}", property);
    match schema.pointer_mut(&pointer).and_then(Value::as_object_mut) {
        Some(prop) => {
            prop.insert("default".to_string(), value);
        }
        None => tracing::debug!("Schema has no '{}' property", property),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service(config: PluginsConfig) -> PluginService {
        PluginService::new(PluginsConfig {
            npm_command: Some(vec!["npm".to_string()]),
            ..config
        })
    }

    #[test]
    fn test_action_args() {
        assert_eq!(PluginAction::Install.package_arg("homebridge-x"), "homebridge-x@latest");
        assert_eq!(PluginAction::Update.npm_command(), "install");
        assert_eq!(PluginAction::Uninstall.package_arg("homebridge-x"), "homebridge-x");
        assert_eq!(PluginAction::Uninstall.npm_command(), "uninstall");
    }

    #[cfg(unix)]
    #[test]
    fn test_global_flag_without_custom_path() {
        let service = service(PluginsConfig::default());
        let argv = service.action_argv(
            PluginAction::Install,
            "homebridge-x",
            Path::new("/usr/lib/node_modules"),
        );
        assert_eq!(argv, vec!["npm", "install", "-g", "homebridge-x@latest"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_flag_with_custom_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("node_modules");
        std::fs::create_dir(&custom).unwrap();

        let service = service(PluginsConfig {
            custom_plugin_path: Some(custom.clone()),
            ..Default::default()
        });

        let argv = service.action_argv(PluginAction::Uninstall, "homebridge-x", &custom);
        assert_eq!(argv, vec!["npm", "uninstall", "homebridge-x"]);

        std::fs::write(dir.path().join(MANIFEST_FILE), "{}").unwrap();
        let argv = service.action_argv(PluginAction::Install, "homebridge-x", &custom);
        assert_eq!(argv, vec!["npm", "install", "--save", "homebridge-x@latest"]);

        let argv = service.action_argv(
            PluginAction::Uninstall,
            "homebridge-x",
            Path::new("/usr/lib/node_modules"),
        );
        assert_eq!(argv, vec!["npm", "uninstall", "-g", "homebridge-x"]);
    }

    #[test]
    fn test_set_property_default() {
        let mut schema = json!({
            "pluginAlias": "config",
            "schema": { "type": "object", "properties": { "port": { "type": "integer" } } }
        });
        set_property_default(&mut schema, "port", json!(8581));
        set_property_default(&mut schema, "missing", json!(1));

        assert_eq!(schema["schema"]["properties"]["port"]["default"], json!(8581));
        assert!(schema["schema"]["properties"].get("missing").is_none());
    }

    #[test]
    fn test_default_install_location_prefers_ui_package() {
        let service = service(PluginsConfig::default());

        let mut ui = PluginRecord::new("homebridge-config-ui-x");
        ui.install_path = Some(PathBuf::from("/opt/node_modules"));
        let installed = InstalledPlugins::new(vec![ui], vec![PathBuf::from("/usr/lib/node_modules")]);
        assert_eq!(
            service.default_install_location(&installed).unwrap(),
            PathBuf::from("/opt/node_modules")
        );

        let installed = InstalledPlugins::new(Vec::new(), vec![PathBuf::from("/usr/lib/node_modules")]);
        assert_eq!(
            service.default_install_location(&installed).unwrap(),
            PathBuf::from("/usr/lib/node_modules")
        );

        let err = service
            .default_install_location(&InstalledPlugins::default())
            .unwrap_err();
        assert!(matches!(err, PluginError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_update_unknown_plugin_not_found() {
        let service = service(PluginsConfig::default());
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let err = service
            .update(&InstalledPlugins::default(), "homebridge-missing", &tx)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
