//! Installed plugin discovery.
//!
//! A discovery pass scans every resolved search path, keeps packages that
//! follow the plugin naming convention and declare the plugin keyword,
//! and enriches the survivors with registry metadata. The result is an
//! [`InstalledPlugins`] value owned by the caller; operations that need to
//! know what is installed take it as an argument.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use hbui_registry::{
    PLUGIN_KEYWORD, PluginRecord, RegistryClient, is_plugin_name, sort_records, strip_urls,
};
use serde::Serialize;

use crate::config::PluginsConfig;
use crate::manifest::{MANIFEST_FILE, PackageManifest};
use crate::paths::PathResolver;

/// Optional settings schema shipped by a plugin.
pub const SCHEMA_FILE: &str = "config.schema.json";

/// Optional changelog shipped by a plugin.
pub const CHANGELOG_FILE: &str = "CHANGELOG.md";

/// Version reported for a manifest without one.
pub const DEFAULT_INSTALLED_VERSION: &str = "0.0.1";

/// Package name of the bridge itself.
pub const HOMEBRIDGE_PACKAGE: &str = "homebridge";

/// A directory that may hold a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCandidate {
    /// Package name (`homebridge-x` or `@scope/homebridge-x`)
    pub name: String,
    /// Search path containing the package
    pub path: PathBuf,
    /// Full path of the package directory
    pub install_path: PathBuf,
}

/// Result of one discovery pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstalledPlugins {
    plugins: Vec<PluginRecord>,
    #[serde(skip)]
    search_paths: Vec<PathBuf>,
}

impl InstalledPlugins {
    /// Wrap already-built records. Duplicates are resolved and the records
    /// are sorted.
    pub fn new(plugins: Vec<PluginRecord>, search_paths: Vec<PathBuf>) -> Self {
        let mut plugins = dedupe_records(plugins);
        sort_records(&mut plugins);
        Self {
            plugins,
            search_paths,
        }
    }

    /// All installed plugins, sorted.
    pub fn plugins(&self) -> &[PluginRecord] {
        &self.plugins
    }

    /// Search paths the pass scanned.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find an installed plugin by name.
    pub fn get(&self, name: &str) -> Option<&PluginRecord> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Plugins with an update available.
    pub fn outdated(&self) -> Vec<PluginRecord> {
        self.plugins
            .iter()
            .filter(|p| p.update_available)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn into_vec(self) -> Vec<PluginRecord> {
        self.plugins
    }
}

/// Keep one record per name. A non-global (custom path) record replaces a
/// global one; otherwise the first record wins.
pub fn dedupe_records(records: Vec<PluginRecord>) -> Vec<PluginRecord> {
    let mut unique: Vec<PluginRecord> = Vec::with_capacity(records.len());

    for record in records {
        match unique.iter().position(|existing| existing.name == record.name) {
            Some(index) => {
                if !record.global_install && unique[index].global_install {
                    unique[index] = record;
                }
            }
            None => unique.push(record),
        }
    }

    unique
}

/// Scans the filesystem for installed plugins.
#[derive(Clone)]
pub struct PluginDiscovery {
    resolver: PathResolver,
    registry: RegistryClient,
    custom_plugin_path: Option<PathBuf>,
    homebridge_package_path: Option<PathBuf>,
    ui_package_name: String,
}

impl PluginDiscovery {
    /// Create a discovery service.
    pub fn new(config: &PluginsConfig, resolver: PathResolver, registry: RegistryClient) -> Self {
        Self {
            resolver,
            registry,
            custom_plugin_path: config.custom_plugin_path.clone(),
            homebridge_package_path: config.homebridge_package_path.clone(),
            ui_package_name: config.ui_package_name.clone(),
        }
    }

    /// Run a full discovery pass.
    pub async fn discover(&self) -> InstalledPlugins {
        let search_paths = self.resolver.search_paths().await;
        let candidates = list_candidates(&search_paths).await;
        tracing::debug!("Found {} plugin candidates", candidates.len());

        let mut records = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            if let Some(record) = self.build_record(candidate).await {
                records.push(record);
            }
        }

        let mut records = dedupe_records(records);
        join_all(records.iter_mut().map(|r| self.registry.enrich(r))).await;

        let installed = InstalledPlugins::new(records, search_paths);
        tracing::info!("Discovered {} installed plugins", installed.len());
        installed
    }

    /// Build a record for a candidate, or `None` if it is not a plugin.
    async fn build_record(&self, candidate: &ModuleCandidate) -> Option<PluginRecord> {
        let manifest_path = candidate.install_path.join(MANIFEST_FILE);
        let manifest = match PackageManifest::from_file(&manifest_path, &candidate.name).await {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", candidate.install_path, e);
                return None;
            }
        };

        if !manifest.has_keyword(PLUGIN_KEYWORD) {
            tracing::debug!(
                plugin = %candidate.name,
                "Missing '{}' keyword, skipping",
                PLUGIN_KEYWORD
            );
            return None;
        }

        Some(self.record_from_manifest(candidate, manifest).await)
    }

    async fn record_from_manifest(
        &self,
        candidate: &ModuleCandidate,
        manifest: PackageManifest,
    ) -> PluginRecord {
        let mut record = PluginRecord::new(candidate.name.clone());
        record.description = manifest
            .description
            .as_deref()
            .map(strip_urls)
            .filter(|d| !d.is_empty());
        record.installed_version = Some(
            manifest
                .version
                .unwrap_or_else(|| DEFAULT_INSTALLED_VERSION.to_string()),
        );
        record.global_install = self.custom_plugin_path.as_deref() != Some(candidate.path.as_path());
        record.settings_schema = candidate.name == self.ui_package_name
            || path_exists(&candidate.install_path.join(SCHEMA_FILE)).await;
        record.install_path = Some(candidate.path.clone());
        record
    }

    /// Locate and enrich the bridge's own package.
    ///
    /// Uses the explicit package path when configured, otherwise the
    /// `homebridge` directory of the first search path that has one.
    pub async fn discover_homebridge(&self) -> Option<PluginRecord> {
        let candidate = match &self.homebridge_package_path {
            Some(package_dir) => ModuleCandidate {
                name: HOMEBRIDGE_PACKAGE.to_string(),
                path: package_dir
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| package_dir.clone()),
                install_path: package_dir.clone(),
            },
            None => {
                let search_paths = self.resolver.search_paths().await;
                let mut found = None;
                for path in search_paths {
                    let install_path = path.join(HOMEBRIDGE_PACKAGE);
                    if path_exists(&install_path.join(MANIFEST_FILE)).await {
                        found = Some(ModuleCandidate {
                            name: HOMEBRIDGE_PACKAGE.to_string(),
                            path,
                            install_path,
                        });
                        break;
                    }
                }
                found?
            }
        };

        let manifest_path = candidate.install_path.join(MANIFEST_FILE);
        let manifest = match PackageManifest::from_file(&manifest_path, HOMEBRIDGE_PACKAGE).await {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::error!("Failed to read the homebridge package: {}", e);
                return None;
            }
        };

        let mut record = self.record_from_manifest(&candidate, manifest).await;
        self.registry.enrich(&mut record).await;
        Some(record)
    }
}

/// List plugin candidates in the immediate children of every path.
///
/// Scope directories (`@scope`) are looked into one level deeper.
pub async fn list_candidates(paths: &[PathBuf]) -> Vec<ModuleCandidate> {
    let mut candidates = Vec::new();

    for path in paths {
        for name in child_dirs(path).await {
            if name.starts_with('@') {
                for scoped in child_dirs(&path.join(&name)).await {
                    candidates.push(candidate(path, format!("{}/{}", name, scoped)));
                }
            } else {
                candidates.push(candidate(path, name));
            }
        }
    }

    let mut plugins = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if is_plugin_name(&candidate.name)
            && path_exists(&candidate.install_path.join(MANIFEST_FILE)).await
        {
            plugins.push(candidate);
        }
    }
    plugins
}

fn candidate(path: &Path, name: String) -> ModuleCandidate {
    ModuleCandidate {
        install_path: path.join(&name),
        path: path.to_path_buf(),
        name,
    }
}

/// Names of the directories directly under `path` (symlinks followed).
async fn child_dirs(path: &Path) -> Vec<String> {
    let mut names = Vec::new();

    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Error reading plugin directory {:?}: {}", path, e);
            return names;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Error reading plugin directory {:?}: {}", path, e);
                break;
            }
        };

        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    names
}

pub(crate) async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
