//! The plugin record shown by the console.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::client::PackageMetadata;
use crate::naming::is_certified;
use crate::version::update_available;

/// Links shown next to a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginLinks {
    /// Registry page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,
    /// Project homepage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Issue tracker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bugs: Option<String>,
}

/// One discovered or registry-known plugin package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    /// Package name, unique within any returned collection
    pub name: String,
    /// Description with URLs stripped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Published under the certified scope
    pub certified_plugin: bool,
    /// Known to the public registry
    pub public_package: bool,
    /// Ships a `config.schema.json`
    pub settings_schema: bool,
    /// Installed outside the custom plugin path
    pub global_install: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Directory containing the package (e.g. a `node_modules` directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    pub links: PluginLinks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub update_available: bool,
}

impl PluginRecord {
    /// Create an empty record for a package name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            certified_plugin: is_certified(&name),
            name,
            description: None,
            public_package: true,
            settings_schema: false,
            global_install: false,
            installed_version: None,
            latest_version: None,
            last_updated: None,
            install_path: None,
            links: PluginLinks::default(),
            author: None,
            update_available: false,
        }
    }

    /// Full path of the package directory, if installed.
    pub fn package_dir(&self) -> Option<PathBuf> {
        self.install_path.as_ref().map(|p| p.join(&self.name))
    }

    /// Copy registry metadata onto the record and recompute
    /// `update_available`.
    pub fn apply_metadata(&mut self, metadata: PackageMetadata) {
        self.public_package = true;
        self.latest_version = metadata.latest_version;
        if metadata.last_updated.is_some() {
            self.last_updated = metadata.last_updated;
        }
        self.links.npm = Some(metadata.npm_url);
        self.links.homepage = metadata.homepage;
        self.links.bugs = metadata.bugs_url;
        self.author = metadata.maintainer_name;
        self.update_available = update_available(
            self.installed_version.as_deref(),
            self.latest_version.as_deref(),
        );
    }

    /// Mark the record as not published on the public registry.
    pub fn mark_private(&mut self) {
        self.public_package = false;
        self.update_available = false;
    }
}

/// Sort by `update_available` (true first) then by name.
pub fn sort_records(records: &mut [PluginRecord]) {
    records.sort_by(|a, b| {
        b.update_available
            .cmp(&a.update_available)
            .then_with(|| a.name.cmp(&b.name))
    });
}
