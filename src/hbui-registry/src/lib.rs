//! hbui Registry - package metadata for Homebridge plugins.
//!
//! Provides:
//! - [`RegistryClient`] for the public npm registry (keyword search and
//!   get-by-name lookups)
//! - [`ReleaseClient`] for latest release notes on GitHub
//! - [`PluginRecord`], the record the console shows for every plugin
//! - Semver helpers used to decide whether an update is available
//!
//! # Example
//!
//! ```rust,ignore
//! use hbui_registry::{PluginRecord, RegistryClient};
//!
//! let registry = RegistryClient::new();
//! let mut record = PluginRecord::new("homebridge-hue");
//! record.installed_version = Some("0.11.0".into());
//! registry.enrich(&mut record).await;
//!
//! if record.update_available {
//!     println!("{} -> {:?}", record.name, record.latest_version);
//! }
//! ```

mod client;
mod error;
mod naming;
mod record;
mod release;
mod version;

pub use client::{PackageMetadata, RegistryClient};
pub use error::{RegistryError, RegistryResult};
pub use naming::{
    CERTIFIED_SCOPE, PLUGIN_KEYWORD, PLUGIN_PREFIX, is_certified, is_plugin_name, strip_urls,
};
pub use record::{PluginLinks, PluginRecord, sort_records};
pub use release::{ReleaseClient, ReleaseNotes, github_repo_from_homepage};
pub use version::{is_older, update_available};

/// Current version of hbui (set at compile time)
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default public package registry URL
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Default GitHub API URL
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// User agent sent with every outgoing request.
pub fn user_agent() -> String {
    format!("hbui/{} (plugin console)", CURRENT_VERSION)
}
