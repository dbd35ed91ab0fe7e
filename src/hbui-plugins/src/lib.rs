//! hbui Plugins - Homebridge plugin management.
//!
//! This crate provides:
//! - Search path resolution for globally and locally installed packages
//! - Strict `package.json` validation and installed plugin discovery
//! - A PTY-backed package manager runner with streamed output
//! - Per-install-path locking so commands on one location never overlap
//! - [`PluginService`], the entry point used by the HTTP and WebSocket layer
//!
//! # Example
//!
//! ```rust,ignore
//! use hbui_plugins::{PluginService, PluginsConfig};
//!
//! let service = PluginService::new(PluginsConfig::from_env());
//! let installed = service.installed_plugins().await;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! tokio::spawn(async move {
//!     while let Some(chunk) = rx.recv().await {
//!         print!("{}", chunk);
//!     }
//! });
//! service.update(&installed, "homebridge-hue", &tx).await?;
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod locks;
pub mod manifest;
pub mod paths;
pub mod runner;
pub mod service;

pub use config::PluginsConfig;
pub use discovery::{
    CHANGELOG_FILE, DEFAULT_INSTALLED_VERSION, HOMEBRIDGE_PACKAGE, InstalledPlugins,
    ModuleCandidate, PluginDiscovery, SCHEMA_FILE, dedupe_records, list_candidates,
};
pub use error::{COMMAND_FAILED_MESSAGE, PluginError, Result};
pub use locks::{InstallGuard, InstallLocks};
pub use manifest::{MANIFEST_FILE, PackageManifest};
pub use paths::{NO_UPDATE_NOTIFIER, PathResolver, assemble_search_paths};
pub use runner::{
    CommandRequest, CommandRun, CommandRunner, OutputSink, RunEvent, RunOutcome, SUCCESS_MESSAGE,
};
pub use service::{ALEXA_PLUGIN, PluginAction, PluginService};

// Re-export the record types callers receive
pub use hbui_registry::{PluginLinks, PluginRecord, ReleaseNotes};
