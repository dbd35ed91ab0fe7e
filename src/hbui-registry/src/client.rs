//! Public npm registry client.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::{RegistryError, RegistryResult};
use crate::naming::{PLUGIN_KEYWORD, is_plugin_name, strip_urls};
use crate::record::{PluginLinks, PluginRecord};
use crate::{DEFAULT_REGISTRY_URL, user_agent};

/// Every registry request gives up after this long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum number of results requested from the search endpoint.
const SEARCH_SIZE: &str = "30";

/// Web page base for a package on the public registry.
const NPM_PACKAGE_URL: &str = "https://www.npmjs.com/package";

/// Latest-version metadata of a single package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub latest_version: Option<String>,
    pub homepage: Option<String>,
    pub bugs_url: Option<String>,
    pub maintainer_name: Option<String>,
    pub last_updated: Option<String>,
    /// Registry web page of the package
    pub npm_url: String,
}

/// Get-by-name document (only the fields the console uses).
#[derive(Debug, Deserialize)]
struct PackageDocument {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    bugs: Option<BugsField>,
    #[serde(default)]
    maintainers: Vec<Maintainer>,
    #[serde(default)]
    time: HashMap<String, String>,
}

/// `bugs` is either `{ "url": ... }` or a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BugsField {
    Object {
        #[serde(default)]
        url: Option<String>,
    },
    Plain(String),
}

#[derive(Debug, Deserialize)]
struct Maintainer {
    #[serde(default)]
    name: Option<String>,
}

impl PackageDocument {
    fn into_metadata(self) -> PackageMetadata {
        let bugs_url = match self.bugs {
            Some(BugsField::Object { url }) => url,
            Some(BugsField::Plain(url)) => Some(url),
            None => None,
        };

        PackageMetadata {
            latest_version: self.dist_tags.get("latest").cloned(),
            homepage: self.homepage,
            bugs_url,
            maintainer_name: self.maintainers.into_iter().next().and_then(|m| m.name),
            last_updated: self.time.get("modified").cloned(),
            npm_url: npm_url(&self.name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    objects: Vec<SearchObject>,
}

#[derive(Debug, Deserialize)]
struct SearchObject {
    package: SearchPackage,
    #[serde(default)]
    flags: SearchFlags,
}

#[derive(Debug, Default, Deserialize)]
struct SearchFlags {
    #[serde(default)]
    deprecated: Option<serde_json::Value>,
}

impl SearchFlags {
    /// The registry sends either a deprecation message or a boolean.
    fn is_deprecated(&self) -> bool {
        match &self.deprecated {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => false,
            Some(_) => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPackage {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    links: SearchLinks,
    #[serde(default)]
    publisher: Option<Publisher>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchLinks {
    #[serde(default)]
    npm: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    bugs: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Publisher {
    #[serde(default)]
    username: Option<String>,
}

impl SearchPackage {
    fn into_record(self) -> PluginRecord {
        let mut record = PluginRecord::new(self.name);
        record.description = self.description.as_deref().map(strip_urls);
        record.latest_version = self.version;
        record.last_updated = self.date;
        record.links = PluginLinks {
            npm: self.links.npm.or_else(|| Some(npm_url(&record.name))),
            homepage: self.links.homepage,
            bugs: self.links.bugs,
        };
        record.author = self.publisher.and_then(|p| p.username);
        record
    }
}

/// Registry web page URL of a package.
fn npm_url(name: &str) -> String {
    format!("{}/{}", NPM_PACKAGE_URL, name)
}

/// Client for the public package registry.
#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    /// Create a new client with the default URL.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_REGISTRY_URL)
    }

    /// Create a new client with a custom URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the get-by-name document of a package.
    async fn fetch_document(&self, name: &str) -> RegistryResult<PackageDocument> {
        let url = format!("{}/{}", self.base_url, name.replace('/', "%2f"));

        let response = self.client.get(&url).send().await.map_err(|e| {
            RegistryError::ConnectionFailed {
                service: "registry".to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound {
                name: name.to_string(),
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::ServerError {
                service: "registry".to_string(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Get latest-version metadata for a package.
    pub async fn get_package_metadata(&self, name: &str) -> RegistryResult<PackageMetadata> {
        Ok(self.fetch_document(name).await?.into_metadata())
    }

    /// Look a package up by exact name and build a record for it.
    pub async fn lookup(&self, name: &str) -> RegistryResult<PluginRecord> {
        let document = self.fetch_document(name).await?;

        let mut record = PluginRecord::new(document.name.clone());
        record.description = document.description.as_deref().map(strip_urls);
        record.apply_metadata(document.into_metadata());
        Ok(record)
    }

    /// Enrich an installed record with registry metadata.
    ///
    /// Failures never propagate: the record is marked as not public instead.
    pub async fn enrich(&self, record: &mut PluginRecord) {
        match self.get_package_metadata(&record.name).await {
            Ok(metadata) => record.apply_metadata(metadata),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(plugin = %record.name, "Registry lookup failed: {}", e);
                }
                record.mark_private();
            }
        }
    }

    /// Keyword search for plugins, merged with the installed records.
    ///
    /// Installed records replace registry results of the same name. When
    /// the search finds nothing and the query is itself a plugin name, an
    /// exact-name lookup is attempted instead.
    pub async fn search_by_keyword(
        &self,
        query: &str,
        installed: &[PluginRecord],
    ) -> RegistryResult<Vec<PluginRecord>> {
        let url = format!("{}/-/v1/search", self.base_url);
        let text = format!("keywords:{} {}", PLUGIN_KEYWORD, query);

        let response = self
            .client
            .get(&url)
            .query(&[("text", text.as_str()), ("size", SEARCH_SIZE)])
            .send()
            .await
            .map_err(|e| RegistryError::ConnectionFailed {
                service: "registry".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::ServerError {
                service: "registry".to_string(),
                status,
                message,
            });
        }

        let results: SearchResponse = response.json().await?;

        let records: Vec<PluginRecord> = results
            .objects
            .into_iter()
            .filter(|object| !object.flags.is_deprecated())
            .filter(|object| is_plugin_name(&object.package.name))
            .map(|object| prefer_installed(object.package.into_record(), installed))
            .collect();

        if records.is_empty() && is_plugin_name(query) {
            tracing::debug!(query, "Keyword search empty, trying exact lookup");
            return self.search_exact(query, installed).await;
        }

        Ok(records)
    }

    /// Exact-name fallback used by [`Self::search_by_keyword`].
    async fn search_exact(
        &self,
        name: &str,
        installed: &[PluginRecord],
    ) -> RegistryResult<Vec<PluginRecord>> {
        match self.lookup(name).await {
            Ok(record) => Ok(vec![prefer_installed(record, installed)]),
            Err(RegistryError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Installed data wins over registry data for matching names.
fn prefer_installed(record: PluginRecord, installed: &[PluginRecord]) -> PluginRecord {
    installed
        .iter()
        .find(|i| i.name == record.name)
        .cloned()
        .unwrap_or(record)
}
