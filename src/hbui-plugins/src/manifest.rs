//! Package manifest (`package.json`) validation.
//!
//! Manifests are parsed loosely into JSON first and then mapped field by
//! field into a typed [`PackageManifest`], so a malformed file produces an
//! error that names the offending field.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::{PluginError, Result};

/// Manifest file name inside every package directory.
pub const MANIFEST_FILE: &str = "package.json";

/// Validated package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    keywords: Option<Value>,
    #[serde(default)]
    version: Option<Value>,
}

impl PackageManifest {
    /// Read and validate a manifest file.
    ///
    /// `package` names the candidate in error messages.
    pub async fn from_file(path: impl AsRef<Path>, package: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::parse(&content, package)
    }

    /// Parse and validate manifest content.
    pub fn parse(content: &str, package: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(content).map_err(|e| {
            PluginError::invalid_manifest(package, format!("Failed to parse JSON: {}", e))
        })?;

        let name = match raw.name {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            Some(Value::String(_)) => {
                return Err(PluginError::invalid_manifest(package, "name cannot be empty"));
            }
            Some(_) => {
                return Err(PluginError::invalid_manifest(package, "name must be a string"));
            }
            None => return Err(PluginError::invalid_manifest(package, "name is missing")),
        };

        let description = match raw.description {
            None | Some(Value::Null) => None,
            Some(Value::String(description)) => Some(description),
            Some(_) => {
                return Err(PluginError::invalid_manifest(
                    package,
                    "description must be a string",
                ));
            }
        };

        let keywords = match raw.keywords {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .into_iter()
                .map(|v| match v {
                    Value::String(keyword) => Ok(keyword),
                    _ => Err(PluginError::invalid_manifest(
                        package,
                        "keywords must be a list of strings",
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(PluginError::invalid_manifest(
                    package,
                    "keywords must be a list of strings",
                ));
            }
        };

        let version = match raw.version {
            None | Some(Value::Null) => None,
            Some(Value::String(version)) => {
                if semver::Version::parse(&version).is_err() {
                    return Err(PluginError::invalid_manifest(
                        package,
                        format!("Invalid semver version: {}", version),
                    ));
                }
                Some(version)
            }
            Some(_) => {
                return Err(PluginError::invalid_manifest(
                    package,
                    "version must be a string",
                ));
            }
        };

        Ok(Self {
            name,
            description,
            keywords,
            version,
        })
    }

    /// Check whether the manifest lists a keyword.
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_manifest() {
        let manifest = PackageManifest::parse(
            r#"{
                "name": "homebridge-hue",
                "description": "Hue plugin",
                "keywords": ["homebridge-plugin", "hue"],
                "version": "0.13.2",
                "dependencies": { "foo": "^1.0.0" }
            }"#,
            "homebridge-hue",
        )
        .unwrap();

        assert_eq!(manifest.name, "homebridge-hue");
        assert_eq!(manifest.version.as_deref(), Some("0.13.2"));
        assert!(manifest.has_keyword("homebridge-plugin"));
        assert!(!manifest.has_keyword("homebridge"));
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = PackageManifest::parse(r#"{ "name": "homebridge-x" }"#, "x").unwrap();
        assert!(manifest.keywords.is_empty());
        assert!(manifest.version.is_none());
        assert!(manifest.description.is_none());
    }

    #[test]
    fn test_rejects_missing_name() {
        let err = PackageManifest::parse(r#"{ "version": "1.0.0" }"#, "homebridge-x").unwrap_err();
        assert!(err.to_string().contains("homebridge-x"));
        assert!(err.to_string().contains("name is missing"));
    }

    #[test]
    fn test_rejects_bad_keywords() {
        let err =
            PackageManifest::parse(r#"{ "name": "homebridge-x", "keywords": "homebridge-plugin" }"#, "x")
                .unwrap_err();
        assert!(err.to_string().contains("keywords"));

        let err = PackageManifest::parse(r#"{ "name": "homebridge-x", "keywords": [1, 2] }"#, "x")
            .unwrap_err();
        assert!(err.to_string().contains("keywords"));
    }

    #[test]
    fn test_rejects_invalid_version() {
        let err = PackageManifest::parse(r#"{ "name": "homebridge-x", "version": "one" }"#, "x")
            .unwrap_err();
        assert!(err.to_string().contains("semver"));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let err = PackageManifest::parse("{ not json", "homebridge-x").unwrap_err();
        assert!(matches!(err, PluginError::InvalidManifest { .. }));
    }
}
