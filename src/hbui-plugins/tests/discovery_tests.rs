//! Discovery tests against temporary package trees and a mock registry.

use std::path::{Path, PathBuf};

use hbui_plugins::{PluginService, PluginsConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Write a package directory with the given manifest.
fn write_package(modules: &Path, name: &str, manifest: serde_json::Value) -> PathBuf {
    let dir = modules.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("package.json"), manifest.to_string()).unwrap();
    dir
}

fn plugin_manifest(name: &str, version: &str) -> serde_json::Value {
    json!({
        "name": name,
        "version": version,
        "description": "A plugin, see https://example.com/docs for more",
        "keywords": ["homebridge-plugin"]
    })
}

struct Fixture {
    _root: TempDir,
    custom: PathBuf,
    global: PathBuf,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let custom = root.path().join("storage").join("node_modules");
    let global = root.path().join("global").join("node_modules");
    std::fs::create_dir_all(&custom).unwrap();
    std::fs::create_dir_all(&global).unwrap();
    Fixture {
        _root: root,
        custom,
        global,
    }
}

fn service(fixture: &Fixture, registry: &MockServer) -> PluginService {
    PluginService::new(PluginsConfig {
        custom_plugin_path: Some(fixture.custom.clone()),
        node_path: Some(fixture.global.to_string_lossy().into_owned()),
        registry_url: registry.uri(),
        npm_command: Some(vec!["npm".to_string()]),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_discovers_only_valid_plugins() {
    let fixture = fixture();
    let registry = MockServer::start().await;

    write_package(&fixture.global, "homebridge-hue", plugin_manifest("homebridge-hue", "0.13.0"));
    write_package(
        &fixture.global,
        "homebridge-no-keyword",
        json!({ "name": "homebridge-no-keyword", "version": "1.0.0" }),
    );
    write_package(
        &fixture.global,
        "homebridge-bad-version",
        json!({ "name": "homebridge-bad-version", "version": "latest", "keywords": ["homebridge-plugin"] }),
    );
    write_package(&fixture.global, "express", plugin_manifest("express", "4.0.0"));
    std::fs::create_dir_all(fixture.global.join("homebridge-empty")).unwrap();

    let installed = service(&fixture, &registry).installed_plugins().await;
    let names: Vec<&str> = installed.plugins().iter().map(|p| p.name.as_str()).collect();

    assert_eq!(names, vec!["homebridge-hue"]);
}

#[tokio::test]
async fn test_record_fields() {
    let fixture = fixture();
    let registry = MockServer::start().await;

    let dir = write_package(
        &fixture.global,
        "@homebridge/homebridge-camera-ffmpeg",
        plugin_manifest("@homebridge/homebridge-camera-ffmpeg", "3.1.0"),
    );
    std::fs::write(dir.join("config.schema.json"), "{}").unwrap();
    write_package(
        &fixture.custom,
        "homebridge-noversion",
        json!({ "name": "homebridge-noversion", "keywords": ["homebridge-plugin"] }),
    );

    let installed = service(&fixture, &registry).installed_plugins().await;

    let camera = installed.get("@homebridge/homebridge-camera-ffmpeg").unwrap();
    assert!(camera.certified_plugin);
    assert!(camera.settings_schema);
    assert!(camera.global_install);
    assert_eq!(camera.description.as_deref(), Some("A plugin, see  for more"));
    assert_eq!(camera.install_path.as_deref(), Some(fixture.global.as_path()));
    assert!(!camera.public_package);

    let local = installed.get("homebridge-noversion").unwrap();
    assert_eq!(local.installed_version.as_deref(), Some("0.0.1"));
    assert!(!local.global_install);
    assert!(!local.settings_schema);
    assert!(!local.certified_plugin);
}

#[tokio::test]
async fn test_custom_path_wins_over_global() {
    let fixture = fixture();
    let registry = MockServer::start().await;

    write_package(&fixture.global, "homebridge-hue", plugin_manifest("homebridge-hue", "0.11.0"));
    write_package(&fixture.custom, "homebridge-hue", plugin_manifest("homebridge-hue", "0.13.0"));

    let installed = service(&fixture, &registry).installed_plugins().await;

    assert_eq!(installed.len(), 1);
    let hue = installed.get("homebridge-hue").unwrap();
    assert!(!hue.global_install);
    assert_eq!(hue.installed_version.as_deref(), Some("0.13.0"));
}

#[tokio::test]
async fn test_enrichment_and_sorting() {
    let fixture = fixture();
    let registry = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/homebridge-zwave"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "homebridge-zwave",
            "dist-tags": { "latest": "2.0.0" },
            "homepage": "https://github.com/example/homebridge-zwave#readme",
            "maintainers": [{ "name": "maintainer" }],
            "time": { "modified": "2026-01-01T00:00:00.000Z" }
        })))
        .mount(&registry)
        .await;

    Mock::given(method("GET"))
        .and(path("/homebridge-alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "homebridge-alpha",
            "dist-tags": { "latest": "1.0.0" }
        })))
        .mount(&registry)
        .await;

    write_package(&fixture.global, "homebridge-alpha", plugin_manifest("homebridge-alpha", "1.0.0"));
    write_package(&fixture.global, "homebridge-beta", plugin_manifest("homebridge-beta", "1.0.0"));
    write_package(&fixture.global, "homebridge-zwave", plugin_manifest("homebridge-zwave", "1.5.0"));

    let service = service(&fixture, &registry);
    let installed = service.installed_plugins().await;
    let names: Vec<&str> = installed.plugins().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["homebridge-zwave", "homebridge-alpha", "homebridge-beta"]);

    let zwave = installed.get("homebridge-zwave").unwrap();
    assert!(zwave.update_available);
    assert!(zwave.public_package);
    assert_eq!(zwave.latest_version.as_deref(), Some("2.0.0"));
    assert_eq!(zwave.author.as_deref(), Some("maintainer"));

    assert!(installed.get("homebridge-alpha").unwrap().public_package);
    assert!(!installed.get("homebridge-beta").unwrap().public_package);

    let outdated = service.outdated_plugins(&installed);
    assert_eq!(outdated.len(), 1);
    assert_eq!(outdated[0].name, "homebridge-zwave");
}

#[tokio::test]
async fn test_empty_when_no_search_paths_exist() {
    let root = tempfile::tempdir().unwrap();
    let registry = MockServer::start().await;

    let service = PluginService::new(PluginsConfig {
        node_path: Some(root.path().join("missing").to_string_lossy().into_owned()),
        registry_url: registry.uri(),
        npm_command: Some(vec!["npm".to_string()]),
        ..Default::default()
    });

    let installed = service.installed_plugins().await;
    assert!(installed.is_empty());
    assert!(installed.search_paths().is_empty());
}

#[tokio::test]
async fn test_discovery_is_fresh_each_call() {
    let fixture = fixture();
    let registry = MockServer::start().await;
    let service = service(&fixture, &registry);

    assert!(service.installed_plugins().await.is_empty());

    write_package(&fixture.custom, "homebridge-new", plugin_manifest("homebridge-new", "1.0.0"));
    let installed = service.installed_plugins().await;
    assert!(installed.get("homebridge-new").is_some());
}

#[tokio::test]
async fn test_homebridge_package_from_override() {
    let fixture = fixture();
    let registry = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/homebridge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "homebridge",
            "dist-tags": { "latest": "1.8.0" },
            "homepage": "https://github.com/homebridge/homebridge#readme"
        })))
        .mount(&registry)
        .await;

    let package_dir = write_package(
        &fixture.global,
        "homebridge",
        json!({ "name": "homebridge", "version": "1.7.0" }),
    );

    let service = PluginService::new(PluginsConfig {
        homebridge_package_path: Some(package_dir),
        registry_url: registry.uri(),
        npm_command: Some(vec!["npm".to_string()]),
        ..Default::default()
    });

    let record = service.homebridge_package().await.unwrap();
    assert_eq!(record.name, "homebridge");
    assert_eq!(record.installed_version.as_deref(), Some("1.7.0"));
    assert!(record.update_available);
    assert_eq!(record.install_path.as_deref(), Some(fixture.global.as_path()));
}

#[tokio::test]
async fn test_homebridge_package_from_search_paths() {
    let fixture = fixture();
    let registry = MockServer::start().await;

    write_package(
        &fixture.global,
        "homebridge",
        json!({ "name": "homebridge", "version": "1.8.0" }),
    );

    let record = service(&fixture, &registry).homebridge_package().await.unwrap();
    assert_eq!(record.install_path.as_deref(), Some(fixture.global.as_path()));
    assert!(!record.update_available);
}
