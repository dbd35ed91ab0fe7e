//! Plugin naming conventions.

use std::sync::LazyLock;

use regex::Regex;

/// Every plugin package name starts with this (after an optional scope).
pub const PLUGIN_PREFIX: &str = "homebridge-";

/// Keyword a package manifest must list to be treated as a plugin.
pub const PLUGIN_KEYWORD: &str = "homebridge-plugin";

/// Scope reserved for certified plugins.
pub const CERTIFIED_SCOPE: &str = "@homebridge/";

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?|ftp)://[\n\S]+").expect("valid url regex"));

/// Returns true for `homebridge-*` and `@scope/homebridge-*` names.
pub fn is_plugin_name(name: &str) -> bool {
    if name.starts_with(PLUGIN_PREFIX) {
        return true;
    }

    match name.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
        Some((scope, package)) => !scope.is_empty() && package.starts_with(PLUGIN_PREFIX),
        None => false,
    }
}

/// Returns true when the package lives in the certified scope.
pub fn is_certified(name: &str) -> bool {
    name.starts_with(CERTIFIED_SCOPE)
}

/// Removes URLs from a package description.
pub fn strip_urls(description: &str) -> String {
    URL_REGEX.replace_all(description, "").trim().to_string()
}
