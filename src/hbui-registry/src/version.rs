//! Version comparison.

use semver::Version;

/// Parse a version string, tolerating a leading `v` (as printed by
/// `node --version`).
fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    Version::parse(version).ok()
}

/// Strict semver "less than". Unparsable input on either side is never older.
pub fn is_older(current: &str, target: &str) -> bool {
    match (parse_version(current), parse_version(target)) {
        (Some(current), Some(target)) => current < target,
        _ => false,
    }
}

/// True iff an installed version is known and is older than the latest one.
pub fn update_available(installed: Option<&str>, latest: Option<&str>) -> bool {
    match (installed, latest) {
        (Some(installed), Some(latest)) => is_older(installed, latest),
        _ => false,
    }
}
