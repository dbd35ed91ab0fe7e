//! GitHub release notes client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};
use crate::{DEFAULT_GITHUB_API_URL, user_agent};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const GITHUB_PREFIX: &str = "https://github.com/";

/// Latest release of a plugin's repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNotes {
    /// Release title
    pub name: Option<String>,
    /// Release body (markdown)
    pub changelog: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

/// Extract `owner/repo` from a GitHub homepage URL.
///
/// `https://github.com/owner/repo#readme` becomes `owner/repo`.
pub fn github_repo_from_homepage(homepage: &str) -> Option<String> {
    let rest = homepage.strip_prefix(GITHUB_PREFIX)?;
    let repo = rest.split("#readme").next().unwrap_or(rest);
    let repo = repo.trim_end_matches('/');

    let mut parts = repo.split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => {
            Some(format!("{}/{}", owner, name.trim_end_matches(".git")))
        }
        _ => None,
    }
}

/// Client for the GitHub releases API.
#[derive(Clone)]
pub struct ReleaseClient {
    client: Client,
    base_url: String,
}

impl ReleaseClient {
    /// Create a new client with the default URL.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_GITHUB_API_URL)
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

    /// Fetch the latest release of `owner/repo`.
    pub async fn latest_release(&self, repo: &str) -> RegistryResult<ReleaseNotes> {
        let url = format!("{}/repos/{}/releases/latest", self.base_url, repo);

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| RegistryError::ConnectionFailed {
                    service: "github".to_string(),
                    message: e.to_string(),
                })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound {
                name: repo.to_string(),
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::ServerError {
                service: "github".to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let release: GithubRelease = response.json().await?;
        Ok(ReleaseNotes {
            name: release.name,
            changelog: release.body,
        })
    }

    /// Fetch release notes for a plugin given its homepage URL.
    pub async fn latest_release_for_homepage(
        &self,
        homepage: &str,
    ) -> RegistryResult<ReleaseNotes> {
        let repo = github_repo_from_homepage(homepage).ok_or_else(|| RegistryError::NotGithub {
            url: homepage.to_string(),
        })?;
        self.latest_release(&repo).await
    }
}

impl Default for ReleaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_github_repo_from_homepage() {
        assert_eq!(
            github_repo_from_homepage("https://github.com/ebaauw/homebridge-hue#readme"),
            Some("ebaauw/homebridge-hue".to_string())
        );
        assert_eq!(
            github_repo_from_homepage("https://github.com/homebridge/homebridge"),
            Some("homebridge/homebridge".to_string())
        );
        assert_eq!(
            github_repo_from_homepage("https://github.com/owner/repo.git"),
            Some("owner/repo".to_string())
        );
        assert_eq!(github_repo_from_homepage("https://gitlab.com/owner/repo"), None);
        assert_eq!(github_repo_from_homepage("https://github.com/owner"), None);
    }

    #[tokio::test]
    async fn test_latest_release() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/ebaauw/homebridge-hue/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "v0.13.2",
                "body": "* Fixed things"
            })))
            .mount(&server)
            .await;

        let client = ReleaseClient::with_url(server.uri());
        let notes = client
            .latest_release_for_homepage("https://github.com/ebaauw/homebridge-hue#readme")
            .await
            .unwrap();

        assert_eq!(notes.name.as_deref(), Some("v0.13.2"));
        assert_eq!(notes.changelog.as_deref(), Some("* Fixed things"));
    }

    #[tokio::test]
    async fn test_latest_release_not_github() {
        let client = ReleaseClient::with_url("http://127.0.0.1:9");
        let err = client
            .latest_release_for_homepage("https://example.com/plugin")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
