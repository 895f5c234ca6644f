//! GitHub releases API client.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::ProviderSettings;

use super::{ReleaseInfo, ReleaseLookup};

/// Queries `GET /repos/{user}/{repo}/releases/latest`.
///
/// An answer without `tag_name` is followed by a probe of the repository
/// endpoint: when that one has no `name` either, the credentials are
/// considered invalid.
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    client: reqwest::Client,
}

impl GitHubReleases {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("deployer/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    async fn get_json(&self, url: &str, settings: &ProviderSettings) -> anyhow::Result<Value> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let (Some(username), Some(token)) = (&settings.username, &settings.access_token) {
            request = request.basic_auth(username, Some(token));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to query {}", url))?;

        let status = response.status();
        if status.is_server_error() {
            anyhow::bail!("GitHub API answered HTTP {} for {}", status, url);
        }

        // Error answers (401, 404) carry JSON without the fields we look for.
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ReleaseLookup for GitHubReleases {
    async fn latest_release(
        &self,
        settings: &ProviderSettings,
        repo_name: &str,
    ) -> anyhow::Result<ReleaseInfo> {
        if settings.access_token.is_none() {
            tracing::warn!("Missing Access Token! Take a look at the github provider configuration.");
        }
        let Some(username) = settings.username.as_deref() else {
            tracing::warn!("Username unknown! Take a look at the github provider configuration.");
            return Ok(ReleaseInfo::InvalidCredentials);
        };

        let repo_url = format!(
            "{}/repos/{}/{}",
            settings.api_url.trim_end_matches('/'),
            username,
            repo_name
        );

        let latest = self
            .get_json(&format!("{}/releases/latest", repo_url), settings)
            .await?;
        if let Some(tag) = latest.get("tag_name").and_then(Value::as_str)
            && !tag.is_empty()
        {
            return Ok(ReleaseInfo::Published(tag.to_string()));
        }

        let repo = self.get_json(&repo_url, settings).await?;
        let has_name = repo
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.is_empty());

        Ok(if has_name {
            ReleaseInfo::NoRelease
        } else {
            ReleaseInfo::InvalidCredentials
        })
    }
}
