//! Latest-release lookup, resolved at most once per inbound request.

mod github;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::ProviderSettings;

pub use github::GitHubReleases;

/// Outcome of a latest-release lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseInfo {
    Published(String),
    /// Credentials work, but the repository has no published release
    NoRelease,
    InvalidCredentials,
}

/// Provider API able to report the latest published release.
///
/// `Err` is reserved for transient failures (transport errors, 5xx) and is
/// retried by [`ReleaseState::resolve`].
#[async_trait]
pub trait ReleaseLookup: Send + Sync {
    async fn latest_release(
        &self,
        settings: &ProviderSettings,
        repo_name: &str,
    ) -> anyhow::Result<ReleaseInfo>;
}

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff, capped at [`RETRY_MAX_DELAY`].
fn retry_delay(attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| RETRY_BASE_DELAY.checked_mul(factor))
        .map_or(RETRY_MAX_DELAY, |delay| delay.min(RETRY_MAX_DELAY))
}

/// Per-request release cache.
///
/// Shared by all runs of one fan-out so the provider is asked only once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseState {
    info: Option<ReleaseInfo>,
}

impl ReleaseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.info.is_some()
    }

    pub fn latest_tag(&self) -> Option<&str> {
        match &self.info {
            Some(ReleaseInfo::Published(tag)) => Some(tag),
            _ => None,
        }
    }

    pub fn invalid_credentials(&self) -> bool {
        matches!(self.info, Some(ReleaseInfo::InvalidCredentials))
    }

    pub fn is_latest(&self, tag: &str) -> bool {
        self.latest_tag() == Some(tag)
    }

    /// Look the latest release up unless already done or unsupported.
    ///
    /// Transient failures are retried `retries` times with exponential
    /// backoff; when they persist the release is treated as unknown.
    pub async fn resolve(
        &mut self,
        lookup: &dyn ReleaseLookup,
        settings: &ProviderSettings,
        repo_name: &str,
        retries: u32,
    ) {
        if self.is_resolved() || !settings.supports_releases() {
            return;
        }

        let mut attempt = 0;
        let info = loop {
            match lookup.latest_release(settings, repo_name).await {
                Ok(info) => break info,
                Err(e) if attempt < retries => {
                    let delay = retry_delay(attempt);
                    tracing::warn!(
                        "Release lookup for '{}' failed (attempt {}), retrying in {:?}: {:#}",
                        repo_name,
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("Release lookup for '{}' failed: {:#}", repo_name, e);
                    break ReleaseInfo::NoRelease;
                }
            }
        };

        match &info {
            ReleaseInfo::Published(tag) => tracing::debug!("Latest release tag is '{}'", tag),
            ReleaseInfo::NoRelease => tracing::warn!("No Release found!"),
            ReleaseInfo::InvalidCredentials => tracing::error!(
                "Can't get latest release. Invalid login credentials in configuration found!"
            ),
        }
        self.info = Some(info);
    }
}
