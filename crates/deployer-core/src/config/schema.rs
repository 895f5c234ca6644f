//! Configuration schema for deployer.toml
//!
//! The file carries four kinds of sections:
//! - `[server]`: listener and subprocess limits
//! - `[protection]`: credentials for the manual deploy endpoint
//! - `[providers.*]`: one section per git hosting provider
//! - `[repos.*]`: per-repository branch policy

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::deploy::{BranchMode, BranchPattern};
use crate::types::ProviderKind;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:5000";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Root configuration structure for deployer.toml
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DeployerConfig {
    /// Provider used by repositories without an explicit `api`
    #[serde(default)]
    pub default_api: Option<ProviderKind>,

    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication for manual deploys (optional)
    #[serde(default)]
    pub protection: Option<ProtectionConfig>,

    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Repository policies keyed by repository name
    #[serde(default)]
    pub repos: BTreeMap<String, RepoConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub listen: String,
    /// Upper bound for a single git command
    pub command_timeout_secs: u64,
    /// Upper bound for a setup or reload script
    pub script_timeout_secs: u64,
    /// Extra attempts for transient release lookup failures
    pub release_lookup_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            command_timeout_secs: 600,
            script_timeout_secs: 1800,
            release_lookup_retries: 0,
        }
    }
}

impl ServerConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProtectionConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub cookie: Option<CookieConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CookieConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub path: Option<String>,
    /// Seconds, defaults to one year
    #[serde(default)]
    pub max_age: Option<u64>,
}

/// Default cookie lifetime: one year.
pub const DEFAULT_COOKIE_MAX_AGE: u64 = 31_536_000;

/// Fully configured protection cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub secure: bool,
    pub path: &'a str,
    pub max_age: u64,
}

impl SessionCookie<'_> {
    /// `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        let mut cookie = format!(
            "{}={}; Max-Age={}; Path={}; HttpOnly",
            self.name, self.value, self.max_age, self.path
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

impl ProtectionConfig {
    /// Username and password, when both are set and non-empty.
    pub fn basic_credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((username, password))
    }

    /// Cookie settings, when name and value are set and non-empty.
    pub fn session_cookie(&self) -> Option<SessionCookie<'_>> {
        let cookie = self.cookie.as_ref()?;
        let name = cookie.name.as_deref().filter(|n| !n.is_empty())?;
        let value = cookie.value.as_deref().filter(|v| !v.is_empty())?;
        Some(SessionCookie {
            name,
            value,
            secure: cookie.secure.unwrap_or(false),
            path: cookie.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/"),
            max_age: cookie.max_age.unwrap_or(DEFAULT_COOKIE_MAX_AGE),
        })
    }

    /// Whether any protection method is usable.
    pub fn is_active(&self) -> bool {
        self.basic_credentials().is_some() || self.session_cookie().is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub github: Option<GitHubConfig>,
    #[serde(default)]
    pub gitlab: Option<GitLabConfig>,
    #[serde(default)]
    pub bitbucket: Option<BitbucketConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    /// Clone URL prefix, e.g. "git@github.com:org/"
    pub base_url: String,
    /// Root directory holding all working copies
    pub deploy_path: PathBuf,
    /// Personal access token for the releases API
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Shared secret for `X-Hub-Signature`
    #[serde(default)]
    pub hmac_secret: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitLabConfig {
    pub base_url: String,
    pub deploy_path: PathBuf,
    /// Token compared with `X-Gitlab-Token`
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BitbucketConfig {
    pub base_url: String,
    pub deploy_path: PathBuf,
}

/// Repository policy entry
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Only branches matching one of these patterns deploy automatically
    #[serde(default)]
    pub whitelisted_branches: Vec<BranchPattern>,

    /// Branches matching one of these patterns never deploy automatically
    #[serde(default)]
    pub blacklisted_branches: Vec<BranchPattern>,

    #[serde(default)]
    pub releases_only: Option<BranchMode>,

    #[serde(default)]
    pub tags_only: Option<BranchMode>,

    #[serde(default)]
    pub api: Option<ProviderKind>,
}

/// Typed view over one provider section, consumed by the deploy core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: String,
    pub deploy_path: PathBuf,
    pub access_token: Option<String>,
    pub username: Option<String>,
    /// HMAC secret (GitHub) or plain token (GitLab)
    pub secret: Option<String>,
    pub api_url: String,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind, base_url: impl Into<String>, deploy_path: PathBuf) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            deploy_path,
            access_token: None,
            username: None,
            secret: None,
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn supports_releases(&self) -> bool {
        self.kind.supports_releases()
    }
}

impl DeployerConfig {
    /// Typed settings for a configured provider.
    pub fn provider(&self, kind: ProviderKind) -> Option<ProviderSettings> {
        match kind {
            ProviderKind::GitHub => self.providers.github.as_ref().map(|c| ProviderSettings {
                kind,
                base_url: c.base_url.clone(),
                deploy_path: c.deploy_path.clone(),
                access_token: c.access_token.clone(),
                username: c.username.clone(),
                secret: c.hmac_secret.clone(),
                api_url: c
                    .api_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            }),
            ProviderKind::GitLab => self.providers.gitlab.as_ref().map(|c| ProviderSettings {
                secret: c.secret.clone(),
                ..ProviderSettings::new(kind, c.base_url.clone(), c.deploy_path.clone())
            }),
            ProviderKind::Bitbucket => self
                .providers
                .bitbucket
                .as_ref()
                .map(|c| ProviderSettings::new(kind, c.base_url.clone(), c.deploy_path.clone())),
        }
    }

    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.provider(*kind).is_some())
            .collect()
    }

    pub fn repo(&self, repo_name: &str) -> Option<&RepoConfig> {
        self.repos.get(repo_name)
    }

    /// Provider for manual deploys: the repo's `api`, else `default_api`.
    pub fn api_for(&self, repo_name: &str) -> Option<ProviderKind> {
        self.repo(repo_name)
            .and_then(|repo| repo.api)
            .or(self.default_api)
    }
}
