//! Shared core types used across configuration, providers and deployment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Git hosting provider a repository is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GitHub,
    GitLab,
    Bitbucket,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::GitHub,
        ProviderKind::GitLab,
        ProviderKind::Bitbucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
            ProviderKind::Bitbucket => "bitbucket",
        }
    }

    /// Only GitHub exposes a "latest release" lookup.
    pub fn supports_releases(&self) -> bool {
        matches!(self, ProviderKind::GitHub)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            "bitbucket" => Ok(ProviderKind::Bitbucket),
            other => anyhow::bail!(
                "Unsupported provider '{}'. Supported values are: github, gitlab, bitbucket",
                other
            ),
        }
    }
}
