//! Per-branch deploy policy: whitelist/blacklist gating and branch modes.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::config::RepoConfig;
use crate::types::ProviderKind;

/// Branch name pattern from `whitelisted_branches`/`blacklisted_branches`.
///
/// Patterns are regular expressions anchored at the start of the branch
/// name only, so `feat` also matches `feature-x`.
#[derive(Clone)]
pub struct BranchPattern {
    source: String,
    regex: Regex,
}

impl BranchPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, branch: &str) -> bool {
        self.regex.is_match(branch)
    }
}

impl fmt::Debug for BranchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BranchPattern").field(&self.source).finish()
    }
}

impl PartialEq for BranchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for BranchPattern {}

impl<'de> Deserialize<'de> for BranchPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        BranchPattern::new(&source).map_err(|e| {
            serde::de::Error::custom(format!("invalid branch pattern '{}': {}", source, e))
        })
    }
}

/// Value of `releases_only` / `tags_only`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BranchMode {
    /// A bare boolean only ever applies to `master`.
    Uniform(bool),
    /// Per-branch switch, absent entries are `false`.
    PerBranch(BTreeMap<String, bool>),
}

impl BranchMode {
    pub fn applies_to(&self, branch_name: &str) -> bool {
        match self {
            BranchMode::Uniform(enabled) => *enabled && branch_name == "master",
            BranchMode::PerBranch(branches) => branches.get(branch_name).copied().unwrap_or(false),
        }
    }

    /// `false` and `{}` count as not configured at all.
    pub fn is_configured(&self) -> bool {
        match self {
            BranchMode::Uniform(enabled) => *enabled,
            BranchMode::PerBranch(branches) => !branches.is_empty(),
        }
    }

    /// Branches this mode is switched on for, in name order.
    pub fn enabled_branches(&self) -> Vec<String> {
        match self {
            BranchMode::Uniform(true) => vec!["master".to_string()],
            BranchMode::Uniform(false) => Vec::new(),
            BranchMode::PerBranch(branches) => branches
                .iter()
                .filter(|(_, enabled)| **enabled)
                .map(|(name, _)| name.clone())
                .collect(),
        }
    }
}

/// Why automatic deployment is switched off for a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NotWhitelisted,
    Blacklisted,
}

/// Result of evaluating a [`RepoPolicy`] for one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyDecision {
    pub stop: Option<StopReason>,
    pub release_only: bool,
    pub tags_only: bool,
}

impl PolicyDecision {
    pub fn is_stopped(&self) -> bool {
        self.stop.is_some()
    }
}

/// Effective deploy policy of one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoPolicy {
    pub repo_name: String,
    pub whitelist: Vec<BranchPattern>,
    pub blacklist: Vec<BranchPattern>,
    pub releases_only: Option<BranchMode>,
    pub tags_only: Option<BranchMode>,
    pub provider: Option<ProviderKind>,
}

impl RepoPolicy {
    /// Policy of a repository without a `[repos.*]` entry: everything deploys.
    pub fn unrestricted(repo_name: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.into(),
            ..Default::default()
        }
    }

    pub fn from_config(repo_name: &str, config: Option<&RepoConfig>) -> Self {
        match config {
            Some(config) => Self {
                repo_name: repo_name.to_string(),
                whitelist: config.whitelisted_branches.clone(),
                blacklist: config.blacklisted_branches.clone(),
                releases_only: config.releases_only.clone(),
                tags_only: config.tags_only.clone(),
                provider: config.api,
            },
            None => Self::unrestricted(repo_name),
        }
    }

    /// Evaluate the policy. Lists are matched against `pull_branch`, modes
    /// are looked up by `branch_name`.
    pub fn evaluate(&self, branch_name: &str, pull_branch: &str) -> PolicyDecision {
        let stop = if !self.whitelist.is_empty()
            && !self.whitelist.iter().any(|p| p.matches(pull_branch))
        {
            tracing::info!("'{}' not on whitelist!", pull_branch);
            Some(StopReason::NotWhitelisted)
        } else if self.blacklist.iter().any(|p| p.matches(pull_branch)) {
            tracing::info!("'{}' is on blacklist!", pull_branch);
            Some(StopReason::Blacklisted)
        } else {
            None
        };

        let release_only = self
            .releases_only
            .as_ref()
            .is_some_and(|mode| mode.applies_to(branch_name));
        let tags_only = self
            .tags_only
            .as_ref()
            .is_some_and(|mode| mode.applies_to(branch_name));

        if release_only {
            tracing::info!("'{}' is in releaseOnly mode!", branch_name);
        }
        if tags_only {
            tracing::info!("'{}' is in tagsOnly mode!", branch_name);
        }

        PolicyDecision {
            stop,
            release_only,
            tags_only,
        }
    }
}
