//! Deploy target resolution: working-copy path, pull branch and clone URL.

use std::path::{Component, Path, PathBuf};

use crate::config::ProviderSettings;

/// Names that would place the working copy outside the deploy root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("Repository name must not be empty")]
    EmptyRepoName,

    #[error("Branch name must not be empty")]
    EmptyBranchName,

    #[error("Invalid deploy directory '{0}': absolute paths and '..' are not allowed")]
    UnsafePath(String),
}

/// Where and what to deploy for one `(repo, branch)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub repo_name: String,
    /// Branch as requested, may be a virtual `.Name` branch
    pub branch_name: String,
    /// Branch fetched from the remote
    pub pull_branch: String,
    pub repo_path: PathBuf,
    pub git_url: String,
}

impl DeployTarget {
    /// Resolve the target below `settings.deploy_path`.
    ///
    /// `master` deploys into `<root>/<repo>`, every other branch into
    /// `<root>/<repo>-<branch>`. Virtual branches (leading `.`) pull
    /// `master` but keep their own directory, e.g. `<root>/<repo>-.Releases`.
    pub fn resolve(
        settings: &ProviderSettings,
        repo_name: &str,
        branch_name: &str,
    ) -> Result<Self, TargetError> {
        if repo_name.is_empty() {
            return Err(TargetError::EmptyRepoName);
        }
        if branch_name.is_empty() {
            return Err(TargetError::EmptyBranchName);
        }

        let dir_name = if branch_name == "master" {
            repo_name.to_string()
        } else {
            format!("{}-{}", repo_name, branch_name)
        };
        ensure_contained(&dir_name)?;

        let pull_branch = if is_virtual_branch(branch_name) {
            "master".to_string()
        } else {
            branch_name.to_string()
        };

        Ok(Self {
            repo_name: repo_name.to_string(),
            branch_name: branch_name.to_string(),
            pull_branch,
            repo_path: settings.deploy_path.join(dir_name),
            git_url: format!("{}{}.git", settings.base_url, repo_name),
        })
    }

    pub fn is_virtual(&self) -> bool {
        is_virtual_branch(&self.branch_name)
    }

    /// Marker files that switch off unforced deploys of this target.
    pub fn disabled_markers(&self) -> [PathBuf; 2] {
        [
            self.repo_path.join("disabled"),
            self.repo_path.join(format!("disabled-{}", self.branch_name)),
        ]
    }

    pub fn is_disabled_by_file(&self) -> bool {
        self.disabled_markers().iter().any(|marker| marker.exists())
    }
}

pub fn is_virtual_branch(branch_name: &str) -> bool {
    branch_name.starts_with('.')
}

fn ensure_contained(dir_name: &str) -> Result<(), TargetError> {
    let path = Path::new(dir_name);
    if dir_name.contains('\0') || path.is_absolute() {
        return Err(TargetError::UnsafePath(dir_name.to_string()));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(TargetError::UnsafePath(dir_name.to_string())),
        }
    }
    Ok(())
}
