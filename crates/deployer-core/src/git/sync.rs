//! Working-copy synchronization: clone or hard reset to the remote branch.

use std::path::Path;

use crate::deploy::DeployTarget;
use crate::transcript::Transcript;

use super::runner::{CommandOutput, CommandRunner};

/// What a sync did to the working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// The working copy was cloned by this run
    pub first_setup: bool,
    /// At least one git step failed
    pub failed: bool,
}

/// Drives the git side of a deploy and records every step.
#[derive(Debug, Clone)]
pub struct GitSync {
    runner: CommandRunner,
}

impl GitSync {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Clone a fresh working copy, or bring an existing one to
    /// `origin/<pull_branch>`. Every step runs even after a failure.
    pub async fn sync(&self, target: &DeployTarget, transcript: &mut Transcript) -> SyncReport {
        if target.repo_path.exists() {
            self.update(target, transcript).await
        } else {
            self.clone_fresh(target, transcript).await
        }
    }

    async fn clone_fresh(&self, target: &DeployTarget, transcript: &mut Transcript) -> SyncReport {
        if let Err(e) = std::fs::create_dir_all(&target.repo_path) {
            tracing::warn!(
                "Failed to create deploy directory {}: {}",
                target.repo_path.display(),
                e
            );
        }

        let args = [
            "clone",
            "-b",
            target.pull_branch.as_str(),
            target.git_url.as_str(),
            ".",
        ];
        let failed = self.step(&args, &target.repo_path, transcript).await;

        if failed && let Err(e) = std::fs::remove_dir_all(&target.repo_path) {
            tracing::debug!(
                "Could not remove {} after failed clone: {}",
                target.repo_path.display(),
                e
            );
        }

        SyncReport {
            first_setup: true,
            failed,
        }
    }

    async fn update(&self, target: &DeployTarget, transcript: &mut Transcript) -> SyncReport {
        let origin_branch = format!("origin/{}", target.pull_branch);
        let steps: [&[&str]; 5] = [
            &["clean", "-d", "-f"],
            &["reset", "--hard"],
            &["checkout", target.pull_branch.as_str()],
            &["fetch"],
            &["reset", "--hard", origin_branch.as_str()],
        ];

        let mut failed = false;
        for args in steps {
            failed |= self.step(args, &target.repo_path, transcript).await;
        }

        SyncReport {
            first_setup: false,
            failed,
        }
    }

    /// Tags of the working copy, newest commit date first.
    ///
    /// The listing only shows up in the transcript when it fails.
    pub async fn list_tags(&self, repo_path: &Path, transcript: &mut Transcript) -> (Vec<String>, bool) {
        let args = ["tag", "--sort=-committerdate"];
        let result = self.runner.git(&args, repo_path).await;
        if result.failed {
            transcript.step(format!("git {}", args.join(" ")), result.output, true);
            return (Vec::new(), true);
        }

        let tags = result
            .output
            .lines()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        (tags, false)
    }

    pub async fn checkout(&self, repo_path: &Path, tag: &str, transcript: &mut Transcript) -> bool {
        self.step(&["checkout", tag], repo_path, transcript).await
    }

    async fn step(&self, args: &[&str], cwd: &Path, transcript: &mut Transcript) -> bool {
        let CommandOutput { output, failed } = self.runner.git(args, cwd).await;
        transcript.step(format!("git {}", args.join(" ")), output, failed);
        failed
    }
}
