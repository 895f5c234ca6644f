//! Lifecycle scripts shipped inside the deployed repository.

use crate::git::CommandRunner;
use crate::transcript::Transcript;

use super::DeployTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// First deploy into a fresh clone
    Setup,
    /// Every later deploy
    Reload,
}

impl Lifecycle {
    pub fn file_name(&self) -> &'static str {
        match self {
            Lifecycle::Setup => "setup",
            Lifecycle::Reload => "reload",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Lifecycle::Setup => "Setup Script",
            Lifecycle::Reload => "Reload script",
        }
    }
}

/// Invokes `setup`/`reload` with `[branch_name, request_host]`.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    runner: CommandRunner,
}

impl ScriptRunner {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Returns `true` if the script ran and failed. A missing script is
    /// noted in the transcript and is not a failure.
    pub async fn run(
        &self,
        lifecycle: Lifecycle,
        target: &DeployTarget,
        request_host: &str,
        transcript: &mut Transcript,
    ) -> bool {
        let script = target.repo_path.join(lifecycle.file_name());
        if !script.is_file() {
            transcript.note(format!("[!] No {} script found", lifecycle.file_name()));
            return false;
        }

        tracing::info!(
            "Running {} script for {}@{}",
            lifecycle.file_name(),
            target.branch_name,
            target.repo_name
        );
        let result = self
            .runner
            .run(
                &script,
                &[target.branch_name.as_str(), request_host],
                &target.repo_path,
            )
            .await;
        transcript.step(lifecycle.label(), result.output, result.failed);
        result.failed
    }
}
