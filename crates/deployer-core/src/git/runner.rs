//! Bounded external command execution.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Environment overrides that would redirect git away from the working copy.
const GIT_ENV_OVERRIDES: [&str; 4] = ["GIT_DIR", "GIT_WORK_TREE", "GIT_INDEX_FILE", "GIT_COMMON_DIR"];

/// Captured result of one command. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// stdout followed by stderr, lossily decoded
    pub output: String,
    pub failed: bool,
}

impl CommandOutput {
    fn failure(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            failed: true,
        }
    }
}

/// Runs git commands and lifecycle scripts with a timeout.
///
/// A child that outlives the timeout is killed and reported as failed.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `git <args>` inside `cwd`.
    pub async fn git(&self, args: &[&str], cwd: &Path) -> CommandOutput {
        let mut cmd = Command::new("git");
        cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
        for var in GIT_ENV_OVERRIDES {
            cmd.env_remove(var);
        }
        self.execute(cmd, format!("git {}", args.join(" ")), cwd)
            .await
    }

    /// Run an arbitrary program inside `cwd`.
    pub async fn run<S: AsRef<OsStr>>(&self, program: &Path, args: &[S], cwd: &Path) -> CommandOutput {
        let mut cmd = Command::new(program);
        cmd.args(args);
        self.execute(cmd, program.display().to_string(), cwd).await
    }

    async fn execute(&self, mut cmd: Command, display: String, cwd: &Path) -> CommandOutput {
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                CommandOutput {
                    output: text,
                    failed: !output.status.success(),
                }
            }
            Ok(Err(e)) => CommandOutput::failure(format!("Failed to run {}: {}", display, e)),
            Err(_) => CommandOutput::failure(format!(
                "Timed out after {} seconds, process killed",
                self.timeout.as_secs()
            )),
        };

        if result.failed {
            let command = &display;
            tracing::warn!(
                "\"{}\" crashed with output:\n    {}",
                command,
                result.output.trim().replace('\n', "\n    ")
            );
        }
        result
    }
}
