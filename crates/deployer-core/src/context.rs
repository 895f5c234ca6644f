//! Application context shared by the HTTP server and the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConfigStore, DeployerConfig};
use crate::deploy::{DeployOutcome, DeployRequest, DeployStatus, Deployer, OverrideFlags};
use crate::git::CommandRunner;
use crate::provider::{self, HeaderSource, WebhookError};
use crate::release::{GitHubReleases, ReleaseLookup, ReleaseState};
use crate::transcript::Transcript;
use crate::types::ProviderKind;

/// Everything a request handler needs.
///
/// Cloning is cheap; clones share the configuration store and the
/// per-target locks.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: Arc<ConfigStore>,
    deployer: Deployer,
}

impl AppContext {
    pub fn new(config: ConfigStore, releases: Arc<dyn ReleaseLookup>) -> Self {
        Self {
            config: Arc::new(config),
            deployer: Deployer::new(releases),
        }
    }

    /// Load the configuration file and use the GitHub releases API.
    pub fn load(config_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let store = ConfigStore::load(config_path)?;
        Ok(Self::new(store, Arc::new(GitHubReleases::new()?)))
    }

    /// Default configuration path: `<config dir>/deployer/deployer.toml`.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("deployer").join("deployer.toml"))
    }

    /// Current configuration, reloaded if the file changed.
    pub fn config(&self) -> Arc<DeployerConfig> {
        self.config.current()
    }

    /// Authenticate, parse and deploy one provider webhook.
    ///
    /// Override `flags` are not allowed on webhooks: any deploy the event
    /// starts is answered with `BadRequest`.
    pub async fn handle_webhook(
        &self,
        kind: ProviderKind,
        headers: &dyn HeaderSource,
        body: &[u8],
        flags: OverrideFlags,
    ) -> Result<DeployOutcome, WebhookError> {
        let config = self.config();
        let settings = config
            .provider(kind)
            .ok_or(WebhookError::Unconfigured(kind))?;
        let event = provider::parse_webhook(&settings, headers, body)?;
        tracing::info!("Received {} webhook for '{}'", kind, event.repo_name);

        let host = headers.header("Host").unwrap_or_default();
        Ok(self
            .deployer
            .handle_event(&config, &settings, &event, host, flags)
            .await)
    }

    /// Run a manual deploy against the repository's provider, falling back
    /// to `default_api`.
    pub async fn manual_deploy(&self, request: &DeployRequest) -> DeployOutcome {
        let config = self.config();
        let Some(kind) = config.api_for(&request.repo_name) else {
            tracing::warn!("No API specified for '{}'", request.repo_name);
            return DeployOutcome::new(DeployStatus::BadRequest, "No API specified, can't continue");
        };
        let Some(settings) = config.provider(kind) else {
            return DeployOutcome::new(
                DeployStatus::BadRequest,
                format!("API '{}' is not configured, can't continue", kind),
            );
        };

        self.deployer
            .deploy(&config, &settings, request, &mut ReleaseState::new())
            .await
    }

    /// Diagnostics about the git installation and the request.
    pub async fn system_info(&self, headers: &dyn HeaderSource) -> String {
        let runner = CommandRunner::new(self.config().server.command_timeout());
        let cwd = std::env::temp_dir();
        let mut transcript = Transcript::new();

        let commands: [(&str, &[&str]); 4] = [
            ("which", &["git"]),
            ("git", &["--version"]),
            ("whoami", &[]),
            ("git", &["config", "--global", "-l"]),
        ];
        for (program, args) in commands {
            let result = runner.run(Path::new(program), args, &cwd).await;
            let label = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            transcript.step(label, result.output, result.failed);
        }

        let mut pairs = headers.pairs();
        pairs.sort();
        let listing: Vec<String> = pairs
            .iter()
            .map(|(name, value)| format!("       \"{}\": \"{}\"", name, value))
            .collect();
        transcript.note(format!(
            "[+] Request-Headers:\n    {{\n{}\n    }}",
            listing.join("\n")
        ));

        transcript.render()
    }
}
