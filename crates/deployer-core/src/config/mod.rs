//! Configuration loading, validation and hot reload.
//!
//! The config file is parsed into typed sections once, validated, and then
//! handed to the deploy core as an immutable snapshot. The store re-reads
//! the file when its content hash changes.

pub mod parser;
pub mod schema;
pub mod store;

use std::path::PathBuf;

use crate::types::ProviderKind;

pub use parser::{parse_config, parse_config_str, validate_config};
pub use schema::{
    BitbucketConfig, CookieConfig, DEFAULT_COOKIE_MAX_AGE, DeployerConfig, GitHubConfig,
    GitLabConfig, ProtectionConfig, ProviderSettings, ProvidersConfig, RepoConfig, ServerConfig,
    SessionCookie,
};
pub use store::ConfigStore;

/// Fatal configuration problems. The server refuses to start on these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Parse(String),

    #[error("You need at least one provider configuration to use Deployer!")]
    NoProvider,

    #[error("'{field}' must not be empty in '{provider}' configuration")]
    EmptyField {
        provider: ProviderKind,
        field: &'static str,
    },

    #[error(
        "Repository '{repo}' uses api '{api}', but there is no [providers.{api}] section"
    )]
    UnconfiguredApi { repo: String, api: ProviderKind },

    #[error("'default_api' is '{0}', but there is no [providers.{0}] section")]
    UnconfiguredDefaultApi(ProviderKind),
}
