//! Deployer Core Library
//!
//! Decides per repository and branch whether, and exactly what, should be
//! deployed after a webhook notification or a manual request, then drives
//! the git working copy and the lifecycle scripts of the deploy target.

pub mod config;
pub mod context;
pub mod deploy;
pub mod git;
pub mod provider;
pub mod release;
pub mod transcript;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, DeployerConfig, ProviderSettings, RepoConfig};

    // Deployment
    pub use crate::deploy::{
        BranchMode, DeployOutcome, DeployRequest, DeployStatus, DeployTarget, Deployer,
        OverrideFlags, RepoPolicy, Trigger,
    };

    // Providers
    pub use crate::provider::{EventKind, WebhookEvent};

    // Releases
    pub use crate::release::{GitHubReleases, ReleaseInfo, ReleaseLookup};

    // Shared
    pub use crate::context::AppContext;
    pub use crate::transcript::Transcript;
    pub use crate::types::ProviderKind;
}
