#![allow(dead_code)]

pub mod git;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use deployer_core::config::{DeployerConfig, ProviderSettings, parse_config_str};
use deployer_core::deploy::Deployer;
use deployer_core::release::{ReleaseInfo, ReleaseLookup};
use deployer_core::types::ProviderKind;

pub use self::git::{Remote, git_command, head_commit};

/// Release API double answering with a fixed result.
pub struct StubReleases {
    info: ReleaseInfo,
    calls: AtomicUsize,
}

impl StubReleases {
    pub fn new(info: ReleaseInfo) -> Arc<Self> {
        Arc::new(Self {
            info,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseLookup for StubReleases {
    async fn latest_release(
        &self,
        _settings: &ProviderSettings,
        _repo_name: &str,
    ) -> anyhow::Result<ReleaseInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.info.clone())
    }
}

/// Temporary provider remotes plus deploy root.
pub struct Fixture {
    _temp: TempDir,
    pub remotes: PathBuf,
    pub deploy_root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let remotes = temp.path().join("remotes");
        let deploy_root = temp.path().join("deploy");
        std::fs::create_dir_all(&remotes).unwrap();
        std::fs::create_dir_all(&deploy_root).unwrap();
        Self {
            _temp: temp,
            remotes,
            deploy_root,
        }
    }

    /// Bare remote `<name>.git` with one commit on `master`.
    pub fn remote(&self, name: &str) -> Remote {
        let mut remote = Remote::init(&self.remotes.join(format!("{}.git", name)));
        remote.commit("master", &[("README.md", "# test\n")], "initial commit");
        remote
    }

    /// GitHub-provider configuration pointing at the fixture, plus `extra`
    /// TOML (usually `[repos.*]` tables).
    pub fn config(&self, extra: &str) -> DeployerConfig {
        let toml = format!(
            "[providers.github]\nbase_url = '{}/'\ndeploy_path = '{}'\nusername = 'deployer'\n\n{}",
            self.remotes.display(),
            self.deploy_root.display(),
            extra
        );
        parse_config_str(&toml).unwrap()
    }

    pub fn settings(config: &DeployerConfig) -> ProviderSettings {
        config.provider(ProviderKind::GitHub).unwrap()
    }

    pub fn deployer(releases: Arc<StubReleases>) -> Deployer {
        Deployer::new(releases)
    }

    pub fn path(&self, dir_name: &str) -> PathBuf {
        self.deploy_root.join(dir_name)
    }
}

pub const SETUP_SCRIPT: &str = "#!/bin/sh\necho \"setup $1 $2\"\n";
pub const RELOAD_SCRIPT: &str = "#!/bin/sh\necho \"reload $1 $2\"\n";
