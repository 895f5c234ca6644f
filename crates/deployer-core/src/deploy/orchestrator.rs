//! The deploy pipeline: gate checks, git sync, tag resolution, lifecycle script.

use std::fmt;
use std::sync::Arc;

use crate::config::{DeployerConfig, ProviderSettings};
use crate::git::{CommandRunner, GitSync};
use crate::release::{ReleaseLookup, ReleaseState};
use crate::transcript::Transcript;

use super::history::{TagContext, resolve_tag};
use super::locks::TargetLocks;
use super::outcome::{DeployOutcome, DeployStatus};
use super::policy::{RepoPolicy, StopReason};
use super::request::{DeployRequest, LATEST_RELEASE};
use super::scripts::{Lifecycle, ScriptRunner};
use super::target::DeployTarget;

/// Runs deploy requests.
///
/// Holds nothing request-specific: configuration and the release cache are
/// passed into every call. Clones share the per-target locks.
#[derive(Clone)]
pub struct Deployer {
    releases: Arc<dyn ReleaseLookup>,
    locks: TargetLocks,
}

impl fmt::Debug for Deployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployer")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl Deployer {
    pub fn new(releases: Arc<dyn ReleaseLookup>) -> Self {
        Self {
            releases,
            locks: TargetLocks::new(),
        }
    }

    /// Run one deploy to completion or early rejection. Never fails: every
    /// path yields an outcome.
    pub async fn deploy(
        &self,
        config: &DeployerConfig,
        settings: &ProviderSettings,
        request: &DeployRequest,
        release: &mut ReleaseState,
    ) -> DeployOutcome {
        let outcome = self.run(config, settings, request, release).await;

        if outcome.status.is_failure() {
            if request.trigger.is_webhook() {
                tracing::error!("{}", outcome.body.trim());
            } else {
                tracing::warn!("{}", outcome.body.trim());
            }
        } else {
            tracing::debug!("{}", outcome.body.trim());
        }
        outcome
    }

    async fn run(
        &self,
        config: &DeployerConfig,
        settings: &ProviderSettings,
        request: &DeployRequest,
        release: &mut ReleaseState,
    ) -> DeployOutcome {
        let webhook = request.trigger.is_webhook();
        let flags = request.flags;

        tracing::debug!(
            "starting git operations for {}@{}...",
            request.branch_name,
            request.repo_name
        );

        if webhook && flags.any() {
            return DeployOutcome::new(
                DeployStatus::BadRequest,
                "Query parameters to overwrite certain behaviours are not supported when using webhooks!",
            );
        }

        let target = match DeployTarget::resolve(settings, &request.repo_name, &request.branch_name)
        {
            Ok(target) => target,
            Err(e) => return DeployOutcome::new(DeployStatus::BadRequest, e.to_string()),
        };
        let branch = target.branch_name.as_str();

        let policy = RepoPolicy::from_config(&request.repo_name, config.repo(&request.repo_name));
        let decision = policy.evaluate(&target.branch_name, &target.pull_branch);
        let mut release_only = decision.release_only;
        let tags_only = decision.tags_only;

        let _guard = self.locks.acquire(&target.repo_path).await;
        let mut transcript = Transcript::new();

        // Disabled by config or marker file
        let disabled_by_file = target.is_disabled_by_file();
        if decision.is_stopped() || disabled_by_file {
            let source = match decision.stop {
                Some(StopReason::NotWhitelisted | StopReason::Blacklisted) => "in config",
                None => "per file",
            };
            if !flags.force {
                return DeployOutcome::new(
                    DeployStatus::PolicyRejected,
                    format!(
                        "Auto deployment for branch ('{}') {} disabled, add query param 'force=1' to deploy anyway.",
                        branch, source
                    ),
                );
            }
            transcript.note(format!(
                "[!] Auto deployment for branch ('{}') {} disabled, ignoring this and deploy anyway...",
                branch, source
            ));
        }

        if release_only && !settings.supports_releases() {
            return DeployOutcome::new(
                DeployStatus::BadRequest,
                format!(
                    "Release Only branches are not supported for {} API!",
                    settings.kind
                ),
            );
        }

        let wants_latest_release = !webhook && request.tag.as_deref() == Some(LATEST_RELEASE);
        if release_only || wants_latest_release {
            release
                .resolve(
                    self.releases.as_ref(),
                    settings,
                    &request.repo_name,
                    config.server.release_lookup_retries,
                )
                .await;
        }
        if wants_latest_release {
            release_only = true;
        }

        // Tag required on release-only and tag-only branches
        if (release_only || tags_only) && request.tag.is_none() && !webhook {
            if release_only && !flags.ignore_release {
                return DeployOutcome::new(
                    DeployStatus::BadRequest,
                    tag_required_message(branch, "releaseOnly", "ignoreRelease"),
                );
            } else if tags_only && !flags.ignore_tag {
                return DeployOutcome::new(
                    DeployStatus::BadRequest,
                    tag_required_message(branch, "tagsOnly", "ignoreTag"),
                );
            }
            let kind = if release_only { "releases" } else { "tags" };
            transcript.note(format!(
                "[!] Auto deployment for branch ('{}') only enabled for {}. Ignoring this and deploy anyway...",
                branch, kind
            ));
        }

        let latest_release_known = release.latest_tag().is_some();
        if release_only && !latest_release_known && !webhook {
            if let Some(tag) = &request.tag {
                if !flags.ignore_release {
                    let reason = if release.invalid_credentials() {
                        format!(
                            "But latest release version is unknown, because of invalid login credentials in the configuration!\n\
                             To deploy to tag '{}', add query parameter 'ignoreRelease=1' to the URL.",
                            tag
                        )
                    } else {
                        format!(
                            "But there is no published release available yet.\n\
                             To deploy to tag '{}' anyway, add query parameter 'ignoreRelease=1' to the URL.",
                            tag
                        )
                    };
                    return DeployOutcome::new(
                        DeployStatus::BadRequest,
                        format!(
                            "This branch '{}' has releaseOnly mode enabled.\n{}",
                            branch, reason
                        ),
                    );
                }
                transcript.note(format!(
                    "[!] Auto deployment for branch ('{}') only enabled for releases. Ignoring this and deploy anyway...",
                    branch
                ));
            }
        } else if release_only && !latest_release_known && request.trigger.is_release_event() {
            return if release.invalid_credentials() {
                DeployOutcome::new(
                    DeployStatus::ReleaseUnavailable,
                    format!(
                        "This branch '{}' has releaseOnly mode enabled.\n\
                         Latest release version is unknown, because of invalid login credentials in the configuration.\n\
                         Stop doing anything. Get the configuration right to allow Deployer to fetch the latest release tag.",
                        branch
                    ),
                )
            } else {
                DeployOutcome::new(
                    DeployStatus::BadRequest,
                    format!(
                        "This branch '{}' has releaseOnly mode enabled.\n\
                         No (latest) release currently available/published!\n\
                         Stop doing anything.",
                        branch
                    ),
                )
            };
        } else if tags_only && request.tag.is_none() && webhook {
            return DeployOutcome::new(
                DeployStatus::Skipped,
                format!(
                    "This branch '{}' has tagOnly mode enabled.\n\
                     Current event is not a tag create event.\nAborting...",
                    branch
                ),
            );
        } else if release_only && webhook && !request.trigger.is_release_event() {
            return DeployOutcome::new(
                DeployStatus::Skipped,
                format!(
                    "This branch '{}' has releaseOnly mode enabled.\n\
                     Current event is not a release event.\nAborting...",
                    branch
                ),
            );
        }

        // Sync
        let runner = CommandRunner::new(config.server.command_timeout());
        let git = GitSync::new(runner);
        let sync = git.sync(&target, &mut transcript).await;
        let mut failure = sync.failed.then_some(DeployStatus::GitFailure);

        // Tag history
        let mut tag = request.tag.clone();
        if let Some(requested) = request.tag.as_deref()
            && target.repo_path.exists()
        {
            let (tags, list_failed) = git.list_tags(&target.repo_path, &mut transcript).await;
            if list_failed {
                failure.get_or_insert(DeployStatus::GitFailure);
            }
            let ctx = TagContext {
                branch_name: branch,
                webhook,
                release_only,
                flags,
                latest_release: release.latest_tag(),
            };
            tag = resolve_tag(&ctx, requested, &tags, &mut transcript);
        }

        // Checkout
        if let Some(tag) = &tag {
            if target.repo_path.exists() {
                if git.checkout(&target.repo_path, tag, &mut transcript).await {
                    failure.get_or_insert(DeployStatus::GitFailure);
                }
            } else {
                transcript.note("[!] skip checkout version, deployment path doesn't exist. Check logs!");
            }
        }

        // Lifecycle script
        if failure.is_none() {
            let lifecycle = if sync.first_setup {
                Lifecycle::Setup
            } else {
                Lifecycle::Reload
            };
            let scripts = ScriptRunner::new(CommandRunner::new(config.server.script_timeout()));
            if scripts
                .run(lifecycle, &target, &request.request_host, &mut transcript)
                .await
            {
                failure = Some(DeployStatus::ScriptFailure);
            }
        } else {
            transcript.note("[!] Skip reload or setup script (deploying failed)");
        }

        match failure {
            Some(status) => DeployOutcome::new(status, transcript.into_failure_body()),
            None => DeployOutcome::new(DeployStatus::Success, transcript.into_success_body()),
        }
    }
}

fn tag_required_message(branch: &str, mode: &str, ignore_flag: &str) -> String {
    format!(
        "This branch '{}' has {} mode enabled.\n\
         But there is no tag specified in the request. Set tag to... \n\
         ... a tag name at your repo to deploy the tag,\n\
         ...'latestRelease' to deploy the latest release,\n\
         ...'latest' to deploy the latest tag.\n\n\
         You can also add query param '{}=1' to URL to deploy to latest push.",
        branch, mode, ignore_flag
    )
}
