//! Event routing and fan-out of tag/release events to branches.

use crate::config::{DeployerConfig, ProviderSettings};
use crate::provider::{EventKind, WebhookEvent};
use crate::release::ReleaseState;

use super::orchestrator::Deployer;
use super::outcome::{DeployOutcome, DeployStatus};
use super::request::{DeployRequest, OverrideFlags, WebhookTrigger};

/// Repository an event belongs to, the host it was received on and the
/// query overrides sent along with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTarget<'a> {
    pub repo_name: &'a str,
    pub host: &'a str,
    /// Rejected by every deploy the event starts
    pub flags: OverrideFlags,
}

/// Repository-wide event that is replayed once per enabled branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FanoutKind {
    Tag,
    Release,
}

impl FanoutKind {
    fn event_name(&self) -> &'static str {
        match self {
            FanoutKind::Tag => "tag",
            FanoutKind::Release => "release",
        }
    }

    fn mode_name(&self) -> &'static str {
        match self {
            FanoutKind::Tag => "tagsOnly",
            FanoutKind::Release => "releaseOnly",
        }
    }

    fn trigger(&self) -> WebhookTrigger {
        match self {
            FanoutKind::Tag => WebhookTrigger::TagCreate,
            FanoutKind::Release => WebhookTrigger::Release,
        }
    }
}

impl Deployer {
    /// Deploy a normalized webhook event. `host` is handed to the lifecycle
    /// scripts; `flags` are the request's query overrides.
    pub async fn handle_event(
        &self,
        config: &DeployerConfig,
        settings: &ProviderSettings,
        event: &WebhookEvent,
        host: &str,
        flags: OverrideFlags,
    ) -> DeployOutcome {
        let target = EventTarget {
            repo_name: &event.repo_name,
            host,
            flags,
        };
        match &event.kind {
            EventKind::Push { branch } => {
                let request = DeployRequest::webhook(&event.repo_name, branch, WebhookTrigger::Push)
                    .with_flags(flags)
                    .with_host(host);
                self.deploy(config, settings, &request, &mut ReleaseState::new())
                    .await
            }
            EventKind::TagCreate { tag } => {
                self.dispatch_tag_event(config, settings, target, tag).await
            }
            EventKind::Release { tag } => {
                self.dispatch_release_event(config, settings, target, tag)
                    .await
            }
            EventKind::Ping {
                unsupported_events,
                content_type_ok,
            } => ping_outcome(unsupported_events, *content_type_ok),
            EventKind::Ignored { reason } => {
                tracing::debug!("{}", reason);
                DeployOutcome::new(DeployStatus::Skipped, reason.clone())
            }
        }
    }

    /// Deploy a created tag to every `tags_only` branch of the repository.
    pub async fn dispatch_tag_event(
        &self,
        config: &DeployerConfig,
        settings: &ProviderSettings,
        target: EventTarget<'_>,
        tag: &str,
    ) -> DeployOutcome {
        self.fan_out(config, settings, target, tag, FanoutKind::Tag)
            .await
    }

    /// Deploy a published release to every `releases_only` branch.
    pub async fn dispatch_release_event(
        &self,
        config: &DeployerConfig,
        settings: &ProviderSettings,
        target: EventTarget<'_>,
        tag: &str,
    ) -> DeployOutcome {
        self.fan_out(config, settings, target, tag, FanoutKind::Release)
            .await
    }

    async fn fan_out(
        &self,
        config: &DeployerConfig,
        settings: &ProviderSettings,
        target: EventTarget<'_>,
        tag: &str,
        kind: FanoutKind,
    ) -> DeployOutcome {
        let repo_name = target.repo_name;
        let mode = config
            .repo(repo_name)
            .and_then(|repo| match kind {
                FanoutKind::Tag => repo.tags_only.as_ref(),
                FanoutKind::Release => repo.releases_only.as_ref(),
            })
            .filter(|mode| mode.is_configured());
        let Some(mode) = mode else {
            return DeployOutcome::new(
                DeployStatus::Skipped,
                format!(
                    "No {} event configured for repo '{}'!",
                    kind.event_name(),
                    repo_name
                ),
            );
        };

        let branches = mode.enabled_branches();
        if branches.is_empty() {
            return DeployOutcome::new(
                DeployStatus::NothingConfigured,
                format!(
                    "No branch set to {} mode. Ignoring this event.",
                    kind.mode_name()
                ),
            );
        }

        tracing::info!(
            "Deploying {} '{}' of '{}' to {}",
            kind.event_name(),
            tag,
            repo_name,
            branches.join(", ")
        );

        // One lookup for all branches of this event.
        let mut release = ReleaseState::new();
        let mut status = DeployStatus::Success;
        let mut body = String::new();

        for branch in branches {
            let request = DeployRequest::webhook(repo_name, &branch, kind.trigger())
                .with_tag(Some(tag.to_string()))
                .with_flags(target.flags)
                .with_host(target.host);
            let outcome = self.deploy(config, settings, &request, &mut release).await;

            body.push_str(&format!(
                "Start to deploy {} to '{}'...\n=============================\n{}\nFinished with status code: {}\n\n\n",
                kind.event_name(),
                branch,
                outcome.body,
                outcome.status_code()
            ));
            status = status.max(outcome.status);
        }

        DeployOutcome::new(status, body)
    }
}

fn ping_outcome(unsupported_events: &[String], content_type_ok: bool) -> DeployOutcome {
    let mut problems = String::new();
    if !unsupported_events.is_empty() {
        problems.push_str(&format!(
            "[-] Unsupported webhook events configured: {}\n",
            unsupported_events.join(", ")
        ));
    }
    if !content_type_ok {
        problems.push_str(
            "[-] Unsupported content type. Expected application/json content type in configuration.",
        );
    }

    if problems.is_empty() {
        DeployOutcome::new(DeployStatus::Success, "Everything looks good!")
    } else {
        DeployOutcome::new(DeployStatus::BadRequest, problems)
    }
}
