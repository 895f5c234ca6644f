use serde::Deserialize;

use crate::config::ProviderSettings;

use super::signature::verify_github;
use super::{
    EventKind, HeaderSource, PayloadError, Repository, WebhookError, WebhookEvent, json_body,
    invalid_headers, require_headers, typed,
};

const SUPPORTED_EVENTS: [&str; 3] = ["push", "release", "create"];

#[derive(Debug, Deserialize)]
struct RefPayload {
    repository: Repository,
    #[serde(rename = "ref")]
    git_ref: String,
}

#[derive(Debug, Deserialize)]
struct ReleasePayload {
    repository: Repository,
    release: Release,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

#[derive(Debug, Deserialize)]
struct PingPayload {
    repository: Repository,
    hook: Hook,
}

#[derive(Debug, Deserialize)]
struct Hook {
    #[serde(default)]
    events: Vec<String>,
    config: HookConfig,
}

#[derive(Debug, Deserialize)]
struct HookConfig {
    #[serde(default)]
    content_type: Option<String>,
}

pub fn parse(
    settings: &ProviderSettings,
    headers: &dyn HeaderSource,
    body: &[u8],
) -> Result<WebhookEvent, WebhookError> {
    let json = json_body(body)?;

    require_headers(headers, &["X-GitHub-Delivery", "X-GitHub-Event"])?;
    let hookshot = headers
        .header("User-Agent")
        .is_some_and(|agent| agent.contains("GitHub-Hookshot"));
    if !hookshot {
        return Err(invalid_headers(headers).into());
    }

    verify_github(
        settings.secret.as_deref(),
        headers.header("X-Hub-Signature"),
        body,
    )?;

    let event = headers.header("X-GitHub-Event").unwrap_or_default();
    match event {
        "push" => {
            let payload: RefPayload = typed(json)?;
            let kind = match payload.git_ref.strip_prefix("refs/heads/") {
                Some(branch) => EventKind::Push {
                    branch: branch.to_string(),
                },
                None => EventKind::Ignored {
                    reason: "No branch push detected, ignore push event".to_string(),
                },
            };
            Ok(WebhookEvent {
                repo_name: payload.repository.name,
                kind,
            })
        }
        "release" => {
            let payload: ReleasePayload = typed(json)?;
            Ok(WebhookEvent {
                repo_name: payload.repository.name,
                kind: EventKind::Release {
                    tag: payload.release.tag_name,
                },
            })
        }
        "create" if json.get("ref_type").and_then(|v| v.as_str()) == Some("tag") => {
            let payload: RefPayload = typed(json)?;
            Ok(WebhookEvent {
                repo_name: payload.repository.name,
                kind: EventKind::TagCreate {
                    tag: payload.git_ref,
                },
            })
        }
        "ping" => {
            let payload: PingPayload = typed(json)?;
            let unsupported_events = payload
                .hook
                .events
                .into_iter()
                .filter(|e| !SUPPORTED_EVENTS.contains(&e.as_str()))
                .collect();
            Ok(WebhookEvent {
                repo_name: payload.repository.name,
                kind: EventKind::Ping {
                    unsupported_events,
                    content_type_ok: payload.hook.config.content_type.as_deref() == Some("json"),
                },
            })
        }
        other => {
            tracing::error!("Received an unsupported GitHub Event: {}", other);
            Err(PayloadError::UnsupportedEvent("Received an unsupported GitHub Event".into()).into())
        }
    }
}
