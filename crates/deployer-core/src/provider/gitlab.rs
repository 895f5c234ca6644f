use serde::Deserialize;

use crate::config::ProviderSettings;

use super::signature::verify_token;
use super::{
    EventKind, HeaderSource, PayloadError, Repository, WebhookError, WebhookEvent, json_body,
    require_headers, typed,
};

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(default)]
    object_kind: Option<String>,
    #[serde(rename = "ref")]
    git_ref: String,
    repository: Repository,
}

pub fn parse(
    settings: &ProviderSettings,
    headers: &dyn HeaderSource,
    body: &[u8],
) -> Result<WebhookEvent, WebhookError> {
    let json = json_body(body)?;
    require_headers(headers, &["X-Gitlab-Event"])?;
    verify_token(
        settings.secret.as_deref(),
        "X-Gitlab-Token",
        headers.header("X-Gitlab-Token"),
    )?;

    let event = headers.header("X-Gitlab-Event").unwrap_or_default();
    let payload: Option<PushPayload> = match event {
        "Push Hook" | "Tag Push Hook" => Some(typed(json)?),
        _ => None,
    };

    let (repo_name, kind) = match (event, payload) {
        ("Push Hook", Some(payload)) => {
            let kind = match payload.git_ref.strip_prefix("refs/heads/") {
                Some(branch) => EventKind::Push {
                    branch: branch.to_string(),
                },
                None => EventKind::Ignored {
                    reason: "No branch push detected, ignore push event".to_string(),
                },
            };
            (payload.repository.name, kind)
        }
        ("Tag Push Hook", Some(payload)) if payload.object_kind.as_deref() == Some("tag_push") => {
            let kind = match payload.git_ref.strip_prefix("refs/tags/") {
                Some(tag) => EventKind::TagCreate {
                    tag: tag.to_string(),
                },
                None => EventKind::Ignored {
                    reason: "No tag push detected, ignore push event".to_string(),
                },
            };
            (payload.repository.name, kind)
        }
        _ => {
            tracing::error!("Received an unsupported Gitlab Event: {}", event);
            return Err(
                PayloadError::UnsupportedEvent("Received an unsupported Gitlab Event".into())
                    .into(),
            );
        }
    };

    Ok(WebhookEvent { repo_name, kind })
}
