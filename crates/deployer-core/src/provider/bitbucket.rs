use serde::Deserialize;

use super::{
    EventKind, HeaderSource, PayloadError, Repository, WebhookError, WebhookEvent, json_body,
    require_headers, typed,
};

#[derive(Debug, Deserialize)]
struct PushPayload {
    repository: Repository,
    #[serde(default)]
    push: Option<Push>,
    /// Older payloads carry the new ref at the top level.
    #[serde(default)]
    new: Option<RefState>,
}

#[derive(Debug, Deserialize)]
struct Push {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    /// `null` when the ref was deleted
    #[serde(default)]
    new: Option<RefState>,
}

#[derive(Debug, Deserialize)]
struct RefState {
    #[serde(rename = "type")]
    kind: String,
    name: String,
}

impl PushPayload {
    fn new_ref(self) -> Option<RefState> {
        self.push
            .and_then(|push| push.changes.into_iter().find_map(|change| change.new))
            .or(self.new)
    }
}

/// Bitbucket webhooks carry no signature.
pub fn parse(headers: &dyn HeaderSource, body: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let json = json_body(body)?;
    require_headers(headers, &["X-Event-Key", "X-Request-UUID", "X-Hook-UUID"])?;

    let event = headers.header("X-Event-Key").unwrap_or_default();
    if event != "repo:push" {
        tracing::error!("Received an unsupported Bitbucket Event: {}", event);
        return Err(
            PayloadError::UnsupportedEvent("Received an unsupported Bitbucket Event".into())
                .into(),
        );
    }

    let payload: PushPayload = typed(json)?;
    let repo_name = payload.repository.name.clone();
    let Some(new_ref) = payload.new_ref() else {
        return Ok(WebhookEvent {
            repo_name,
            kind: EventKind::Ignored {
                reason: "No branch or tag push detected, ignore push event".to_string(),
            },
        });
    };

    let kind = match new_ref.kind.as_str() {
        "branch" => EventKind::Push {
            branch: new_ref.name,
        },
        "tag" => EventKind::TagCreate { tag: new_ref.name },
        other => {
            tracing::error!("Received unknown bitbucket push type: {}", other);
            return Err(PayloadError::UnsupportedEvent(format!(
                "Received an unsupported bitbucket push type: {}",
                other
            ))
            .into());
        }
    };
    Ok(WebhookEvent { repo_name, kind })
}
