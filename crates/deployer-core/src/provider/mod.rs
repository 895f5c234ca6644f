//! Provider webhook adapters.
//!
//! Each adapter checks the request headers and authenticity, then turns the
//! provider-specific payload into a [`WebhookEvent`].

pub mod bitbucket;
pub mod github;
pub mod gitlab;
pub mod signature;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::config::ProviderSettings;
use crate::types::ProviderKind;

pub use signature::SignatureError;

/// Normalized provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub repo_name: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Push { branch: String },
    TagCreate { tag: String },
    Release { tag: String },
    /// Hook configuration check sent when a webhook is created
    Ping {
        unsupported_events: Vec<String>,
        content_type_ok: bool,
    },
    /// Valid request that needs no deploy
    Ignored { reason: String },
}

/// Malformed or unsupported webhook requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("No json data in request! Expected a request with an application/json body.")]
    NotJson,

    #[error("Invalid Request")]
    InvalidHeaders,

    #[error("Malformed webhook payload: {0}")]
    Malformed(String),

    #[error("{0}")]
    UnsupportedEvent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("No configuration for {0} webhooks")]
    Unconfigured(ProviderKind),
}

impl WebhookError {
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::Signature(_) => 401,
            WebhookError::Payload(PayloadError::UnsupportedEvent(_)) => 405,
            WebhookError::Payload(_) | WebhookError::Unconfigured(_) => 400,
        }
    }
}

/// Case-insensitive header access, implemented by the HTTP layer.
pub trait HeaderSource: Sync {
    fn header(&self, name: &str) -> Option<&str>;

    /// All headers, for diagnostics.
    fn pairs(&self) -> Vec<(String, String)>;
}

impl HeaderSource for BTreeMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn pairs(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Parse a webhook request for `settings.kind`.
pub fn parse_webhook(
    settings: &ProviderSettings,
    headers: &dyn HeaderSource,
    body: &[u8],
) -> Result<WebhookEvent, WebhookError> {
    let result = match settings.kind {
        ProviderKind::GitHub => github::parse(settings, headers, body),
        ProviderKind::GitLab => gitlab::parse(settings, headers, body),
        ProviderKind::Bitbucket => bitbucket::parse(headers, body),
    };
    if let Err(e) = &result {
        tracing::error!("Rejected {} webhook: {}", settings.kind, e);
    }
    result
}

/// Body as a JSON object. Anything else is [`PayloadError::NotJson`].
fn json_body(body: &[u8]) -> Result<serde_json::Value, PayloadError> {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) if value.as_object().is_some_and(|o| !o.is_empty()) => Ok(value),
        _ => Err(PayloadError::NotJson),
    }
}

fn typed<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, PayloadError> {
    serde_json::from_value(value).map_err(|e| PayloadError::Malformed(e.to_string()))
}

fn require_headers(headers: &dyn HeaderSource, names: &[&str]) -> Result<(), PayloadError> {
    if names.iter().all(|name| headers.header(name).is_some()) {
        Ok(())
    } else {
        Err(invalid_headers(headers))
    }
}

fn invalid_headers(headers: &dyn HeaderSource) -> PayloadError {
    let listing: Vec<String> = headers
        .pairs()
        .into_iter()
        .map(|(k, v)| format!("    \"{}\": \"{}\"", k, v))
        .collect();
    tracing::error!("Unsupported Header combination:\n{}", listing.join("\n"));
    PayloadError::InvalidHeaders
}

#[derive(Debug, serde::Deserialize)]
struct Repository {
    name: String,
}

#[cfg(test)]
pub(crate) fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
