//! Deploy outcome classification.

use std::fmt;

/// Final classification of a deploy, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeployStatus {
    Success,
    /// Soft abort, the event had nothing to deploy
    Skipped,
    /// Disabled by configuration or marker file
    PolicyRejected,
    BadRequest,
    /// A release/tag event with no branch enabled for it
    NothingConfigured,
    /// Latest release unknown because of invalid credentials
    ReleaseUnavailable,
    GitFailure,
    ScriptFailure,
}

impl DeployStatus {
    pub fn status_code(&self) -> u16 {
        match self {
            DeployStatus::Success | DeployStatus::Skipped | DeployStatus::PolicyRejected => 200,
            DeployStatus::BadRequest => 400,
            DeployStatus::NothingConfigured
            | DeployStatus::ReleaseUnavailable
            | DeployStatus::GitFailure
            | DeployStatus::ScriptFailure => 500,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status_code() >= 400
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployStatus::Success => "success",
            DeployStatus::Skipped => "skipped",
            DeployStatus::PolicyRejected => "policy rejected",
            DeployStatus::BadRequest => "bad request",
            DeployStatus::NothingConfigured => "nothing configured",
            DeployStatus::ReleaseUnavailable => "release unavailable",
            DeployStatus::GitFailure => "git failure",
            DeployStatus::ScriptFailure => "script failure",
        };
        f.write_str(s)
    }
}

/// Rendered transcript plus classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub status: DeployStatus,
    pub body: String,
}

impl DeployOutcome {
    pub fn new(status: DeployStatus, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status.status_code()
    }
}
