//! Normalized deploy requests.

/// Tag sentinel: the newest tag by commit date.
pub const LATEST_TAG: &str = "latest";
/// Tag sentinel: the latest published release.
pub const LATEST_RELEASE: &str = "latestRelease";

/// Provider event that caused a webhook deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookTrigger {
    Push,
    TagCreate,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Webhook(WebhookTrigger),
}

impl Trigger {
    pub fn is_webhook(&self) -> bool {
        matches!(self, Trigger::Webhook(_))
    }

    pub fn is_release_event(&self) -> bool {
        matches!(self, Trigger::Webhook(WebhookTrigger::Release))
    }
}

/// Operator overrides. Only accepted on manual deploys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverrideFlags {
    /// Deploy even if the branch is disabled by config or marker file
    pub force: bool,
    /// Deploy a release-only branch without (or with an older) release
    pub ignore_release: bool,
    /// Keep a requested tag that is not the newest one
    pub ignore_tag_date: bool,
    /// Deploy a tag-only branch without a tag
    pub ignore_tag: bool,
}

impl OverrideFlags {
    pub fn any(&self) -> bool {
        self.force || self.ignore_release || self.ignore_tag_date || self.ignore_tag
    }
}

/// One deploy of one `(repo, branch)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub repo_name: String,
    pub branch_name: String,
    /// Requested tag, may be [`LATEST_TAG`] or [`LATEST_RELEASE`]
    pub tag: Option<String>,
    pub trigger: Trigger,
    pub flags: OverrideFlags,
    /// Passed to the lifecycle script as its second argument
    pub request_host: String,
}

impl DeployRequest {
    pub fn manual(repo_name: impl Into<String>, branch_name: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.into(),
            branch_name: branch_name.into(),
            tag: None,
            trigger: Trigger::Manual,
            flags: OverrideFlags::default(),
            request_host: String::new(),
        }
    }

    pub fn webhook(
        repo_name: impl Into<String>,
        branch_name: impl Into<String>,
        event: WebhookTrigger,
    ) -> Self {
        Self {
            trigger: Trigger::Webhook(event),
            ..Self::manual(repo_name, branch_name)
        }
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag.filter(|t| !t.is_empty());
        self
    }

    pub fn with_flags(mut self, flags: OverrideFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.request_host = host.into();
        self
    }
}
