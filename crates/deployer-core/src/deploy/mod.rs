//! Deploy decisions and execution.
//!
//! A [`DeployRequest`] flows through the [`Deployer`]: policy gates, lazy
//! release lookup, git sync, tag resolution and the lifecycle script. Tag
//! and release events are fanned out to every branch enabled for them.

mod fanout;
mod history;
mod locks;
mod orchestrator;
mod outcome;
mod policy;
mod request;
mod scripts;
mod target;

pub use fanout::EventTarget;
pub use history::{TagContext, resolve_tag};
pub use locks::TargetLocks;
pub use orchestrator::Deployer;
pub use outcome::{DeployOutcome, DeployStatus};
pub use policy::{BranchMode, BranchPattern, PolicyDecision, RepoPolicy, StopReason};
pub use request::{
    DeployRequest, LATEST_RELEASE, LATEST_TAG, OverrideFlags, Trigger, WebhookTrigger,
};
pub use scripts::{Lifecycle, ScriptRunner};
pub use target::{DeployTarget, TargetError, is_virtual_branch};
