// src/engine/mod.rs

//! Deploy orchestration engine.
//!
//! This module ties together:
//! - trigger events and branch matching
//! - the job state machine and the single in-flight slot
//! - the trigger controller that runs one job per accepted event
//! - the listen runtime that feeds a stream of events to the controller
//!
//! The pure state machine lives in [`state`]; everything async is in
//! [`controller`] and [`runtime`].

use serde::Deserialize;

use crate::errors::{DeployError, Result};

pub mod branch;
pub mod controller;
pub mod report;
pub mod runtime;
pub mod slot;
pub mod state;

pub use branch::BranchMatcher;
pub use controller::{DeploymentJob, TriggerController};
pub use report::JobReport;
pub use runtime::{Runtime, RuntimeStats};
pub use slot::{DeploySlot, JobGuard};
pub use state::JobState;

const HEADS_PREFIX: &str = "refs/heads/";

/// A push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub branch: String,
    pub git_ref: String,
}

impl TriggerEvent {
    pub fn new(branch: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            git_ref: git_ref.into(),
        }
    }

    /// A push to `branch`, with the matching `refs/heads/<branch>` ref.
    pub fn for_branch(branch: &str) -> Self {
        Self::new(branch, format!("{HEADS_PREFIX}{branch}"))
    }

    /// Derive the branch from a full git ref. Non-branch refs (tags, pull
    /// requests) keep the whole ref as "branch" and so never match a branch
    /// pattern like `main`.
    pub fn from_ref(git_ref: &str) -> Self {
        let branch = git_ref.strip_prefix(HEADS_PREFIX).unwrap_or(git_ref);
        Self::new(branch, git_ref)
    }

    /// Parse a JSON event: `{"branch": "...", "ref": "..."}` with either key
    /// optional, or a CI push payload that carries `ref`.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawTriggerEvent = serde_json::from_str(text)?;
        Self::try_from(raw)
    }
}

#[derive(Debug, Deserialize)]
struct RawTriggerEvent {
    #[serde(default)]
    branch: Option<String>,
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
}

impl TryFrom<RawTriggerEvent> for TriggerEvent {
    type Error = DeployError;

    fn try_from(raw: RawTriggerEvent) -> std::result::Result<Self, Self::Error> {
        match (raw.branch, raw.git_ref) {
            (Some(branch), Some(git_ref)) => Ok(TriggerEvent::new(branch, git_ref)),
            (Some(branch), None) => Ok(TriggerEvent::for_branch(&branch)),
            (None, Some(git_ref)) => Ok(TriggerEvent::from_ref(&git_ref)),
            (None, None) => Err(DeployError::ConfigError(
                "trigger event needs a `branch` or `ref` field".to_string(),
            )),
        }
    }
}

/// What the controller did with one trigger event.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// The branch did not match; nothing was touched.
    Skipped { branch: String },
    /// The script ran to completion.
    Deployed(JobReport),
}

/// Events flowing into the listen runtime.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Triggered(TriggerEvent),
    /// Graceful shutdown requested (Ctrl-C or end of input).
    ShutdownRequested,
}
