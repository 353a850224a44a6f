// src/engine/state.rs

//! Job lifecycle state machine.
//!
//! Pure and synchronous; the async side only calls [`JobState::advance`]
//! and broadcasts the result.

use std::fmt;

use crate::errors::{DeployError, Result};

/// Where the (single) deployment job currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobState {
    #[default]
    Idle,
    Resolving,
    Connecting,
    Running,
    Reporting,
    Failed,
}

impl JobState {
    /// Whether a job holds the deploy slot in this state.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            JobState::Resolving | JobState::Connecting | JobState::Running | JobState::Reporting
        )
    }

    /// Validate and perform a transition.
    ///
    /// ```text
    /// Idle | Failed -> Resolving -> Connecting -> Running -> Reporting -> Idle
    /// Resolving | Connecting | Running | Reporting -> Failed
    /// ```
    pub fn advance(self, next: JobState) -> Result<JobState> {
        use JobState::*;

        let allowed = match (self, next) {
            (Idle | Failed, Resolving) => true,
            (Resolving, Connecting) => true,
            (Connecting, Running) => true,
            (Running, Reporting) => true,
            (Reporting, Idle) => true,
            (from, Failed) => from.is_in_flight(),
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(DeployError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Resolving => "resolving",
            JobState::Connecting => "connecting",
            JobState::Running => "running",
            JobState::Reporting => "reporting",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}
