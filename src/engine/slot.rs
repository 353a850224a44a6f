// src/engine/slot.rs

//! The single in-flight deployment slot.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tracing::{debug, warn};

use super::state::JobState;
use crate::errors::{DeployError, Result};

/// At most one job holds this at a time.
///
/// Cloning shares the slot. The current [`JobState`] is broadcast on a
/// `watch` channel so observers (tests, the listen runtime) can follow a job
/// without touching it.
#[derive(Debug, Clone)]
pub struct DeploySlot {
    permit: Arc<Semaphore>,
    state: Arc<watch::Sender<JobState>>,
}

impl Default for DeploySlot {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploySlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(JobState::Idle);
        Self {
            permit: Arc::new(Semaphore::new(1)),
            state: Arc::new(tx),
        }
    }

    /// Claim the slot without waiting.
    ///
    /// Fails with [`DeployError::DeployInProgress`] while another job holds it.
    pub fn try_acquire(&self) -> Result<JobGuard> {
        let permit = Arc::clone(&self.permit)
            .try_acquire_owned()
            .map_err(|_| DeployError::DeployInProgress)?;

        let current = *self.state.borrow();
        debug!(state = %current, "deploy slot acquired");

        Ok(JobGuard {
            _permit: permit,
            state: Arc::clone(&self.state),
            current,
            finished: false,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.permit.available_permits() == 0
    }
}

/// Proof of holding the slot.
///
/// Dropping the guard before [`JobGuard::finish`] marks the job `Failed`
/// and releases the slot.
#[derive(Debug)]
pub struct JobGuard {
    _permit: OwnedSemaphorePermit,
    state: Arc<watch::Sender<JobState>>,
    current: JobState,
    finished: bool,
}

impl JobGuard {
    pub fn state(&self) -> JobState {
        self.current
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    pub fn enter(&mut self, next: JobState) -> Result<()> {
        self.current = self.current.advance(next)?;
        self.state.send_replace(self.current);
        debug!(state = %self.current, "job state changed");
        Ok(())
    }

    /// Return to `Idle` and release the slot.
    pub fn finish(mut self) -> Result<()> {
        self.enter(JobState::Idle)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.current.is_in_flight() {
            warn!(state = %self.current, "job ended early; marking failed");
            self.current = JobState::Failed;
            self.state.send_replace(JobState::Failed);
        }
    }
}
