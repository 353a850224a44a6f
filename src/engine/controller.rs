// src/engine/controller.rs

//! Trigger controller: one trigger event in, at most one deployment out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};

use super::report::{JobReport, render_failure, render_success};
use super::slot::DeploySlot;
use super::state::JobState;
use super::{TriggerEvent, TriggerOutcome};
use crate::config::ConfigFile;
use crate::errors::{DeployError, Result};
use crate::exec::{CommandRunner, Script};
use crate::secrets::{Masker, SecretSource};
use crate::transport::{ConnectTarget, ConnectionScope, Transport, resolve_target};

static JOB_SEQ: AtomicU64 = AtomicU64::new(0);

/// Upper bound on the disconnect handshake after the script is done.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One accepted trigger, bound to its target and script.
///
/// Built once the credentials are resolved and never changed afterwards.
#[derive(Debug, Clone)]
pub struct DeploymentJob {
    pub id: String,
    pub branch: String,
    pub git_ref: String,
    pub target: ConnectTarget,
    pub script: Script,
}

impl DeploymentJob {
    pub fn new(id: String, event: &TriggerEvent, target: ConnectTarget, script: Script) -> Self {
        Self {
            id,
            branch: event.branch.clone(),
            git_ref: event.git_ref.clone(),
            target,
            script,
        }
    }
}

/// Short id for one accepted trigger, unique within the process.
pub fn new_job_id(git_ref: &str, script_fingerprint: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = JOB_SEQ.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(git_ref.as_bytes());
    hasher.update(script_fingerprint.as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..12].to_string()
}

/// Accepts trigger events and runs the deploy script for matching branches.
///
/// Owns the only [`DeploySlot`]; a second event arriving while a job holds it
/// is rejected before any secret is read or connection opened.
pub struct TriggerController<T, S> {
    config: Arc<ConfigFile>,
    secrets: S,
    transport: T,
    runner: CommandRunner,
    slot: DeploySlot,
}

impl<T, S> std::fmt::Debug for TriggerController<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerController")
            .field("branches", &self.config.branches.patterns())
            .field("state", &self.slot.state())
            .finish_non_exhaustive()
    }
}

impl<T, S> TriggerController<T, S>
where
    T: Transport,
    S: SecretSource,
{
    pub fn new(config: Arc<ConfigFile>, secrets: S, transport: T) -> Self {
        Self {
            config,
            secrets,
            transport,
            runner: CommandRunner::new(),
            slot: DeploySlot::new(),
        }
    }

    /// Share an existing slot (e.g. one a test is watching).
    pub fn with_slot(mut self, slot: DeploySlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn slot(&self) -> &DeploySlot {
        &self.slot
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Handle one trigger event end to end.
    pub async fn handle(&self, event: TriggerEvent) -> Result<TriggerOutcome> {
        if !self.config.branches.matches(&event.branch) {
            info!(
                branch = %event.branch,
                patterns = ?self.config.branches.patterns(),
                "branch not configured for deploys; skipping"
            );
            return Ok(TriggerOutcome::Skipped {
                branch: event.branch,
            });
        }

        let mut guard = self.slot.try_acquire().inspect_err(|_| {
            warn!(git_ref = %event.git_ref, "deployment already in progress; rejecting trigger");
        })?;

        let deadline = Instant::now() + self.config.job_timeout;
        let fingerprint = self.config.script.fingerprint();
        let job_id = new_job_id(&event.git_ref, &fingerprint);
        info!(
            job_id = %job_id,
            git_ref = %event.git_ref,
            script = %fingerprint,
            steps = self.config.script.len(),
            "deployment accepted"
        );

        // From here on, an early return drops `guard`, which marks the job
        // failed and frees the slot.
        guard.enter(JobState::Resolving)?;
        let resolved = resolve_target(&self.secrets, &self.config.secrets, &self.config.target)
            .inspect_err(|e| report_failure(&job_id, &event.git_ref, e, &Masker::default()))?;
        let masker = resolved.masker;
        let job = DeploymentJob::new(job_id, &event, resolved.target, self.config.script.clone());

        guard.enter(JobState::Connecting)?;
        let scope = timeout_at(deadline, ConnectionScope::open(&self.transport, &job.target))
            .await
            .unwrap_or_else(|_| Err(DeployError::Timeout(self.config.job_timeout)));
        let mut scope =
            scope.inspect_err(|e| report_failure(&job.id, &job.git_ref, e, &masker))?;

        guard.enter(JobState::Running)?;
        let run = timeout_at(deadline, self.runner.run(&mut scope, &job.script))
            .await
            .unwrap_or_else(|_| Err(DeployError::Timeout(self.config.job_timeout)));

        match tokio::time::timeout(CLOSE_TIMEOUT, scope.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(job_id = %job.id, error = %e, "closing connection failed"),
            Err(_) => warn!(job_id = %job.id, "closing connection timed out"),
        }

        let result = run.inspect_err(|e| report_failure(&job.id, &job.git_ref, e, &masker))?;

        guard.enter(JobState::Reporting)?;
        let report = JobReport {
            job_id: job.id,
            git_ref: job.git_ref,
            script_fingerprint: fingerprint,
            result,
        };
        info!(
            job_id = %report.job_id,
            duration_ms = report.result.duration_ms(),
            "deployment succeeded"
        );
        print!("{}", render_success(&report, &masker));

        guard.finish()?;
        Ok(TriggerOutcome::Deployed(report))
    }
}

fn report_failure(job_id: &str, git_ref: &str, err: &DeployError, masker: &Masker) {
    error!(
        job_id = %job_id,
        git_ref = %git_ref,
        error = %masker.mask(&err.to_string()),
        exit_code = err.exit_code(),
        "deployment failed"
    );
    eprint!("{}", render_failure(job_id, err, masker));
}
