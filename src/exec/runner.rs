// src/exec/runner.rs

//! Sequential script runner.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::errors::{DeployError, Result};
use crate::exec::step::{Script, next_workdir, remote_command};
use crate::transport::Connection;
use crate::types::{ExecutionResult, FailurePolicy};

/// Runs a [`Script`] over an open connection, one step at a time.
///
/// - Steps run strictly in declared order; step `i + 1` is never issued
///   before step `i` has finished.
/// - A non-zero exit from an `abort` step stops the script with
///   [`DeployError::Command`]; later steps are never sent.
/// - A non-zero exit from a `continue` step is logged and skipped over.
/// - Nothing is retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self, conn: &mut dyn Connection, script: &Script) -> Result<ExecutionResult> {
        let started = Instant::now();
        let mut aggregate = ExecutionResult::default();
        let mut workdir: Option<String> = None;
        let total = script.len();

        for (index, step) in script.steps().iter().enumerate() {
            let command = remote_command(workdir.as_deref(), &step.command);
            info!(step = index, of = total, cmd = %step.command, "running step");

            let result = conn.execute(&command).await.map_err(|err| {
                warn!(step = index, error = %err, "transport failed while running step");
                err
            })?;

            debug!(
                step = index,
                exit_code = result.exit_code,
                duration_ms = result.duration_ms(),
                stdout_bytes = result.stdout.len(),
                stderr_bytes = result.stderr.len(),
                "step finished"
            );

            aggregate.stdout.extend_from_slice(&result.stdout);
            aggregate.stderr.extend_from_slice(&result.stderr);

            if !result.success() {
                match step.on_failure {
                    FailurePolicy::Abort => {
                        warn!(
                            step = index,
                            cmd = %step.command,
                            exit_code = result.exit_code,
                            "step failed; aborting script"
                        );
                        return Err(DeployError::Command {
                            step: index,
                            command: step.command.clone(),
                            result,
                        });
                    }
                    FailurePolicy::Continue => {
                        warn!(
                            step = index,
                            cmd = %step.command,
                            exit_code = result.exit_code,
                            "step failed; continuing (on_failure = continue)"
                        );
                        continue;
                    }
                }
            }

            if let Some(target) = step.chdir_target() {
                let next = next_workdir(workdir.as_deref(), target);
                debug!(workdir = %next, "working directory for later steps");
                workdir = Some(next);
            }
        }

        aggregate.exit_code = 0;
        aggregate.duration = started.elapsed();
        info!(
            steps = total,
            duration_ms = aggregate.duration_ms(),
            "script completed"
        );
        Ok(aggregate)
    }
}
