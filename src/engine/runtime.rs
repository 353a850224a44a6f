// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::controller::TriggerController;
use super::{RuntimeEvent, TriggerEvent, TriggerOutcome};
use crate::errors::{DeployError, Result};
use crate::secrets::SecretSource;
use crate::transport::Transport;

/// What the listen loop did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub deployed: usize,
    pub skipped: usize,
    /// Triggers turned away because a job was already in flight.
    pub rejected: usize,
    pub failed: usize,
}

impl RuntimeStats {
    pub fn total(&self) -> usize {
        self.deployed + self.skipped + self.rejected + self.failed
    }
}

impl fmt::Display for RuntimeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deployed={} skipped={} rejected={} failed={}",
            self.deployed, self.skipped, self.rejected, self.failed
        )
    }
}

/// Feeds a stream of `RuntimeEvent`s to a shared [`TriggerController`].
///
/// Every trigger is spawned as its own task, so a push arriving while a job
/// is running reaches the controller immediately and is rejected there
/// instead of waiting behind the running job.
pub struct Runtime<T, S> {
    controller: Arc<TriggerController<T, S>>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    jobs: JoinSet<Result<TriggerOutcome>>,
    stats: RuntimeStats,
}

impl<T, S> fmt::Debug for Runtime<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("in_flight", &self.jobs.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<T, S> Runtime<T, S>
where
    T: Transport + 'static,
    S: SecretSource + 'static,
{
    pub fn new(
        controller: Arc<TriggerController<T, S>>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Self {
        Self {
            controller,
            event_rx,
            jobs: JoinSet::new(),
            stats: RuntimeStats::default(),
        }
    }

    /// Main event loop.
    ///
    /// Runs until `ShutdownRequested` arrives or every sender is gone, then
    /// waits for jobs still in flight and returns the totals.
    pub async fn run(mut self) -> Result<RuntimeStats> {
        info!("pushdeploy listen runtime started");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(RuntimeEvent::Triggered(trigger)) => self.spawn_job(trigger),
                    Some(RuntimeEvent::ShutdownRequested) => {
                        info!("shutdown requested; no longer accepting triggers");
                        break;
                    }
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
                Some(done) = self.jobs.join_next(), if !self.jobs.is_empty() => {
                    self.record(done);
                }
            }
        }

        if !self.jobs.is_empty() {
            info!(in_flight = self.jobs.len(), "waiting for running jobs");
        }
        while let Some(done) = self.jobs.join_next().await {
            self.record(done);
        }

        info!(stats = %self.stats, "runtime exiting");
        Ok(self.stats)
    }

    fn spawn_job(&mut self, trigger: TriggerEvent) {
        debug!(branch = %trigger.branch, git_ref = %trigger.git_ref, "dispatching trigger");
        let controller = Arc::clone(&self.controller);
        self.jobs
            .spawn(async move { controller.handle(trigger).await });
    }

    fn record(&mut self, done: std::result::Result<Result<TriggerOutcome>, JoinError>) {
        match done {
            Ok(Ok(TriggerOutcome::Deployed(report))) => {
                debug!(job_id = %report.job_id, "job finished");
                self.stats.deployed += 1;
            }
            Ok(Ok(TriggerOutcome::Skipped { .. })) => self.stats.skipped += 1,
            Ok(Err(DeployError::DeployInProgress)) => self.stats.rejected += 1,
            Ok(Err(e)) => {
                debug!(error = %e, exit_code = e.exit_code(), "job failed");
                self.stats.failed += 1;
            }
            Err(e) => {
                error!(error = %e, "deploy task panicked or was cancelled");
                self.stats.failed += 1;
            }
        }
    }
}

/// Read one JSON trigger event per line and forward it to the runtime.
///
/// Blank lines are ignored and malformed lines are logged and skipped. End of
/// input requests shutdown, and so does a read error, which is then returned.
pub async fn forward_events<R>(reader: R, tx: mpsc::Sender<RuntimeEvent>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    let outcome = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("event input closed");
                break Ok(());
            }
            Err(e) => break Err(DeployError::from(e)),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match TriggerEvent::from_json(line) {
            Ok(event) => {
                if tx.send(RuntimeEvent::Triggered(event)).await.is_err() {
                    debug!("runtime gone; stopping event reader");
                    return Ok(());
                }
            }
            Err(e) => warn!(error = %e, "ignoring malformed trigger event"),
        }
    };

    let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_skips_bad_lines_and_ends_with_shutdown() {
        let input: &[u8] = b"{\"ref\":\"refs/heads/main\"}\n\nnot json\n{\"branch\":\"dev\"}\n";
        let (tx, mut rx) = mpsc::channel(8);

        forward_events(input, tx).await.unwrap();

        let mut got = Vec::new();
        while let Some(ev) = rx.recv().await {
            got.push(ev);
        }
        assert_eq!(got.len(), 3);
        assert!(matches!(&got[0], RuntimeEvent::Triggered(e) if e.branch == "main"));
        assert!(matches!(&got[1], RuntimeEvent::Triggered(e) if e.branch == "dev"));
        assert!(matches!(got[2], RuntimeEvent::ShutdownRequested));
    }

    struct BrokenInput;

    impl tokio::io::AsyncRead for BrokenInput {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "input went away",
            )))
        }
    }

    #[tokio::test]
    async fn read_error_still_requests_shutdown() {
        use tokio::io::AsyncReadExt;

        let input: &[u8] = b"{\"ref\":\"refs/heads/main\"}\n";
        let reader = tokio::io::BufReader::new(input.chain(BrokenInput));
        let (tx, mut rx) = mpsc::channel(8);
        // Another sender stays alive, so only an explicit shutdown ends the runtime.
        let _held = tx.clone();

        let err = forward_events(reader, tx).await.unwrap_err();
        assert!(matches!(err, DeployError::IoError(_)));

        assert!(matches!(rx.recv().await, Some(RuntimeEvent::Triggered(e)) if e.branch == "main"));
        assert!(matches!(rx.recv().await, Some(RuntimeEvent::ShutdownRequested)));
    }

    #[test]
    fn stats_display() {
        let stats = RuntimeStats {
            deployed: 1,
            skipped: 2,
            rejected: 3,
            failed: 0,
        };
        assert_eq!(stats.total(), 6);
        assert_eq!(stats.to_string(), "deployed=1 skipped=2 rejected=3 failed=0");
    }
}
