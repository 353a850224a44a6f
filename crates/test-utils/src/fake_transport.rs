use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pushdeploy::errors::{ConnectFailure, DeployError, Result};
use pushdeploy::transport::{BoxFuture, ConnectTarget, Connection, Transport};
use pushdeploy::types::ExecutionResult;
use tokio::sync::Semaphore;

/// What `connect` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Succeed,
    Refuse,
    RejectAuth,
    /// Never completes; only a timeout gets the caller out.
    Hang,
}

/// Shared record of everything the fake saw.
#[derive(Debug, Default)]
pub struct TransportLog {
    inner: Mutex<LogInner>,
}

#[derive(Debug, Default)]
struct LogInner {
    connect_attempts: usize,
    connects: usize,
    closes: usize,
    commands: Vec<String>,
    targets: Vec<(String, u16, String, &'static str)>,
}

impl TransportLog {
    /// Every call to `connect`, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.inner.lock().unwrap().connect_attempts
    }

    /// Connections actually handed out.
    pub fn connects(&self) -> usize {
        self.inner.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    /// Commands in the order they were issued, as sent to the remote shell.
    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().unwrap().commands.clone()
    }

    /// `(host, port, user, credential kind)` per connect attempt.
    pub fn targets(&self) -> Vec<(String, u16, String, &'static str)> {
        self.inner.lock().unwrap().targets.clone()
    }
}

/// Lets a test hold commands until it is ready.
///
/// Each command takes one permit before it runs; a closed gate has none.
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    pub fn closed() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let `n` more commands through.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    /// Let everything through from now on.
    pub fn open(&self) {
        self.permits.add_permits(1 << 20);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Debug, Default, Clone)]
struct CommandPlan {
    /// nth command (0-based, across the connection) → canned result.
    results: HashMap<usize, ExecutionResult>,
    hang_at: Option<usize>,
    delay: Duration,
    gate: Option<Gate>,
}

/// In-memory transport.
///
/// By default every connect succeeds and every command exits 0 echoing the
/// command on stdout.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    log: Arc<TransportLog>,
    connect: ConnectBehavior,
    plan: CommandPlan,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            log: Arc::new(TransportLog::default()),
            connect: ConnectBehavior::Succeed,
            plan: CommandPlan::default(),
        }
    }

    pub fn log(&self) -> Arc<TransportLog> {
        Arc::clone(&self.log)
    }

    pub fn connect_behavior(mut self, behavior: ConnectBehavior) -> Self {
        self.connect = behavior;
        self
    }

    /// The `index`-th command exits with `exit_code` and the given stderr.
    pub fn fail_at(mut self, index: usize, exit_code: i32, stderr: &str) -> Self {
        self.plan.results.insert(
            index,
            ExecutionResult {
                exit_code,
                stdout: Vec::new(),
                stderr: stderr.as_bytes().to_vec(),
                duration: Duration::from_millis(1),
            },
        );
        self
    }

    /// The `index`-th command succeeds with this stdout.
    pub fn stdout_at(mut self, index: usize, stdout: &str) -> Self {
        self.plan.results.insert(
            index,
            ExecutionResult {
                exit_code: 0,
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
                duration: Duration::from_millis(1),
            },
        );
        self
    }

    /// The `index`-th command never finishes.
    pub fn hang_at(mut self, index: usize) -> Self {
        self.plan.hang_at = Some(index);
        self
    }

    /// Every command takes this long.
    pub fn command_delay(mut self, delay: Duration) -> Self {
        self.plan.delay = delay;
        self
    }

    /// Commands wait for the gate before running.
    pub fn gated(mut self, gate: Gate) -> Self {
        self.plan.gate = Some(gate);
        self
    }
}

impl Transport for FakeTransport {
    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>>> {
        Box::pin(async move {
            {
                let mut log = self.log.inner.lock().unwrap();
                log.connect_attempts += 1;
                log.targets.push((
                    target.host.clone(),
                    target.port,
                    target.username.clone(),
                    target.credential.kind(),
                ));
            }

            match self.connect {
                ConnectBehavior::Succeed => {}
                ConnectBehavior::Refuse => {
                    return Err(DeployError::Connection {
                        port: target.port,
                        kind: ConnectFailure::Refused,
                        message: "connection refused (fake)".to_string(),
                    });
                }
                ConnectBehavior::RejectAuth => {
                    return Err(DeployError::Authentication {
                        credential: target.credential.kind(),
                    });
                }
                ConnectBehavior::Hang => std::future::pending::<()>().await,
            }

            self.log.inner.lock().unwrap().connects += 1;
            Ok(Box::new(FakeConnection {
                log: Arc::clone(&self.log),
                plan: self.plan.clone(),
                issued: 0,
                closed: false,
            }) as Box<dyn Connection>)
        })
    }
}

/// Connection handed out by [`FakeTransport`].
#[derive(Debug)]
pub struct FakeConnection {
    log: Arc<TransportLog>,
    plan: CommandPlan,
    issued: usize,
    closed: bool,
}

impl Connection for FakeConnection {
    fn execute<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<ExecutionResult>> {
        Box::pin(async move {
            if self.closed {
                return Err(DeployError::Other(anyhow::anyhow!(
                    "execute on closed fake connection"
                )));
            }

            let index = self.issued;
            self.issued += 1;
            self.log.inner.lock().unwrap().commands.push(command.to_string());

            if let Some(gate) = &self.plan.gate {
                gate.pass().await;
            }
            if self.plan.hang_at == Some(index) {
                std::future::pending::<()>().await;
            }
            if !self.plan.delay.is_zero() {
                tokio::time::sleep(self.plan.delay).await;
            }

            Ok(self
                .plan
                .results
                .get(&index)
                .cloned()
                .unwrap_or_else(|| ExecutionResult {
                    exit_code: 0,
                    stdout: format!("{command}\n").into_bytes(),
                    stderr: Vec::new(),
                    duration: Duration::from_millis(1),
                }))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.closed {
                self.closed = true;
                self.log.inner.lock().unwrap().closes += 1;
            }
            Ok(())
        })
    }
}
