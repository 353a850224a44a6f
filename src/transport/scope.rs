// src/transport/scope.rs

//! Scoped connection ownership.

use tracing::{debug, warn};

use super::{BoxFuture, ConnectTarget, Connection, Transport};
use crate::errors::{DeployError, Result};
use crate::types::ExecutionResult;

/// Owns an open connection for the duration of one job.
///
/// Call [`ConnectionScope::close`] on the normal path. If the scope is dropped
/// while still open (the job future was cancelled by a timeout, or a panic
/// unwound through it), the connection is closed on a spawned task instead.
/// Either way `Connection::close` runs exactly once.
pub struct ConnectionScope {
    conn: Option<Box<dyn Connection>>,
    port: u16,
}

impl ConnectionScope {
    pub async fn open(transport: &dyn Transport, target: &ConnectTarget) -> Result<Self> {
        let conn = transport.connect(target).await?;
        debug!(port = target.port, "connection scope opened");
        Ok(Self {
            conn: Some(conn),
            port: target.port,
        })
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Close the connection now. Later calls are no-ops.
    pub async fn close(mut self) -> Result<()> {
        self.close_inner().await
    }

    async fn close_inner(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(mut conn) => {
                debug!(port = self.port, "closing connection");
                conn.close().await
            }
            None => Ok(()),
        }
    }
}

impl Connection for ConnectionScope {
    fn execute<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<ExecutionResult>> {
        Box::pin(async move {
            match self.conn.as_mut() {
                Some(conn) => conn.execute(command).await,
                None => Err(DeployError::Other(anyhow::anyhow!(
                    "connection on port {} already closed",
                    self.port
                ))),
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.close_inner())
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        let port = self.port;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(port, "connection scope dropped while open; closing in background");
                handle.spawn(async move {
                    if let Err(e) = conn.close().await {
                        warn!(port, error = %e, "background close failed");
                    }
                });
            }
            Err(_) => {
                warn!(port, "connection scope dropped outside a runtime; connection not closed cleanly");
            }
        }
    }
}
