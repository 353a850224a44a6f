// src/transport/ssh.rs

//! SSH transport built on `russh`.
//!
//! One TCP/SSH session per job; one exec channel per command. Output is
//! collected from `Data` (stdout) and `ExtendedData` with `ext == 1` (stderr)
//! messages until the channel closes.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use tracing::{debug, info, warn};

use super::{BoxFuture, ConnectTarget, Connection, Credential, Transport};
use crate::errors::{ConnectFailure, DeployError, Result};
use crate::types::ExecutionResult;

/// Exit code reported when the remote side never sent an exit status
/// (killed by a signal, or the channel dropped).
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Production transport.
#[derive(Debug, Clone, Default)]
pub struct SshTransport;

impl SshTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for SshTransport {
    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>>> {
        Box::pin(async move {
            let conn = SshConnection::open(target).await?;
            Ok(Box::new(conn) as Box<dyn Connection>)
        })
    }
}

/// Host-key policy for the client session.
struct HostKeyCheck {
    expected: Option<String>,
}

#[async_trait]
impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let actual = server_public_key.fingerprint();
        match &self.expected {
            Some(expected) if *expected == actual => {
                debug!("host key matches pinned fingerprint");
                Ok(true)
            }
            Some(expected) => {
                warn!(
                    expected = %expected,
                    actual = %actual,
                    "host key fingerprint mismatch; refusing connection"
                );
                Ok(false)
            }
            None => {
                debug!(fingerprint = %actual, "accepting unpinned host key");
                Ok(true)
            }
        }
    }
}

pub struct SshConnection {
    handle: client::Handle<HostKeyCheck>,
    port: u16,
}

impl SshConnection {
    async fn open(target: &ConnectTarget) -> Result<Self> {
        let config = Arc::new(client::Config::default());
        let handler = HostKeyCheck {
            expected: target.host_fingerprint.clone(),
        };

        info!(
            port = target.port,
            credential = target.credential.kind(),
            "connecting"
        );

        let connecting = client::connect(
            config,
            (target.host.as_str(), target.port),
            handler,
        );

        let mut handle = match tokio::time::timeout(target.connect_timeout, connecting).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(connect_error(target, e)),
            Err(_) => {
                return Err(DeployError::Connection {
                    port: target.port,
                    kind: ConnectFailure::TimedOut,
                    message: format!("no answer within {:?}", target.connect_timeout),
                });
            }
        };

        let authenticated = match &target.credential {
            Credential::Password(password) => handle
                .authenticate_password(target.username.clone(), password.expose())
                .await
                .map_err(|e| handshake_error(target, e))?,
            Credential::PrivateKey { key, passphrase } => {
                let pair = russh_keys::decode_secret_key(
                    key.expose(),
                    passphrase.as_ref().map(|p| p.expose()),
                )
                .map_err(|e| {
                    DeployError::ConfigError(format!("unable to decode private key: {e}"))
                })?;
                handle
                    .authenticate_publickey(target.username.clone(), Arc::new(pair))
                    .await
                    .map_err(|e| handshake_error(target, e))?
            }
        };

        if !authenticated {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(DeployError::Authentication {
                credential: target.credential.kind(),
            });
        }

        info!(credential = target.credential.kind(), "authenticated");

        Ok(Self {
            handle,
            port: target.port,
        })
    }

    async fn run(&mut self, command: &str) -> Result<ExecutionResult> {
        let started = Instant::now();
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.channel_error(e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| self.channel_error(e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = Some(exit_status as i32);
                }
                ChannelMsg::ExitSignal { .. } => {
                    debug!("remote command terminated by signal");
                }
                _ => {}
            }
        }

        Ok(ExecutionResult {
            exit_code: exit_code.unwrap_or(UNKNOWN_EXIT_CODE),
            stdout,
            stderr,
            duration: started.elapsed(),
        })
    }

    fn channel_error(&self, e: impl std::fmt::Display) -> DeployError {
        DeployError::Connection {
            port: self.port,
            kind: ConnectFailure::Handshake,
            message: format!("channel error: {e}"),
        }
    }
}

impl Connection for SshConnection {
    fn execute<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<ExecutionResult>> {
        Box::pin(self.run(command))
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.handle
                .disconnect(Disconnect::ByApplication, "deploy finished", "en")
                .await
                .map_err(|e| DeployError::Other(anyhow::anyhow!("disconnect failed: {e}")))
        })
    }
}

fn connect_error(target: &ConnectTarget, err: russh::Error) -> DeployError {
    let kind = match &err {
        russh::Error::IO(io) => classify_io(io.kind()),
        _ => ConnectFailure::Handshake,
    };
    DeployError::Connection {
        port: target.port,
        kind,
        message: err.to_string(),
    }
}

fn handshake_error(target: &ConnectTarget, err: impl std::fmt::Display) -> DeployError {
    DeployError::Connection {
        port: target.port,
        kind: ConnectFailure::Handshake,
        message: err.to_string(),
    }
}

fn classify_io(kind: ErrorKind) -> ConnectFailure {
    match kind {
        ErrorKind::ConnectionRefused => ConnectFailure::Refused,
        ErrorKind::TimedOut => ConnectFailure::TimedOut,
        _ => ConnectFailure::Unreachable,
    }
}
