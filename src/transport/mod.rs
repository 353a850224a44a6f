// src/transport/mod.rs

//! Remote command-execution transport.
//!
//! The controller talks to a [`Transport`] instead of an SSH client directly,
//! so tests can swap in a fake that records connects, commands and closes.
//!
//! - [`ssh`] is the production implementation on top of `russh`.
//! - [`scope`] wraps an open [`Connection`] so it is closed on every exit path.
//! - [`target`] turns resolved secrets into a [`ConnectTarget`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::Result;
use crate::secrets::Secret;
use crate::types::ExecutionResult;

pub mod scope;
pub mod ssh;
pub mod target;

pub use scope::ConnectionScope;
pub use ssh::SshTransport;
pub use target::resolve_target;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How to authenticate against the remote host.
#[derive(Clone, Debug)]
pub enum Credential {
    Password(Secret),
    /// PEM/OpenSSH encoded private key, optionally encrypted.
    PrivateKey {
        key: Secret,
        passphrase: Option<Secret>,
    },
}

impl Credential {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::PrivateKey { .. } => "private-key",
        }
    }
}

/// Everything needed to open one connection.
#[derive(Clone)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
    pub connect_timeout: Duration,
    /// Expected SHA-256 host key fingerprint; `None` accepts any key.
    pub host_fingerprint: Option<String>,
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("host", &"[REDACTED]")
            .field("port", &self.port)
            .field("username", &"[REDACTED]")
            .field("credential", &self.credential.kind())
            .field("connect_timeout", &self.connect_timeout)
            .field("pinned", &self.host_fingerprint.is_some())
            .finish()
    }
}

/// Opens connections to a single host.
pub trait Transport: Send + Sync {
    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>>>;
}

/// An open, authenticated command channel.
pub trait Connection: Send {
    /// Run one command to completion and capture its output.
    fn execute<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<ExecutionResult>>;

    /// Tear the connection down. Must be safe to call on a broken connection.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}
