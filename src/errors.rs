// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

use crate::engine::JobState;
use crate::types::ExecutionResult;

/// Why a connection attempt failed before authentication.
///
/// Kept separate from [`DeployError::Authentication`] so callers can tell a
/// network problem (maybe transient) from a bad credential (never transient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The host answered but refused the TCP connection.
    Refused,
    /// Name resolution or routing failed.
    Unreachable,
    /// No answer within the connect timeout.
    TimedOut,
    /// TCP worked but the SSH handshake did not (incl. host key mismatch).
    Handshake,
}

impl std::fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectFailure::Refused => "connection refused",
            ConnectFailure::Unreachable => "host unreachable",
            ConnectFailure::TimedOut => "connect timed out",
            ConnectFailure::Handshake => "handshake failed",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Missing secret(s): {}", .0.join(", "))]
    MissingSecret(Vec<String>),

    /// Host and user come from secrets and stay out of the message.
    #[error("Connection to the deploy host on port {port} failed ({kind}): {message}")]
    Connection {
        port: u16,
        kind: ConnectFailure,
        message: String,
    },

    #[error("Authentication with the configured {credential} was rejected")]
    Authentication { credential: &'static str },

    #[error("Step {step} (`{command}`) failed with exit code {}", .result.exit_code)]
    Command {
        step: usize,
        command: String,
        result: ExecutionResult,
    },

    #[error("Deployment timed out after {0:?}")]
    Timeout(Duration),

    #[error("A deployment is already in progress")]
    DeployInProgress,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid job state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeployError {
    /// Process exit code reported to the invoking CI job.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::Command { .. } => 1,
            DeployError::MissingSecret(_)
            | DeployError::ConfigError(_)
            | DeployError::TomlError(_)
            | DeployError::JsonError(_) => 2,
            DeployError::Connection { .. } | DeployError::Authentication { .. } => 3,
            DeployError::Timeout(_) => 4,
            DeployError::DeployInProgress => 5,
            DeployError::InvalidTransition { .. }
            | DeployError::IoError(_)
            | DeployError::Other(_) => 1,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DeployError>;
