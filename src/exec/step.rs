// src/exec/step.rs

//! Ordered deploy script.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::FailurePolicy;

/// Matches a bare `cd <dir>` step (no chaining).
static CD_STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*cd\s+([^\s;&|]+)\s*$").expect("static regex")
});

/// A single remote command and what to do if it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub command: String,
    pub on_failure: FailurePolicy,
}

impl Step {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            on_failure: FailurePolicy::Abort,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Directory this step changes into, if it is a plain `cd <dir>`.
    pub fn chdir_target(&self) -> Option<&str> {
        CD_STEP
            .captures(&self.command)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

/// Ordered list of steps. Order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Build a script of `abort` steps from plain command strings.
    pub fn from_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: commands.into_iter().map(Step::new).collect(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Stable digest of the commands and policies, in order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for step in &self.steps {
            hasher.update(step.command.as_bytes());
            hasher.update(&[0]);
            hasher.update(match step.on_failure {
                FailurePolicy::Abort => b"a",
                FailurePolicy::Continue => b"c",
            });
            hasher.update(b"\n");
        }
        let hex = hasher.finalize().to_hex();
        hex.as_str()[..12].to_string()
    }
}

/// Working directory after changing into `target` from `current`.
///
/// Absolute and home-relative targets replace the current directory; anything
/// else is resolved relative to it.
pub fn next_workdir(current: Option<&str>, target: &str) -> String {
    if target.starts_with('/') || target.starts_with('~') {
        return target.to_string();
    }
    match current {
        Some(cur) => format!("{}/{}", cur.trim_end_matches('/'), target),
        None => target.to_string(),
    }
}

/// The command actually sent to the remote shell.
pub fn remote_command(workdir: Option<&str>, command: &str) -> String {
    match workdir {
        Some(dir) => format!("cd {dir} && {command}"),
        None => command.to_string(),
    }
}
