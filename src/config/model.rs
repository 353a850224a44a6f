// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::engine::BranchMatcher;
use crate::exec::{Script, Step};
use crate::types::FailurePolicy;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [trigger]
/// branches = ["main"]
///
/// [target]
/// port = 22
/// connect_timeout = "10s"
///
/// [job]
/// timeout = "15m"
/// app_dir = "~/app"
///
/// [[step]]
/// cmd = "docker system prune --all --force"
/// on_failure = "continue"
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub trigger: TriggerSection,

    #[serde(default)]
    pub target: TargetSection,

    /// Names of the environment variables holding each secret.
    #[serde(default)]
    pub secrets: SecretNames,

    #[serde(default)]
    pub job: JobSection,

    /// Ordered script, from `[[step]]` tables.
    #[serde(default)]
    pub step: Vec<StepConfig>,
}

/// `[trigger]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerSection {
    /// Glob patterns; a push to any matching branch deploys.
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,
}

fn default_branches() -> Vec<String> {
    vec!["main".to_string()]
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self {
            branches: default_branches(),
        }
    }
}

/// `[target]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    /// Port used when the port secret is not set.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> String {
    "10s".to_string()
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// `[secrets]` section: environment variable names.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SecretNames {
    pub host: String,
    pub user: String,
    pub password: String,
    pub key: String,
    pub passphrase: String,
    pub port: String,
    pub fingerprint: String,
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            host: "SSH_HOST".to_string(),
            user: "SSH_USER".to_string(),
            password: "SSH_PASSWORD".to_string(),
            key: "SSH_KEY".to_string(),
            passphrase: "SSH_PASSPHRASE".to_string(),
            port: "SSH_PORT".to_string(),
            fingerprint: "SSH_HOST_FINGERPRINT".to_string(),
        }
    }
}

impl SecretNames {
    pub fn all(&self) -> [(&'static str, &str); 7] {
        [
            ("host", self.host.as_str()),
            ("user", self.user.as_str()),
            ("password", self.password.as_str()),
            ("key", self.key.as_str()),
            ("passphrase", self.passphrase.as_str()),
            ("port", self.port.as_str()),
            ("fingerprint", self.fingerprint.as_str()),
        ]
    }
}

/// `[job]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSection {
    /// Upper bound on resolve + connect + script.
    #[serde(default = "default_job_timeout")]
    pub timeout: String,

    /// Remote checkout directory. When set and no `[[step]]` is given, the
    /// default script is generated for it.
    #[serde(default)]
    pub app_dir: Option<String>,

    /// Branch the default script checks out.
    #[serde(default)]
    pub checkout_branch: Option<String>,
}

fn default_job_timeout() -> String {
    "15m".to_string()
}

impl Default for JobSection {
    fn default() -> Self {
        Self {
            timeout: default_job_timeout(),
            app_dir: None,
            checkout_branch: None,
        }
    }
}

/// `[[step]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub cmd: String,

    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl From<&StepConfig> for Step {
    fn from(cfg: &StepConfig) -> Self {
        Step::new(cfg.cmd.trim()).with_policy(cfg.on_failure)
    }
}

/// Pull, rebuild and restart containers, then prune images.
pub fn default_script(app_dir: &str, branch: &str) -> Script {
    Script::new(vec![
        Step::new(format!("cd {app_dir}")),
        Step::new(format!("git checkout {branch}")),
        Step::new("git pull"),
        Step::new("docker compose down"),
        Step::new("docker compose up --build -d"),
        Step::new("docker system prune --all --force"),
    ])
}

/// Validated target settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSettings {
    pub port: u16,
    pub connect_timeout: Duration,
}

/// Validated configuration. Build it through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub branches: BranchMatcher,
    pub target: TargetSettings,
    pub secrets: SecretNames,
    pub job_timeout: Duration,
    pub script: Script,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        branches: BranchMatcher,
        target: TargetSettings,
        secrets: SecretNames,
        job_timeout: Duration,
        script: Script,
    ) -> Self {
        Self {
            branches,
            target,
            secrets,
            job_timeout,
            script,
        }
    }
}
