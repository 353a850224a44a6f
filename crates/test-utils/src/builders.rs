#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use pushdeploy::config::{ConfigFile, RawConfigFile, StepConfig};
use pushdeploy::secrets::Secret;
use pushdeploy::secrets::mock::MapSecretStore;
use pushdeploy::transport::{ConnectTarget, Credential};
use pushdeploy::types::FailurePolicy;

pub const TEST_HOST: &str = "deploy.example.com";
pub const TEST_USER: &str = "deployer";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    /// Defaults: `main` only, 22, 10s connect, 15m job, no steps.
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_branches(mut self, patterns: &[&str]) -> Self {
        self.config.trigger.branches = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.config.step.push(step);
        self
    }

    /// Append plain `abort` steps.
    pub fn with_commands(mut self, commands: &[&str]) -> Self {
        for cmd in commands {
            self.config.step.push(StepBuilder::new(cmd).build());
        }
        self
    }

    pub fn with_app_dir(mut self, dir: &str) -> Self {
        self.config.job.app_dir = Some(dir.to_string());
        self
    }

    pub fn with_job_timeout(mut self, timeout: &str) -> Self {
        self.config.job.timeout = timeout.to_string();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: &str) -> Self {
        self.config.target.connect_timeout = timeout.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.target.port = port;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn build_arc(self) -> Arc<ConfigFile> {
        Arc::new(self.build())
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepBuilder {
    step: StepConfig,
}

impl StepBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            step: StepConfig {
                cmd: cmd.to_string(),
                on_failure: FailurePolicy::Abort,
            },
        }
    }

    pub fn continue_on_failure(mut self) -> Self {
        self.step.on_failure = FailurePolicy::Continue;
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}

/// Host, user and password under the default secret names.
pub fn standard_secrets() -> MapSecretStore {
    MapSecretStore::new()
        .with("SSH_HOST", TEST_HOST)
        .with("SSH_USER", TEST_USER)
        .with("SSH_PASSWORD", TEST_PASSWORD)
}

/// Password target for driving a transport directly.
pub fn test_target() -> ConnectTarget {
    ConnectTarget {
        host: TEST_HOST.to_string(),
        port: 22,
        username: TEST_USER.to_string(),
        credential: Credential::Password(Secret::new(TEST_PASSWORD)),
        connect_timeout: Duration::from_secs(10),
        host_fingerprint: None,
    }
}
