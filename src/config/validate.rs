// src/config/validate.rs

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile, TargetSettings, default_script};
use crate::engine::BranchMatcher;
use crate::errors::{DeployError, Result};
use crate::exec::{Script, Step};
use crate::types::parse_duration;

static ENV_VAR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DeployError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let branches = validate_branches(&raw)?;
        let (target, job_timeout) = validate_timeouts(&raw)?;
        validate_secret_names(&raw)?;
        let script = build_script(&raw)?;

        Ok(ConfigFile::new_unchecked(
            branches,
            target,
            raw.secrets,
            job_timeout,
            script,
        ))
    }
}

fn validate_branches(cfg: &RawConfigFile) -> Result<BranchMatcher> {
    if cfg.trigger.branches.is_empty() {
        return Err(DeployError::ConfigError(
            "[trigger].branches must list at least one branch pattern".to_string(),
        ));
    }
    BranchMatcher::new(&cfg.trigger.branches)
}

fn validate_timeouts(cfg: &RawConfigFile) -> Result<(TargetSettings, Duration)> {
    let connect_timeout = parse_nonzero("[target].connect_timeout", &cfg.target.connect_timeout)?;
    let job_timeout = parse_nonzero("[job].timeout", &cfg.job.timeout)?;

    if connect_timeout > job_timeout {
        return Err(DeployError::ConfigError(format!(
            "[target].connect_timeout ({:?}) must not exceed [job].timeout ({:?})",
            connect_timeout, job_timeout
        )));
    }

    if cfg.target.port == 0 {
        return Err(DeployError::ConfigError(
            "[target].port must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok((
        TargetSettings {
            port: cfg.target.port,
            connect_timeout,
        },
        job_timeout,
    ))
}

fn parse_nonzero(key: &str, value: &str) -> Result<Duration> {
    let d = parse_duration(value).map_err(|e| DeployError::ConfigError(format!("{key}: {e}")))?;
    if d.is_zero() {
        return Err(DeployError::ConfigError(format!("{key} must be greater than zero")));
    }
    Ok(d)
}

fn validate_secret_names(cfg: &RawConfigFile) -> Result<()> {
    for (field, name) in cfg.secrets.all() {
        if !ENV_VAR_NAME.is_match(name) {
            return Err(DeployError::ConfigError(format!(
                "[secrets].{field} = '{name}' is not a valid environment variable name"
            )));
        }
    }
    Ok(())
}

fn build_script(cfg: &RawConfigFile) -> Result<Script> {
    if !cfg.step.is_empty() {
        for (index, step) in cfg.step.iter().enumerate() {
            if step.cmd.trim().is_empty() {
                return Err(DeployError::ConfigError(format!(
                    "[[step]] #{index} has an empty `cmd`"
                )));
            }
        }
        return Ok(Script::new(cfg.step.iter().map(Step::from).collect()));
    }

    match cfg.job.app_dir.as_deref().map(str::trim) {
        Some(dir) if !dir.is_empty() => {
            let branch = cfg
                .job
                .checkout_branch
                .as_deref()
                .or_else(|| cfg.trigger.branches.first().map(String::as_str))
                .unwrap_or("main");
            Ok(default_script(dir, branch))
        }
        _ => Err(DeployError::ConfigError(
            "config must contain at least one [[step]] or set [job].app_dir".to_string(),
        )),
    }
}
