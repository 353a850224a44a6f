// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod secrets;
pub mod transport;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, load_and_validate};
use crate::engine::runtime::forward_events;
use crate::engine::{Runtime, RuntimeEvent, TriggerController, TriggerEvent, TriggerOutcome};
use crate::errors::{DeployError, Result};
use crate::secrets::EnvSecretStore;
use crate::transport::SshTransport;

/// Full ref of the push, as set by GitHub Actions.
pub const GITHUB_REF_VAR: &str = "GITHUB_REF";
/// Short branch or tag name, as set by GitHub Actions.
pub const GITHUB_REF_NAME_VAR: &str = "GITHUB_REF_NAME";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the environment secret store and SSH transport
/// - the trigger controller (single event) or listen runtime (event stream)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    debug!(path = %config_path.display(), "config loaded");

    match args.command {
        Command::Check => {
            print_dry_run(&cfg, &config_path);
            Ok(())
        }
        Command::Trigger {
            branch,
            git_ref,
            event_file,
        } => {
            let event = resolve_trigger_event(branch, git_ref, event_file.as_deref(), |name| {
                std::env::var(name).ok().filter(|v| !v.is_empty())
            })?;
            let controller =
                TriggerController::new(Arc::new(cfg), EnvSecretStore, SshTransport::new());

            match controller.handle(event).await? {
                TriggerOutcome::Skipped { branch } => {
                    println!("branch '{branch}' is not configured for deploys; nothing to do");
                }
                TriggerOutcome::Deployed(report) => {
                    info!(job_id = %report.job_id, "done");
                }
            }
            Ok(())
        }
        Command::Listen => listen(cfg).await,
    }
}

async fn listen(cfg: ConfigFile) -> Result<()> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // stdin → runtime events.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = forward_events(stdin, tx).await {
                tracing::warn!(error = %e, "reading trigger events failed");
            }
        });
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    let controller = Arc::new(TriggerController::new(
        Arc::new(cfg),
        EnvSecretStore,
        SshTransport::new(),
    ));
    let stats = Runtime::new(controller, rt_rx).run().await?;
    println!("pushdeploy: {stats}");

    if stats.failed > 0 {
        return Err(DeployError::Other(anyhow::anyhow!(
            "{} deployment(s) failed",
            stats.failed
        )));
    }
    Ok(())
}

/// Work out which push to handle.
///
/// Precedence: the event file, then `--branch`/`--ref`, then the CI
/// environment (`GITHUB_REF`, then `GITHUB_REF_NAME`).
pub fn resolve_trigger_event<F>(
    branch: Option<String>,
    git_ref: Option<String>,
    event_file: Option<&Path>,
    env: F,
) -> Result<TriggerEvent>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = event_file {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DeployError::ConfigError(format!("cannot read event file {}: {e}", path.display()))
        })?;
        return TriggerEvent::from_json(&text);
    }

    match (branch, git_ref) {
        (Some(branch), Some(git_ref)) => return Ok(TriggerEvent::new(branch, git_ref)),
        (Some(branch), None) => return Ok(TriggerEvent::for_branch(&branch)),
        (None, Some(git_ref)) => return Ok(TriggerEvent::from_ref(&git_ref)),
        (None, None) => {}
    }

    if let Some(git_ref) = env(GITHUB_REF_VAR) {
        return Ok(TriggerEvent::from_ref(&git_ref));
    }
    if let Some(branch) = env(GITHUB_REF_NAME_VAR) {
        return Ok(TriggerEvent::for_branch(&branch));
    }

    Err(DeployError::ConfigError(format!(
        "no trigger event: pass --event-file, --branch or --ref, or set {GITHUB_REF_VAR}"
    )))
}

/// Dry-run output: branches, target settings, secret names and the script.
fn print_dry_run(cfg: &ConfigFile, path: &Path) {
    println!("pushdeploy check ({})", path.display());
    println!("  branches = {:?}", cfg.branches.patterns());
    println!("  target.port = {} (unless {} is set)", cfg.target.port, cfg.secrets.port);
    println!("  target.connect_timeout = {:?}", cfg.target.connect_timeout);
    println!("  job.timeout = {:?}", cfg.job_timeout);
    println!();

    println!("secrets (env var names):");
    for (field, name) in cfg.secrets.all() {
        println!("  {field:<12} {name}");
    }
    println!();

    println!(
        "script ({} steps, fingerprint {}):",
        cfg.script.len(),
        cfg.script.fingerprint()
    );
    for (index, step) in cfg.script.steps().iter().enumerate() {
        println!("  {index}. {}  [on_failure = {}]", step.command, step.on_failure);
    }

    debug!("dry-run complete (no connection made)");
}
