// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `pushdeploy`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pushdeploy",
    version,
    about = "Deploy to a single host over SSH when a branch is pushed.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, global = true, value_name = "PATH", default_value = "Deploy.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PUSHDEPLOY_LOG` or `info` is used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Handle a single push event and deploy if the branch matches.
    Trigger {
        /// Branch that was pushed.
        #[arg(long, value_name = "BRANCH")]
        branch: Option<String>,

        /// Full git ref that was pushed, e.g. `refs/heads/main`.
        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,

        /// JSON push payload with a `ref` (and optionally `branch`) field.
        #[arg(long, value_name = "PATH", conflicts_with_all = ["branch", "git_ref"])]
        event_file: Option<PathBuf>,
    },

    /// Read newline-delimited JSON trigger events from stdin until EOF or Ctrl-C.
    Listen,

    /// Validate the config and print the effective script without connecting.
    Check,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_with_ref_and_global_flags() {
        let args = CliArgs::try_parse_from([
            "pushdeploy",
            "trigger",
            "--ref",
            "refs/heads/main",
            "--config",
            "ci/Deploy.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, "ci/Deploy.toml");
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        match args.command {
            Command::Trigger {
                branch,
                git_ref,
                event_file,
            } => {
                assert_eq!(branch, None);
                assert_eq!(git_ref.as_deref(), Some("refs/heads/main"));
                assert!(event_file.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn event_file_conflicts_with_branch() {
        let res = CliArgs::try_parse_from([
            "pushdeploy",
            "trigger",
            "--event-file",
            "event.json",
            "--branch",
            "main",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["pushdeploy", "check"]).unwrap();
        assert_eq!(args.config, "Deploy.toml");
        assert!(args.log_level.is_none());
        assert!(matches!(args.command, Command::Check));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(CliArgs::try_parse_from(["pushdeploy"]).is_err());
    }
}
