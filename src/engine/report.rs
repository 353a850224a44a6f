// src/engine/report.rs

//! Human-readable job reports for the CI log.
//!
//! Everything rendered here goes through a [`Masker`] first.

use std::fmt::Write as _;

use crate::errors::DeployError;
use crate::secrets::Masker;
use crate::types::ExecutionResult;

/// Summary of a successful job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub git_ref: String,
    pub script_fingerprint: String,
    pub result: ExecutionResult,
}

/// Masked script output, stdout then stderr.
pub fn render_success(report: &JobReport, masker: &Masker) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "deploy {} ({}) succeeded in {}ms",
        report.job_id,
        report.git_ref,
        report.result.duration_ms()
    );
    push_stream(&mut out, "stdout", &report.result.stdout, masker);
    push_stream(&mut out, "stderr", &report.result.stderr, masker);
    out
}

/// Failure block. A failed step gets its index, command and output; other
/// errors get their message only.
pub fn render_failure(job_id: &str, err: &DeployError, masker: &Masker) -> String {
    let mut out = String::new();
    match err {
        DeployError::Command {
            step,
            command,
            result,
        } => {
            let _ = writeln!(
                out,
                "deploy {job_id} failed at step {step}: `{}` exited with {}",
                masker.mask(command),
                result.exit_code
            );
            push_stream(&mut out, "stdout", &result.stdout, masker);
            push_stream(&mut out, "stderr", &result.stderr, masker);
        }
        other => {
            let _ = writeln!(out, "deploy {job_id} failed: {}", masker.mask(&other.to_string()));
        }
    }
    out
}

fn push_stream(out: &mut String, label: &str, bytes: &[u8], masker: &Masker) {
    if bytes.is_empty() {
        return;
    }
    let text = masker.mask(&String::from_utf8_lossy(bytes));
    let _ = writeln!(out, "--- {label} ---");
    out.push_str(&text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::secrets::Secret;

    fn masker() -> Masker {
        let mut m = Masker::default();
        m.add(&Secret::new("hunter22"));
        m
    }

    #[test]
    fn success_output_is_masked() {
        let report = JobReport {
            job_id: "abc123".into(),
            git_ref: "refs/heads/main".into(),
            script_fingerprint: "f".repeat(12),
            result: ExecutionResult {
                exit_code: 0,
                stdout: b"logged in with hunter22\n".to_vec(),
                stderr: Vec::new(),
                duration: Duration::from_millis(1500),
            },
        };
        let text = render_success(&report, &masker());
        assert!(text.contains("succeeded in 1500ms"));
        assert!(text.contains("logged in with ***"));
        assert!(!text.contains("hunter22"));
        assert!(!text.contains("--- stderr ---"));
    }

    #[test]
    fn command_failure_names_step_and_command() {
        let err = DeployError::Command {
            step: 2,
            command: "git pull".into(),
            result: ExecutionResult {
                exit_code: 1,
                stdout: Vec::new(),
                stderr: b"fatal: auth hunter22".to_vec(),
                duration: Duration::ZERO,
            },
        };
        let text = render_failure("abc123", &err, &masker());
        assert!(text.contains("failed at step 2: `git pull` exited with 1"));
        assert!(text.contains("--- stderr ---\nfatal: auth ***\n"));
    }

    #[test]
    fn other_failures_print_message() {
        let text = render_failure("abc123", &DeployError::DeployInProgress, &Masker::default());
        assert_eq!(
            text,
            "deploy abc123 failed: A deployment is already in progress\n"
        );
    }
}
