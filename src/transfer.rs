//! `Transferer`: wraps the external rsync transfer tool.
//!
//! Grounded on `original_source/barn-agent/src/rsync.cpp`
//! (`do_rsync`, `get_rsync_candidates`, `log_files_not_on_target`,
//! `ship_file`).

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::child::ManagedChild;

const RSYNC_TIMEOUT_SECS: u32 = 30;
const PROTOCOL_ERROR_RETRIES: u32 = 2;

const EXIT_SUCCESS: i32 = 0;
const EXIT_PARTIAL_TRANSFER: i32 = 23;
const EXIT_PARTIAL_TRANSFER_VANISHED_SOURCE: i32 = 24;
const EXIT_PROTOCOL_ERROR: i32 = 5;

/// A probe (dry-run) failed for a non-transient reason, after retries.
#[derive(Debug, Error)]
#[error("failed to retrieve sync list: {reason}")]
pub struct ProbeError {
    pub reason: String,
}

/// Wraps invocations of the external transfer tool (`rsync`). The binary
/// name is overridable so tests can point at a stub script.
#[derive(Debug, Clone)]
pub struct Transferer {
    executable: String,
}

impl Default for Transferer {
    fn default() -> Self {
        Self::new("rsync")
    }
}

impl Transferer {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Dry-run probe: discover which of `local_files` are missing on
    /// `target`. Empty input short-circuits to `Ok(vec![])` without
    /// invoking the tool at all (spec §4.3).
    pub async fn probe(
        &self,
        source_dir: &Path,
        local_files: &[String],
        target: &str,
    ) -> Result<Vec<String>, ProbeError> {
        if local_files.is_empty() {
            return Ok(Vec::new());
        }
        let paths: Vec<PathBuf> = local_files.iter().map(|f| source_dir.join(f)).collect();
        let mut args: Vec<String> = vec![
            "--dry-run".to_string(),
            "--times".to_string(),
            "--verbose".to_string(),
            format!("--timeout={RSYNC_TIMEOUT_SECS}"),
        ];
        args.extend(paths.iter().map(|p| p.display().to_string()));
        args.push(target.to_string());

        let output = self.run_with_retry(&args).await.map_err(|err| ProbeError {
            reason: err.to_string(),
        })?;
        match output.exit_code {
            EXIT_SUCCESS | EXIT_PARTIAL_TRANSFER | EXIT_PARTIAL_TRANSFER_VANISHED_SOURCE => {
                let mut missing = parse_missing_on_target(&output.stdout);
                missing.sort();
                Ok(missing)
            }
            other => Err(ProbeError {
                reason: format!("rsync exited {other}: {}", output.stderr.trim()),
            }),
        }
    }

    /// Wet-run: ship a single file. Returns `true` iff the final attempt
    /// exits 0.
    pub async fn ship_one(&self, file_path: &Path, target: &str) -> bool {
        let args: Vec<String> = vec![
            "--times".to_string(),
            "--verbose".to_string(),
            format!("--timeout={RSYNC_TIMEOUT_SECS}"),
            file_path.display().to_string(),
            target.to_string(),
        ];
        match self.run_with_retry(&args).await {
            Ok(output) => output.exit_code == EXIT_SUCCESS,
            Err(_) => false,
        }
    }

    /// Runs the tool, retrying up to `PROTOCOL_ERROR_RETRIES` additional
    /// times while the exit code is the client/server protocol error (5).
    async fn run_with_retry(&self, args: &[String]) -> anyhow::Result<CommandOutput> {
        let mut last = self.run_once(args).await?;
        for attempt in 1..=PROTOCOL_ERROR_RETRIES {
            if last.exit_code != EXIT_PROTOCOL_ERROR {
                break;
            }
            tracing::warn!("rsync protocol failure, retrying (attempt {attempt})");
            last = self.run_once(args).await?;
        }
        Ok(last)
    }

    async fn run_once(&self, args: &[String]) -> anyhow::Result<CommandOutput> {
        let mut command = tokio::process::Command::new(&self.executable);
        command.args(args);
        let managed = ManagedChild::spawn(&mut command)?;
        let output = managed
            .wait_with_output()
            .await
            .map_err(|err| anyhow::anyhow!("failed to run {}: {err}", self.executable))?;
        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

struct CommandOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

/// Lines whose first character is `@` are file names to ship; others are
/// ignored (spec §6, "Stdout format").
fn parse_missing_on_target(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| line.starts_with('@'))
        .map(|line| line.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_at_prefixed_lines() {
        let stdout = "sending incremental file list\n@t1\ncurrent\n@t2\nsent 123 bytes\n";
        assert_eq!(parse_missing_on_target(stdout), vec!["@t1", "@t2"]);
    }

    #[test]
    fn parses_empty_stdout_as_empty() {
        assert!(parse_missing_on_target("").is_empty());
    }

    #[tokio::test]
    async fn probe_short_circuits_on_empty_input() {
        let transferer = Transferer::new("rsync-should-never-run");
        let result = transferer
            .probe(Path::new("/tmp"), &[], "rsync://h/n/")
            .await;
        assert_eq!(result.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn probe_surfaces_nonzero_exit_as_error() {
        // a binary that always fails with exit 1, simulating a transfer
        // tool hard failure on a non-empty candidate list.
        let transferer = Transferer::new("false");
        let result = transferer
            .probe(Path::new("/tmp"), &["@t1".to_string()], "rsync://h/n/")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ship_one_false_on_nonzero_exit() {
        let transferer = Transferer::new("false");
        let ok = transferer.ship_one(Path::new("/tmp/@t1"), "rsync://h/n/").await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn ship_one_true_on_success() {
        let transferer = Transferer::new("true");
        let ok = transferer.ship_one(Path::new("/tmp/@t1"), "rsync://h/n/").await;
        assert!(ok);
    }
}
