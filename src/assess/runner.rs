//! Injected subprocess driver for provider CLIs.
//!
//! The assessor never spawns processes directly; it goes through
//! [`ProcessRunner`] so tests can substitute a fake and so cancellation
//! and timeout policy live in one place.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AssessError;

/// Captured output of a finished provider subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit status code (-1 when terminated by signal).
    pub status: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited cleanly.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

/// Capability to run a provider CLI to completion with a deadline.
///
/// Implementations must terminate the child process when the timeout
/// fires or the calling task is cancelled; merely abandoning the wait is
/// not acceptable.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` with `args`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AssessError::Spawn`] when the program cannot start and
    /// [`AssessError::Timeout`] when the deadline fires (the child is
    /// killed in that case).
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, AssessError>;
}

/// Production runner over `tokio::process`.
///
/// Children are spawned with `kill_on_drop` so dropping the wait future
/// (timeout or caller abort) tears the process down rather than leaking it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, AssessError> {
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| AssessError::Spawn {
            provider: program.to_string(),
            reason: e.to_string(),
        })?;

        let waited = tokio::time::timeout(timeout, child.wait_with_output()).await;

        match waited {
            Ok(Ok(output)) => Ok(ProcessOutput {
                status: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(AssessError::Spawn {
                provider: program.to_string(),
                reason: e.to_string(),
            }),
            // Timeout dropped the wait future, which kills the child.
            Err(_) => Err(AssessError::Timeout {
                provider: program.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = TokioProcessRunner;
        let output = runner
            .run(
                "sh",
                &["-c".to_string(), "printf hello".to_string()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello");
    }

    #[tokio::test]
    async fn test_run_nonzero_status_reported() {
        let runner = TokioProcessRunner;
        let output = runner
            .run(
                "sh",
                &["-c".to_string(), "exit 3".to_string()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(output.status, 3);
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_run_timeout_kills_child() {
        let runner = TokioProcessRunner;
        let err = runner
            .run(
                "sh",
                &["-c".to_string(), "sleep 30".to_string()],
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AssessError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let runner = TokioProcessRunner;
        let err = runner
            .run(
                "definitely-not-a-real-binary-xyz",
                &[],
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AssessError::Spawn { .. }));
    }
}
