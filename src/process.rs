use crate::error::{DeppyError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` when the process was terminated by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Turns a non-zero exit into a [`DeppyError::Process`] naming `command`.
    pub fn ensure_success(self, command: &str) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(DeppyError::Process(format!(
            "{command} failed with exit code {}: {}",
            self.status,
            self.stderr.trim()
        )))
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], dir: &Path) -> Result<CommandOutput>;

    /// Runs a command line through `sh -c`.
    async fn run_shell(&self, command_line: &str, dir: &Path) -> Result<CommandOutput> {
        self.run("sh", &["-c", command_line], dir).await
    }
}

/// Spawns real child processes with captured output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str], dir: &Path) -> Result<CommandOutput> {
        tracing::debug!(program, ?args, dir = %dir.display(), "Executing");

        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DeppyError::Process(format!(
                    "Failed to spawn '{program} {}': {e}",
                    args.join(" ")
                ))
            })?;

        let result = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(program, status = result.status, "Command finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn captures_output_and_status() {
        let dir = tempdir().unwrap();
        let output = TokioCommandRunner
            .run_shell("echo hello && echo oops >&2 && exit 3", dir.path())
            .await
            .unwrap();

        assert_eq!(output.status, 3);
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert!(matches!(
            output.ensure_success("script"),
            Err(DeppyError::Process(msg)) if msg.contains("exit code 3")
        ));
    }

    #[tokio::test]
    async fn runs_in_the_given_directory() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("marker.txt"), "x").await.unwrap();
        let output = TokioCommandRunner
            .run("ls", &[], dir.path())
            .await
            .unwrap()
            .ensure_success("ls")
            .unwrap();
        assert!(output.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn missing_program_is_a_process_error() {
        let dir = tempdir().unwrap();
        let err = TokioCommandRunner
            .run("definitely-not-a-real-binary-42", &[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DeppyError::Process(_)));
    }
}
