//! Command execution.
//!
//! Runs an approved command through the platform shell and reduces every
//! failure mode to an [`ExecutionOutcome`]; nothing is raised past this
//! boundary.

use std::future::Future;
use std::path::Path;

use tokio::process::Command;

use crate::audit::ExecutionOutcome;

/// Executes approved commands.
pub trait CommandRunner {
    fn run(
        &self,
        command: &str,
        description: &str,
        cwd: &Path,
    ) -> impl Future<Output = ExecutionOutcome> + Send;
}

/// Runs commands with `sh -c` (`cmd /C` on Windows), capturing output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    fn command(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, description: &str, cwd: &Path) -> ExecutionOutcome {
        tracing::info!("Executing '{}' ({}) in {}", command, description, cwd.display());

        let output = match Self::command(command)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("Failed to spawn '{}': {}", command, e);
                return ExecutionOutcome::failed(e.to_string());
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            ExecutionOutcome::Completed {
                stdout,
                stderr,
                exit_status: output.status.code(),
            }
        } else {
            tracing::warn!("Command '{}' failed with {}", command, output.status);
            ExecutionOutcome::Failed {
                error: format!("Command '{}' returned non-zero {}", command, output.status),
                stderr: Some(stderr),
            }
        }
    }
}
