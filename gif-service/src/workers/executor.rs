use crate::error::PipelineError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Runs external tools with captured output and a hard timeout.
#[derive(Clone, Debug)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute<S: AsRef<OsStr>>(
        &self,
        program: &str,
        args: &[S],
        working_dir: Option<&Path>,
    ) -> Result<Output, PipelineError> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        // The child is killed if the timeout drops the output future.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let printable: Vec<_> = args.iter().map(|a| a.as_ref().to_string_lossy()).collect();
        tracing::debug!(
            program = %program,
            args = ?printable,
            timeout_secs = %self.timeout.as_secs(),
            "Executing command"
        );

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                tracing::error!(program = %program, args = ?printable, "Command timed out");
                PipelineError::CommandTimeout {
                    program: program.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            })?
            .map_err(|e| PipelineError::io(format!("failed to run {}", program), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                program = %program,
                args = ?printable,
                status = %output.status,
                stderr = %stderr,
                "Command failed"
            );
            let stderr = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            };
            return Err(PipelineError::Command {
                program: program.to_string(),
                stderr,
            });
        }

        tracing::debug!(
            program = %program,
            output_size = output.stdout.len(),
            "Command succeeded"
        );

        Ok(output)
    }
}
