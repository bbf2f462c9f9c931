//! Command Dispatcher
//!
//! Runs a rendered command through the configured shell in one of the
//! execution modes. `standard` captures output; `interactive`/`stream` attach
//! the child to the terminal and escalate interrupt -> grace -> kill.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::background::PENDING;
use super::value::split_lines;
use crate::errors::{RecipeError, Result};
use crate::recipe::{ExecutionMode, OutputFormat};
use crate::telemetry::sanitize_for_log;

/// Shell command runner bound to a working directory
#[derive(Debug, Clone)]
pub struct Dispatcher {
    shell: String,
    workdir: PathBuf,
    grace: Duration,
}

impl Dispatcher {
    pub fn new(shell: impl Into<String>, workdir: impl Into<PathBuf>, grace: Duration) -> Self {
        Self {
            shell: shell.into(),
            workdir: workdir.into(),
            grace,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Execute `command` in the given mode.
    ///
    /// `background` never runs anything here and returns [`PENDING`]; the
    /// executor launches background units itself.
    pub async fn execute(
        &self,
        command: &str,
        stdin: &str,
        mode: ExecutionMode,
        format: OutputFormat,
    ) -> Result<String> {
        debug!(command = %sanitize_for_log(command), ?mode, "dispatching command");
        match mode {
            ExecutionMode::Standard => self.run_captured(command, stdin, format).await,
            ExecutionMode::Interactive | ExecutionMode::Stream => {
                self.run_attached(command).await?;
                Ok(String::new())
            }
            ExecutionMode::Background => Ok(PENDING.to_string()),
        }
    }

    fn shell_command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command).current_dir(&self.workdir);
        cmd
    }

    async fn run_captured(&self, command: &str, stdin: &str, format: OutputFormat) -> Result<String> {
        let mut cmd = self.shell_command(command);
        cmd.stdin(if stdin.is_empty() {
            Stdio::null()
        } else {
            Stdio::piped()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| spawn_error(command, e))?;

        if let Some(mut pipe) = child.stdin.take() {
            let data = stdin.to_string();
            // Written concurrently so a large input cannot deadlock against
            // a full stdout pipe. The child may exit without reading it.
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(data.as_bytes()).await {
                    debug!(error = %e, "stdin not fully consumed");
                }
            });
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| spawn_error(command, e))?;

        if !output.status.success() {
            return Err(RecipeError::CommandExecution {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(format_output(
            &String::from_utf8_lossy(&output.stdout),
            format,
        ))
    }

    async fn run_attached(&self, command: &str) -> Result<()> {
        let mut cmd = self.shell_command(command);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let mut child = cmd.spawn().map_err(|e| spawn_error(command, e))?;

        let interrupted = tokio::select! {
            status = child.wait() => {
                let status = status?;
                debug!(%status, "attached command finished");
                false
            }
            _ = tokio::signal::ctrl_c() => true,
        };

        if interrupted {
            warn!(command = %sanitize_for_log(command), "interrupt received, forwarding to child");
            forward_interrupt(&mut child)?;
            match tokio::time::timeout(self.grace, child.wait()).await {
                Ok(status) => {
                    status?;
                }
                Err(_) => {
                    warn!(grace_secs = self.grace.as_secs(), "child ignored interrupt, killing");
                    child.kill().await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn forward_interrupt(child: &mut Child) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(std::io::Error::from)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn forward_interrupt(child: &mut Child) -> Result<()> {
    child.start_kill()?;
    Ok(())
}

fn spawn_error(command: &str, e: std::io::Error) -> RecipeError {
    RecipeError::CommandExecution {
        command: command.to_string(),
        status: "failed to start".to_string(),
        stderr: e.to_string(),
    }
}

/// Apply an output format to captured stdout
pub fn format_output(raw: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Raw => raw.to_string(),
        OutputFormat::Trim => raw.trim().to_string(),
        OutputFormat::Lines => split_lines(raw).join("\n"),
    }
}
