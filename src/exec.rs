/*============================================================
  Synavera Project: Syn-Stall
  Module: synstall::exec
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Single point for running external package-manager and
    diagnostic commands with bounded timeouts, either streaming
    output live to the console or capturing it.

  Security / Safety Notes:
    Executes system binaries with the invoking user's
    privileges; no shell interpolation of caller input.

  Dependencies:
    tokio::process for async command execution, tokio::time
    for timeout enforcement.

  Operational Scope:
    Every shell-out in the tester goes through this module so
    that timeout, kill, and error-capture logic exists once.

  Revision History:
    2026-07-02 COD  Crafted bounded command runner.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic command invocation with explicit checks
    - Timed-out children are killed, never orphaned
    - Reusable helpers for external command diagnostics
============================================================*/

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::{Result, SynstallError};

/// One external command invocation with a mandatory timeout.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

/// Terminal state of a completed (non-timed-out) command.
#[derive(Debug)]
pub struct CommandOutcome {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable command line for banners and diagnostics.
    pub fn display(&self) -> String {
        let mut rendered = self.program.clone();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(arg);
        }
        rendered
    }

    fn build(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        command
    }

    /// Run the command, echoing output line-by-line as it arrives.
    ///
    /// Stdout and stderr are pumped concurrently so neither pipe can fill
    /// and stall the child. Returns the exit status and collected output;
    /// exceeding the bound kills the child and yields `CommandTimeout`.
    pub async fn run_streaming(&self) -> Result<CommandOutcome> {
        self.run_inner(true).await
    }

    /// Run the command silently, capturing output.
    ///
    /// Non-zero exit is reported in the outcome rather than as an error;
    /// callers decide whether that is fatal for their phase.
    pub async fn run_captured(&self) -> Result<CommandOutcome> {
        self.run_inner(false).await
    }

    async fn run_inner(&self, echo: bool) -> Result<CommandOutcome> {
        let mut child = self
            .build()
            .spawn()
            .map_err(|err| map_spawn_error(err, &self.program))?;

        // Handles are taken before wait() so the pumps own the pipes.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_pump = tokio::spawn(pump_lines(stdout, echo));
        let err_pump = tokio::spawn(pump_lines(stderr, echo));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                out_pump.abort();
                err_pump.abort();
                return Err(SynstallError::CommandTimeout {
                    command: self.display(),
                    timeout: self.timeout,
                });
            }
        };

        let stdout = join_pump(out_pump).await?;
        let stderr = join_pump(err_pump).await?;

        Ok(CommandOutcome {
            status: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }

    /// Capture variant that promotes non-zero exit to `CommandFailure`.
    pub async fn run_checked(&self) -> Result<CommandOutcome> {
        let outcome = self.run_captured().await?;
        if outcome.success() {
            Ok(outcome)
        } else {
            Err(SynstallError::CommandFailure {
                command: self.display(),
                status: outcome.status,
                stderr: outcome.stderr.trim().to_string(),
            })
        }
    }
}

async fn pump_lines<R>(reader: Option<R>, echo: bool) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut collected = String::new();
    let Some(reader) = reader else {
        return Ok(collected);
    };
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if echo {
            println!("{line}");
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    Ok(collected)
}

async fn join_pump(handle: tokio::task::JoinHandle<io::Result<String>>) -> Result<String> {
    let text = handle.await.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("output pump task failed: {err}"),
        )
    })??;
    Ok(text)
}

fn map_spawn_error(err: io::Error, command: &str) -> SynstallError {
    if err.kind() == io::ErrorKind::NotFound {
        SynstallError::CommandMissing {
            command: command.into(),
        }
    } else {
        SynstallError::Io(err)
    }
}
