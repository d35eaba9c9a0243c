//! # Process Runner Service
//!
//! Spawns the tool, writes the prompt, collects output.
//!
//! ```text
//!             ┌──────────── writer task ───→ stdin (prompt, then EOF)
//! spawn ──────┼──────────── stderr task ←─── stderr (captured for errors)
//!             └── read loop ←── stdout ──┬──→ lines (always collected)
//!                                        └──→ broadcast ──→ forwarder ──→ LineSink
//!                                             (drop-oldest)
//! ```
//!
//! The read loop never awaits the sink. A slow sink loses the oldest lines
//! instead of stalling the child's output pipe. The runner returns only after
//! the forwarder has drained, so anything published after `run_streaming`
//! returns is ordered after every delivered line.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Instant;

use shared_types::ExecutionError;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::SafeRootGuard;
use crate::domain::{resolve_workdir, Invocation, ProcessOutput, RunnerConfig, Workdir};
use crate::ports::{LineSink, PathGuard};

/// Runs the external tool once per call.
pub struct ProcessRunner {
    config: RunnerConfig,
    guard: Arc<dyn PathGuard>,
}

impl ProcessRunner {
    /// Runner guarded by a `SafeRootGuard` over the configured safe root.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        let guard = Arc::new(SafeRootGuard::new(config.safe_root.clone()));
        Self { config, guard }
    }

    /// Runner with a caller-provided path guard.
    pub fn with_guard(config: RunnerConfig, guard: Arc<dyn PathGuard>) -> Self {
        Self { config, guard }
    }

    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run to completion and return every output line.
    ///
    /// # Errors
    ///
    /// `Validation`, `Spawn`, `Io`, `ProcessExit`, `EmptyOutput` or `Timeout`.
    pub async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ExecutionError> {
        self.execute(invocation, None).await
    }

    /// Run to completion, handing each line to `sink` as it is produced.
    ///
    /// Sink failures are logged and never fail the run.
    ///
    /// # Errors
    ///
    /// Same as [`ProcessRunner::run`].
    pub async fn run_streaming(
        &self,
        invocation: &Invocation,
        sink: Arc<dyn LineSink>,
    ) -> Result<ProcessOutput, ExecutionError> {
        self.execute(invocation, Some(sink)).await
    }

    async fn execute(
        &self,
        invocation: &Invocation,
        sink: Option<Arc<dyn LineSink>>,
    ) -> Result<ProcessOutput, ExecutionError> {
        let workdir = self.prepare_workdir(invocation).await?;
        let mut child = self.spawn(invocation, &workdir.path)?;
        let started = Instant::now();
        let limit = self.config.process_timeout;

        info!(
            program = %self.config.program,
            pid = child.id(),
            workdir = %workdir.path.display(),
            streaming = sink.is_some(),
            "Tool process started"
        );

        let (line_tx, forwarder) = match sink {
            Some(sink) => {
                let (tx, forwarder) = LineForwarder::start(sink, self.config.line_buffer);
                (Some(tx), Some(forwarder))
            }
            None => (None, None),
        };

        // `collect` owns the line sender; it is dropped whether the future
        // completes or is abandoned on timeout, which lets the forwarder end.
        let outcome = tokio::time::timeout(
            limit,
            collect(&mut child, invocation.prompt.clone(), line_tx),
        )
        .await;

        // Terminate before draining the sink, which may be slow.
        if outcome.is_err() {
            warn!(
                program = %self.config.program,
                timeout_ms = limit.as_millis() as u64,
                "Tool process timed out, terminating"
            );
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to terminate timed out process");
            }
        }

        if let Some(forwarder) = forwarder {
            forwarder.finish().await;
        }

        let Ok(result) = outcome else {
            return Err(ExecutionError::timeout("process", limit));
        };
        let collected = result?;

        let elapsed = started.elapsed();
        if !collected.status.success() {
            warn!(
                exit_code = ?collected.status.code(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Tool process failed"
            );
            return Err(ExecutionError::ProcessExit {
                code: collected.status.code(),
                stderr: collected.stderr.trim().to_string(),
            });
        }
        if collected.bytes == 0 {
            return Err(ExecutionError::EmptyOutput);
        }

        debug!(
            lines = collected.lines.len(),
            bytes = collected.bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            "Tool process finished"
        );

        Ok(ProcessOutput {
            lines: collected.lines,
            stderr: collected.stderr,
            workdir: workdir.path,
            elapsed,
        })
    }

    async fn prepare_workdir(&self, invocation: &Invocation) -> Result<Workdir, ExecutionError> {
        let workdir = resolve_workdir(
            invocation.cwd.as_deref(),
            invocation.project_id.as_deref(),
            &invocation.prompt,
            &invocation.args,
            &self.config.safe_root,
        )?;
        self.guard.validate(&workdir.path)?;
        self.guard.create_safe_directory(&workdir.path).await?;
        debug!(path = %workdir.path.display(), source = ?workdir.source, "Working directory resolved");
        Ok(workdir)
    }

    fn spawn(&self, invocation: &Invocation, workdir: &Path) -> Result<Child, ExecutionError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.base_args)
            .args(&invocation.args)
            .current_dir(workdir)
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        command.spawn().map_err(|e| ExecutionError::Spawn {
            program: self.config.program.clone(),
            reason: e.to_string(),
        })
    }
}

struct Collected {
    lines: Vec<String>,
    bytes: usize,
    stderr: String,
    status: ExitStatus,
}

async fn collect(
    child: &mut Child,
    prompt: String,
    line_tx: Option<broadcast::Sender<String>>,
) -> Result<Collected, ExecutionError> {
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| ExecutionError::Io("child stdin was not captured".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecutionError::Io("child stdout was not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecutionError::Io("child stderr was not captured".to_string()))?;

    let writer = tokio::spawn(write_prompt(stdin, prompt));
    let stderr_reader = tokio::spawn(read_stderr(stderr));

    let (lines, bytes) = read_lines(stdout, line_tx).await?;

    let status = child
        .wait()
        .await
        .map_err(|e| ExecutionError::Io(format!("waiting for exit: {e}")))?;

    writer
        .await
        .map_err(|e| ExecutionError::Io(format!("prompt writer failed: {e}")))??;

    let stderr = match stderr_reader.await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to read tool error stream");
            String::new()
        }
        Err(e) => {
            warn!(error = %e, "Error stream reader failed");
            String::new()
        }
    };

    Ok(Collected {
        lines,
        bytes,
        stderr,
        status,
    })
}

async fn write_prompt(mut stdin: ChildStdin, prompt: String) -> Result<(), ExecutionError> {
    match stdin.write_all(prompt.as_bytes()).await {
        Ok(()) => Ok(()),
        // The child closed its input early; its exit status decides the outcome.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("Tool closed its input before reading the whole prompt");
            Ok(())
        }
        Err(e) => Err(ExecutionError::Io(format!("writing prompt: {e}"))),
    }
    // `stdin` drops here, closing the child's input.
}

async fn read_stderr(mut stderr: ChildStderr) -> io::Result<String> {
    let mut buf = Vec::new();
    stderr.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Read newline-terminated lines until EOF. The last line may be unterminated.
async fn read_lines(
    stdout: ChildStdout,
    line_tx: Option<broadcast::Sender<String>>,
) -> Result<(Vec<String>, usize), ExecutionError> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    let mut bytes = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| ExecutionError::Io(format!("reading output: {e}")))?;
        if read == 0 {
            break;
        }
        bytes += read;

        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        if let Some(tx) = &line_tx {
            // Only fails once the forwarder is gone.
            if tx.send(line.to_string()).is_err() {
                debug!("Line forwarder stopped, line not forwarded");
            }
        }
        lines.push(line.to_string());
    }

    Ok((lines, bytes))
}

/// Moves lines from the read loop to a `LineSink` without blocking the loop.
struct LineForwarder {
    handle: JoinHandle<()>,
}

impl LineForwarder {
    fn start(sink: Arc<dyn LineSink>, capacity: usize) -> (broadcast::Sender<String>, Self) {
        let (tx, mut rx) = broadcast::channel::<String>(capacity.max(1));
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(line) => {
                        if let Err(e) = sink.on_line(line).await {
                            warn!(error = %e, "Line sink failed, continuing");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(dropped)) => {
                        warn!(dropped, "Line sink too slow, oldest lines dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        (tx, Self { handle })
    }

    /// Wait until every buffered line has been handed to the sink.
    async fn finish(mut self) {
        if let Err(e) = (&mut self.handle).await {
            warn!(error = %e, "Line forwarder task failed");
        }
    }
}

// An abandoned run must not keep feeding its sink.
impl Drop for LineForwarder {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
