//! Bounded subprocess execution shared by every external toolchain call

use crate::error::{SandboxError, SandboxResult};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Cap on captured bytes per stream; the rest is drained and dropped
pub(crate) const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Grace period for the pipe readers once the child is gone
const READER_GRACE: Duration = Duration::from_millis(500);

/// What a finished (or killed) child left behind
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    /// Exit code, None when killed by a signal or the timeout
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Spawn `command`, wait at most `timeout`, and kill it if the budget runs out.
///
/// stdin is closed, stdout and stderr are captured. Only spawn and wait
/// failures are errors; a non-zero exit or a timeout is a normal outcome.
pub async fn run_bounded(mut command: Command, timeout: Duration) -> SandboxResult<ProcessOutcome> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = command
        .spawn()
        .map_err(|source| SandboxError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout_task = tokio::spawn(capture(child.stdout.take()));
    let stderr_task = tokio::spawn(capture(child.stderr.take()));

    let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => (status.code(), false),
        Ok(Err(e)) => {
            return Err(SandboxError::Internal(format!(
                "Process wait error for {}: {}",
                program, e
            )))
        }
        Err(_) => {
            // Timeout - kill the process
            if let Err(e) = child.kill().await {
                tracing::warn!(program = %program, error = %e, "Failed to kill timed out process");
            }
            (None, true)
        }
    };

    let stdout = join_capture(stdout_task).await;
    let stderr = join_capture(stderr_task).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    tracing::debug!(
        program = %program,
        exit_code = ?exit_code,
        timed_out,
        duration_ms,
        "Process finished"
    );

    Ok(ProcessOutcome {
        exit_code,
        stdout,
        stderr,
        timed_out,
        duration_ms,
    })
}

async fn capture<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };

    let mut buf = Vec::new();
    if (&mut reader)
        .take(MAX_CAPTURE_BYTES as u64)
        .read_to_end(&mut buf)
        .await
        .is_ok()
    {
        // Keep the pipe flowing so the child never blocks on a full buffer
        let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn join_capture(task: tokio::task::JoinHandle<String>) -> String {
    match tokio::time::timeout(READER_GRACE, task).await {
        Ok(Ok(text)) => text,
        _ => String::new(),
    }
}
