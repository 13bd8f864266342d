//! Shared helpers for invoking the external `corruption_manager` and
//! `log_manager` tools: piped-stdio subprocess execution and polling an
//! out-of-band progress file, both checking cancellation at every
//! suspension point.

use gamecache_config::CoreError;
use operation_registry::CancellationToken;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{interval, timeout};

const TOOL_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Captured result of an external tool invocation.
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `bin` with `args`, piping stdout/stderr. `Command::output` reads
/// both streams concurrently with waiting on the child, so a chatty tool
/// can never deadlock the pipe buffer.
pub async fn run_tool(bin: &Path, args: &[String]) -> Result<ToolOutput, CoreError> {
    let mut cmd = Command::new(bin);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let command_repr = format!("{} {}", bin.display(), args.join(" "));
    let output = timeout(TOOL_TIMEOUT, cmd.output())
        .await
        .map_err(|_| CoreError::Transient(format!("{command_repr} timed out")))?
        .map_err(|err| CoreError::Transient(format!("failed to execute {command_repr}: {err}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        let tail: String = stderr.chars().rev().take(2000).collect::<String>().chars().rev().collect();
        return Err(CoreError::Transient(format!(
            "{command_repr} exited with {:?}: {tail}",
            output.status.code()
        )));
    }

    Ok(ToolOutput { stdout, stderr })
}

/// Polls `path` until it appears, the cancellation token fires, or
/// `timeout` elapses. Mirrors the poll-with-cancellation-check idiom used
/// to wait for a sidecar's readiness socket.
pub async fn poll_for_file(
    path: &Path,
    cancel: &CancellationToken,
    deadline: Duration,
) -> Result<(), CoreError> {
    let mut ticker = interval(PROGRESS_POLL_INTERVAL);
    let started = tokio::time::Instant::now();

    loop {
        if path.exists() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        if started.elapsed() > deadline {
            return Err(CoreError::Transient(format!(
                "timed out waiting for {}",
                path.display()
            )));
        }
        ticker.tick().await;
    }
}

/// Reads a `{ "percent": f64, "message": String }` progress document,
/// tolerating a partially-written file (the tool writes it non-atomically).
pub fn read_progress_file(path: &Path) -> Option<(f64, String)> {
    let raw = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let percent = value.get("percent")?.as_f64()?;
    let message = value
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    Some((percent, message))
}
