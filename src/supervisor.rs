//! Task Supervisor: runs a registered agent as a child process against a
//! single prompt, with a wall-clock ceiling and bounded output capture.
//! Stdin is closed immediately — agents are one-shot and never prompted
//! interactively. Killing on timeout is graceful-then-hard: a `SIGTERM`
//! first, then `SIGKILL` after a grace period, mirroring how the pack's own
//! intervention executor escalates signals.

use crate::constants::{AGENT_KILL_GRACE_SECS, AGENT_OUTPUT_CAP_BYTES, AGENT_TIMEOUT_SECS};
use crate::models::AgentDefinition;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

#[derive(Debug, Clone)]
pub struct SupervisionResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

/// Runs `agent` against `prompt` in `work_dir`, substituting `{prompt}` and
/// `{timestamp}` placeholders into its configured args, and returns once the
/// process exits, is killed for exceeding the timeout, or fails to spawn at
/// all. `on_spawn` is invoked with the child's pid as soon as it starts, so a
/// caller can track it for status reporting before the process finishes.
pub async fn run(
    agent: &AgentDefinition,
    prompt: &str,
    work_dir: &std::path::Path,
    on_spawn: impl FnOnce(u32),
) -> std::io::Result<SupervisionResult> {
    let timestamp = chrono::Utc::now().to_rfc3339();
    let args: Vec<String> = agent
        .args
        .iter()
        .map(|arg| arg.replace("{prompt}", prompt).replace("{timestamp}", &timestamp))
        .collect();

    let mut child = Command::new(&agent.cmd)
        .args(&args)
        .current_dir(work_dir)
        .env("HOME", std::env::var("HOME").unwrap_or_default())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(pid) = child.id() {
        on_spawn(pid);
    }

    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(AGENT_TIMEOUT_SECS), drive(&mut child)).await;

    match outcome {
        Ok((exit_code, stdout, stderr)) => Ok(SupervisionResult {
            success: exit_code == Some(0),
            exit_code,
            stdout,
            stderr,
            duration_ms: started.elapsed().as_millis() as u64,
            timed_out: false,
        }),
        Err(_) => {
            let (stdout, stderr) = kill_and_drain(&mut child).await;
            Ok(SupervisionResult {
                success: false,
                exit_code: None,
                stdout,
                stderr,
                duration_ms: started.elapsed().as_millis() as u64,
                timed_out: true,
            })
        }
    }
}

/// Concurrently drains stdout/stderr (capped) while waiting for exit, so a
/// child that fills a pipe buffer before finishing can't deadlock us.
async fn drive(child: &mut Child) -> (Option<i32>, String, String) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_fut = read_capped(stdout);
    let stderr_fut = read_capped(stderr);
    let status_fut = child.wait();

    let (status, stdout, stderr) = tokio::join!(status_fut, stdout_fut, stderr_fut);
    let exit_code = status.ok().and_then(|s| s.code());
    (exit_code, stdout, stderr)
}

async fn read_capped<R>(pipe: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];
    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if buf.len() < AGENT_OUTPUT_CAP_BYTES {
            let remaining = AGENT_OUTPUT_CAP_BYTES - buf.len();
            buf.extend_from_slice(&chunk[..read.min(remaining)]);
        }
        // Excess bytes beyond the cap are discarded but the pipe keeps
        // draining, otherwise a chatty child would block on a full pipe.
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// `SIGTERM`, wait up to the grace period, then `SIGKILL` if it's still
/// alive. Output collected during the wait is still returned.
async fn kill_and_drain(child: &mut Child) -> (String, String) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let drain = tokio::join!(read_capped(stdout), read_capped(stderr));

    let exited = tokio::time::timeout(Duration::from_secs(AGENT_KILL_GRACE_SECS), child.wait()).await;
    if exited.is_err() {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGKILL);
            }
        }
        let _ = child.wait().await;
    }

    drain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with(cmd: &str, args: &[&str]) -> AgentDefinition {
        AgentDefinition {
            id: "test".to_string(),
            name: "test".to_string(),
            cmd: cmd.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            keywords: vec![],
            ram_mb: 0,
            default: false,
            enabled: true,
            note: None,
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_a_zero_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_with("sh", &["-c", "echo {prompt}"]);
        let result = run(&agent, "hello", dir.path(), |_| {}).await.unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout.trim(), "hello");
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_a_success() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_with("sh", &["-c", "exit 1"]);
        let result = run(&agent, "x", dir.path(), |_| {}).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(1));
    }

    #[tokio::test]
    async fn stderr_is_captured_separately_from_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_with("sh", &["-c", "echo out; echo err >&2"]);
        let result = run(&agent, "x", dir.path(), |_| {}).await.unwrap();
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn a_missing_binary_surfaces_as_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_with("definitely-not-a-real-binary", &[]);
        assert!(run(&agent, "x", dir.path(), |_| {}).await.is_err());
    }

    #[tokio::test]
    async fn timestamp_placeholder_is_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_with("sh", &["-c", "echo {timestamp}"]);
        let result = run(&agent, "x", dir.path(), |_| {}).await.unwrap();
        assert!(result.stdout.trim().len() > 10);
    }

    #[tokio::test]
    async fn on_spawn_receives_a_pid() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_with("sh", &["-c", "true"]);
        let seen_pid = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let seen_pid_clone = seen_pid.clone();
        run(&agent, "x", dir.path(), move |pid| {
            seen_pid_clone.store(pid, std::sync::atomic::Ordering::SeqCst);
        })
        .await
        .unwrap();
        assert!(seen_pid.load(std::sync::atomic::Ordering::SeqCst) > 0);
    }
}
