//! warden-sandbox: Constrained execution of already-authorized commands.
//!
//! Commands arrive here only after passing the permission engine, but the
//! executor still treats them as hostile: argument-vector spawning (never a
//! shell), a sanitized environment, capped output, and a hard timeout that
//! kills the whole process group.

mod env;

pub use env::sanitized_env;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Per-stream capture cap.
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024; // 1MiB

/// Options for one sandboxed run.
#[derive(Debug, Clone)]
pub struct SandboxOptions {
    /// Working directory for the child.
    pub cwd: PathBuf,
    /// Hard wall-clock timeout.
    pub timeout: Duration,
    /// Extra environment applied on top of the sanitized base.
    pub env_overrides: HashMap<String, String>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: Duration::from_secs(120),
            env_overrides: HashMap::new(),
        }
    }
}

/// Captured outcome of a sandboxed run. Nonzero exit codes are ordinary
/// data; only spawn-level failures populate `spawn_error`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SandboxResult {
    /// Captured stdout, capped at [`MAX_CAPTURE_BYTES`].
    pub stdout: String,
    /// Captured stderr, capped at [`MAX_CAPTURE_BYTES`].
    pub stderr: String,
    /// Child exit code. `None` when the child never ran or died on a signal.
    pub exit_code: Option<i32>,
    /// Whether the timeout fired. Output captured before the kill is kept.
    pub timed_out: bool,
    /// Diagnostic when the process could not be spawned at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_error: Option<String>,
}

impl SandboxResult {
    /// Clean zero-exit completion.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out && self.spawn_error.is_none()
    }

    fn spawn_failure(message: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out: false,
            spawn_error: Some(message),
        }
    }
}

/// Run `binary` with `args` as a discrete argument vector under the given
/// options. Infallible at the type level: every failure mode is represented
/// in the returned [`SandboxResult`].
pub async fn run(binary: &str, args: &[String], options: &SandboxOptions) -> SandboxResult {
    debug!(binary = %binary, ?args, timeout = ?options.timeout, "sandbox run");

    let mut cmd = Command::new(binary);
    cmd.args(args)
        .current_dir(&options.cwd)
        .env_clear()
        .envs(sanitized_env(&options.env_overrides))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so the timeout kill reaches children too.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(binary = %binary, error = %e, "sandbox spawn failed");
            return SandboxResult::spawn_failure(format!("failed to spawn '{binary}': {e}"));
        }
    };

    // Readers drain the pipes concurrently so a chatty child cannot block
    // on a full pipe while we wait on it.
    let stdout_task = child
        .stdout
        .take()
        .map(|r| tokio::spawn(read_capped(r)));
    let stderr_task = child
        .stderr
        .take()
        .map(|r| tokio::spawn(read_capped(r)));

    let (exit_code, timed_out) = match tokio::time::timeout(options.timeout, child.wait()).await {
        Ok(Ok(status)) => (status.code(), false),
        Ok(Err(e)) => {
            warn!(binary = %binary, error = %e, "sandbox wait failed");
            return SandboxResult::spawn_failure(format!("failed to wait on '{binary}': {e}"));
        }
        Err(_) => {
            warn!(binary = %binary, "sandbox timeout, killing process group");
            kill_group(&mut child).await;
            (None, true)
        }
    };

    let stdout = collect(stdout_task).await;
    let stderr = collect(stderr_task).await;

    SandboxResult {
        stdout,
        stderr,
        exit_code,
        timed_out,
        spawn_error: None,
    }
}

async fn kill_group(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // Negative pid addresses the whole process group.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
    let _ = child.kill().await;
}

async fn collect(task: Option<tokio::task::JoinHandle<Vec<u8>>>) -> String {
    match task {
        Some(task) => match task.await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => String::new(),
        },
        None => String::new(),
    }
}

/// Read a stream to EOF, keeping at most [`MAX_CAPTURE_BYTES`] but draining
/// the rest so the child never stalls on backpressure.
async fn read_capped<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> Vec<u8> {
    let mut buf = vec![0u8; 8192];
    let mut out = Vec::new();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if out.len() < MAX_CAPTURE_BYTES {
                    let take = n.min(MAX_CAPTURE_BYTES - out.len());
                    out.extend_from_slice(&buf[..take]);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn opts(dir: &TempDir) -> SandboxOptions {
        SandboxOptions {
            cwd: dir.path().to_path_buf(),
            timeout: Duration::from_secs(5),
            env_overrides: HashMap::new(),
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let result = run("echo", &args(&["hello"]), &opts(&dir)).await;
        assert!(result.success());
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout.trim(), "hello");
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_data_not_error() {
        let dir = TempDir::new().unwrap();
        let result = run("sh", &args(&["-c", "echo oops >&2; exit 7"]), &opts(&dir)).await;
        assert!(!result.success());
        assert_eq!(result.exit_code, Some(7));
        assert!(result.stderr.contains("oops"));
        assert!(result.spawn_error.is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure_reported_in_result() {
        let dir = TempDir::new().unwrap();
        let result = run("definitely-not-a-binary-xyz", &[], &opts(&dir)).await;
        assert_eq!(result.exit_code, None);
        assert!(!result.timed_out);
        assert!(result.spawn_error.is_some());
    }

    #[tokio::test]
    async fn test_timeout_kills_and_returns_promptly() {
        let dir = TempDir::new().unwrap();
        let options = SandboxOptions {
            timeout: Duration::from_millis(200),
            ..opts(&dir)
        };
        let start = Instant::now();
        let result = run("sleep", &args(&["30"]), &options).await;
        assert!(result.timed_out);
        assert_eq!(result.exit_code, None);
        // timeout plus a bounded epsilon, never the full sleep
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_output_before_timeout_is_kept() {
        let dir = TempDir::new().unwrap();
        let options = SandboxOptions {
            timeout: Duration::from_millis(300),
            ..opts(&dir)
        };
        let result = run("sh", &args(&["-c", "echo started; sleep 30"]), &options).await;
        assert!(result.timed_out);
        assert!(result.stdout.contains("started"));
    }

    #[tokio::test]
    async fn test_env_is_sanitized_for_child() {
        std::env::set_var("WARDEN_CHILD_SECRET", "hunter2");
        let dir = TempDir::new().unwrap();
        let mut options = opts(&dir);
        options
            .env_overrides
            .insert("WARDEN_MARKER".to_string(), "yes".to_string());
        let result = run("env", &[], &options).await;
        std::env::remove_var("WARDEN_CHILD_SECRET");

        assert!(result.success());
        assert!(!result.stdout.contains("WARDEN_CHILD_SECRET"));
        assert!(result.stdout.contains("WARDEN_MARKER=yes"));
        assert!(result.stdout.contains("PATH="));
    }

    #[tokio::test]
    async fn test_argument_vector_is_not_shell_interpreted() {
        let dir = TempDir::new().unwrap();
        // If this went through a shell, the semicolon would split commands.
        let result = run("echo", &args(&["hello; touch pwned"]), &opts(&dir)).await;
        assert!(result.success());
        assert!(result.stdout.contains("hello; touch pwned"));
        assert!(!dir.path().join("pwned").exists());
    }
}
