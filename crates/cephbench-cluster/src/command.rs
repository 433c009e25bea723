//! Bounded-timeout execution of external admin commands.
//!
//! Every call to the control plane carries an explicit deadline. Commands
//! are spawned with `kill_on_drop` so that a command abandoned by a timeout
//! does not keep running past its budget.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use cephbench_common::{ArtifactGuard, BenchError, BenchResult};
use tokio::process::Command;
use tracing::debug;

fn render(program: &str, args: &[&str]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Run a command and return its stdout, failing on timeout or abnormal exit.
pub async fn capture_stdout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> BenchResult<Vec<u8>> {
    let line = render(program, args);
    debug!("running '{line}' (timeout {timeout:?})");

    let fut = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| BenchError::timeout(&line, timeout))?
        .map_err(|e| BenchError::command_failed(&line, e.to_string()))?;

    if !output.status.success() {
        return Err(BenchError::non_zero_exit(&line, output.status.code()));
    }
    Ok(output.stdout)
}

/// Run a command for its side effects, failing on timeout or abnormal exit.
///
/// With `timeout == None` the command may run indefinitely; this is used for
/// load-generator invocations whose duration is set by their own config.
pub async fn run_checked(
    program: &str,
    args: &[&str],
    timeout: Option<Duration>,
) -> BenchResult<()> {
    let line = render(program, args);
    debug!("running '{line}' (timeout {timeout:?})");

    let fut = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .status();

    let status = match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| BenchError::timeout(&line, limit))?,
        None => fut.await,
    }
    .map_err(|e| BenchError::command_failed(&line, e.to_string()))?;

    if !status.success() {
        return Err(BenchError::non_zero_exit(&line, status.code()));
    }
    Ok(())
}

/// Stream a command's stdout into `dest`.
///
/// The destination never retains a partial artifact: on timeout or abnormal
/// exit the file written so far is discarded by the guard.
pub async fn run_to_file(
    program: &str,
    args: &[&str],
    dest: &Path,
    timeout: Duration,
) -> BenchResult<()> {
    let line = render(program, args);
    debug!("capturing '{line}' -> {} (timeout {timeout:?})", dest.display());

    let file = std::fs::File::create(dest)?;
    let guard = ArtifactGuard::new(dest);

    let fut = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(file))
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    let status = tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| BenchError::timeout(&line, timeout))?
        .map_err(|e| BenchError::command_failed(&line, e.to_string()))?;

    if !status.success() {
        return Err(BenchError::non_zero_exit(&line, status.code()));
    }
    guard.commit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_stdout_success() {
        let out = capture_stdout("echo", &["hello"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "hello");
    }

    #[tokio::test]
    async fn test_capture_stdout_missing_binary() {
        let err = capture_stdout("cephbench-no-such-binary", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_checked_nonzero_exit() {
        let err = run_checked("false", &[], Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn test_run_to_file_discards_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("capture.json");

        let err = run_to_file("sleep", &["5"], &dest, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!dest.exists(), "partial artifact must be discarded");
    }

    #[tokio::test]
    async fn test_run_to_file_keeps_complete_capture() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("capture.txt");

        run_to_file("echo", &["payload"], &dest, Duration::from_secs(5))
            .await
            .unwrap();
        let text = std::fs::read_to_string(&dest).unwrap();
        assert_eq!(text.trim(), "payload");
    }
}
