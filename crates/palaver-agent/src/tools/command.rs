//! Shared subprocess runner for tools that shell out to external binaries.

use std::path::Path;
use std::process::Stdio;

use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

/// Cap on captured stdout/stderr fed back to the model.
const MAX_CAPTURE: usize = 16 * 1024;

fn capture(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_CAPTURE {
        return text.into_owned();
    }
    let mut cut = MAX_CAPTURE;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n... (truncated)", &text[..cut])
}

/// Run `program` with `args` and report the outcome as a JSON payload.
///
/// A non-zero exit is a reportable result, not an error: the payload always
/// carries `success`, `exit_code`, `stdout` and `stderr`. A spawn failure
/// (binary missing, permission denied) reports `exit_code: -1` with the
/// failure in `message`.
pub async fn run_reporting_command(program: &str, args: &[&str], cwd: &Path) -> Value {
    debug!(%program, ?args, "running tool command");

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    match output {
        Ok(output) => {
            let exit_code = output.status.code().unwrap_or(-1);
            json!({
                "success": output.status.success(),
                "exit_code": exit_code,
                "stdout": capture(&output.stdout),
                "stderr": capture(&output.stderr),
            })
        }
        Err(err) => json!({
            "success": false,
            "exit_code": -1,
            "stdout": "",
            "stderr": "",
            "message": format!("failed to run {program}: {err}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_reporting_command("true", &[], dir.path()).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["exit_code"], 0);
    }

    #[tokio::test]
    async fn test_failing_command_is_reported_not_thrown() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_reporting_command("false", &[], dir.path()).await;
        assert_eq!(result["success"], false);
        assert_eq!(result["exit_code"], 1);
    }

    #[tokio::test]
    async fn test_missing_binary_reports_minus_one() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            run_reporting_command("palaver-no-such-binary-xyz", &[], dir.path()).await;
        assert_eq!(result["success"], false);
        assert_eq!(result["exit_code"], -1);
        assert!(result["message"].as_str().unwrap().contains("failed to run"));
    }

    #[tokio::test]
    async fn test_stdout_captured() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_reporting_command("echo", &["hello"], dir.path()).await;
        assert_eq!(result["stdout"].as_str().unwrap().trim(), "hello");
    }
}
