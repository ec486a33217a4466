use std::ffi::OsStr;
use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Runs `program` to completion and returns its stdout.
///
/// A non-zero exit status becomes [`Error::ToolFailed`] carrying stderr.
pub(crate) async fn run<I, S>(program: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    debug!("running {:?}", command.as_std());

    let output = command.output().await?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(Error::ToolFailed {
            program: program.display().to_string(),
            status: output.status,
            stderr: stderr.trim().to_owned(),
        });
    }
    if !stderr.trim().is_empty() {
        debug!("{} stderr: {}", program.display(), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run(Path::new("sh"), ["-c", "echo hello"]).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_reports_failure() {
        let err = run(Path::new("sh"), ["-c", "echo oops >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            Error::ToolFailed { stderr, status, .. } => {
                assert_eq!(stderr, "oops");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
