use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::CollaboratorError;

/// Run an argv to completion and return its trimmed stdout.
///
/// The child is killed if `timeout` elapses first.
pub async fn run_command(argv: &[String], timeout: Duration) -> Result<String, CollaboratorError> {
    let (program, args) = argv.split_first().ok_or(CollaboratorError::NoCommand)?;
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);
    debug!(program = %program, args = args.len(), "running command");

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result.map_err(|source| CollaboratorError::Spawn {
            program: program.clone(),
            source,
        })?,
        Err(_) => {
            return Err(CollaboratorError::Timeout {
                program: program.clone(),
                after: timeout,
            });
        }
    };

    if !output.status.success() {
        return Err(CollaboratorError::Failed {
            program: program.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        let err = run_command(&[], Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NoCommand));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_trimmed_stdout() {
        let out = run_command(&argv(&["sh", "-c", "echo '  hello  '"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let err = run_command(&argv(&["sh", "-c", "echo boom >&2; exit 3"]), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            CollaboratorError::Failed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run_command(&argv(&["sleep", "5"]), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let err = run_command(&argv(&["/nonexistent/verse-script"]), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Spawn { .. }));
    }
}
