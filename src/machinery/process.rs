//! External tool invocation.

use std::process::{Command, Output};

use tracing::{debug, trace};

use crate::error::{PluginError, PluginResult};

/// Exit status `ssh` uses for connection-level failures.
pub const SSH_CONNECTION_FAILURE: i32 = 255;

/// A failed tool run, before it is attributed to a machine.
#[derive(Debug)]
pub(crate) struct ToolFailure {
    pub code: Option<i32>,
    pub message: String,
}

impl ToolFailure {
    pub(crate) fn into_error(self, machine: &str, operation: &str) -> PluginError {
        PluginError::ExternalTool {
            machine: machine.to_owned(),
            operation: operation.to_owned(),
            message: self.message,
        }
    }
}

/// Runs `command` to completion and returns its standard output.
///
/// A non-zero exit is a failure carrying the trimmed standard error (or
/// standard output when stderr is empty).
pub(crate) fn run(command: &mut Command) -> Result<String, ToolFailure> {
    trace!(command = ?command, "running external tool");
    let output = command.output().map_err(|e| ToolFailure {
        code: None,
        message: format!("cannot run {}: {e}", command.get_program().to_string_lossy()),
    })?;
    check(&output)
}

fn check(output: &Output) -> Result<String, ToolFailure> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = if stderr.trim().is_empty() {
        stdout.trim().to_owned()
    } else {
        stderr.trim().to_owned()
    };
    debug!(status = ?output.status.code(), %message, "external tool failed");
    Err(ToolFailure {
        code: output.status.code(),
        message: if message.is_empty() {
            format!("exited with {}", output.status)
        } else {
            message
        },
    })
}

/// Runs `command` and attributes a failure to `machine` and `operation`.
///
/// # Errors
///
/// Returns `PluginError::ExternalTool` if the tool cannot be started or
/// exits unsuccessfully.
pub fn run_for(command: &mut Command, machine: &str, operation: &str) -> PluginResult<String> {
    run(command).map_err(|f| f.into_error(machine, operation))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn successful_command_returns_stdout() {
        let out = run(Command::new("sh").args(["-c", "echo hello"])).unwrap();
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn failing_command_reports_stderr() {
        let failure = run(Command::new("sh").args(["-c", "echo broken >&2; exit 3"])).unwrap_err();
        assert_eq!(failure.code, Some(3));
        assert_eq!(failure.message, "broken");
    }

    #[test]
    fn missing_program_is_a_failure() {
        let err = run_for(
            &mut Command::new("rangeforge-no-such-tool"),
            "target1",
            "up",
        )
        .unwrap_err();
        assert!(matches!(err, PluginError::ExternalTool { ref operation, .. } if operation == "up"));
        assert!(err.to_string().contains("target1"));
    }
}
