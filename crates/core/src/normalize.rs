//! Turns every way a command can fail into a [`ShellError`].
//!
//! Failures arrive as a result with a non-zero exit code, as a synchronous
//! [`InvocationFailure`], as a rejected pending outcome, or as a child process
//! that exits badly or cannot be waited on. All of them leave here with the
//! same `{ code, message, stdout, stderr, type: "shell" }` shape.

use log::debug;
use tokio::process::Child;

use crate::error::{ErrorCode, InvocationFailure, ShellError};
use crate::execution::exit_code;
use crate::shell_string::ShellString;

/// Passes a successful result through unchanged and rejects a non-zero one.
pub fn from_shell_string(result: ShellString) -> Result<ShellString, ShellError> {
    if result.is_success() {
        return Ok(result);
    }

    debug!("Command exited with code {}", result.code);
    Err(ShellError::command_failure(
        result.code,
        result.stdout,
        result.stderr,
    ))
}

pub fn from_failure(failure: InvocationFailure) -> ShellError {
    ShellError::invocation(failure.code, failure.message)
}

pub fn from_io(error: &std::io::Error) -> ShellError {
    ShellError::invocation(ErrorCode::from_io(error), error.to_string())
}

/// Waits for a child to finish and normalizes its exit.
pub async fn from_child(child: Child) -> Result<ShellString, ShellError> {
    let output = child.wait_with_output().await.map_err(|e| from_io(&e))?;
    from_shell_string(ShellString::from_bytes(
        output.stdout,
        output.stderr,
        exit_code(output.status),
        false,
    ))
}
