//! Running a command line through the system shell.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Sleep;

use crate::config::{expand_working_directory, ShellConfig};
use crate::error::{ErrorCode, ShellError};
use crate::options::{Encoding, ExecOptions};
use crate::shell_string::ShellString;

const READ_CHUNK: usize = 8 * 1024;

struct Captured {
    bytes: Vec<u8>,
    overflowed: bool,
}

enum Finished {
    Exited(ExitStatus, Captured, Captured),
    TimedOut(Captured, Captured),
    Overflowed(Captured, Captured),
}

/// A killed process: symbolic code, the output captured until then.
fn partial_failure(
    code: &str,
    message: String,
    stdout: Captured,
    stderr: Captured,
    keep_bytes: bool,
) -> ShellError {
    let partial = ShellString::from_bytes(stdout.bytes, stderr.bytes, 1, keep_bytes);
    ShellError {
        code: ErrorCode::named(code),
        message,
        ..ShellError::command_failure(1, partial.stdout, partial.stderr)
    }
}

/// Resolves the working directory for a command: an explicit `cwd` option is
/// tilde-expanded and taken relative to `base`, otherwise `base` itself.
pub fn resolve_cwd(cwd: &Option<String>, base: Option<&Path>) -> Option<PathBuf> {
    match expand_working_directory(cwd) {
        Some(cwd) => {
            let cwd = PathBuf::from(cwd);
            match base {
                Some(base) if cwd.is_relative() => Some(base.join(cwd)),
                _ => Some(cwd),
            }
        }
        None => base.map(Path::to_path_buf),
    }
}

/// Executes `command_line` with `<shell> -c` and captures its output.
///
/// A non-zero exit status is not an error here: it comes back inside the
/// [`ShellString`]. Errors are reserved for failures around the process:
/// it could not be spawned, it ran past its timeout, or its output overflowed
/// `max_buffer`. In the last two cases the process is killed.
///
/// Unless silenced, output is echoed to this process' stdout/stderr while it
/// is being captured.
///
/// # Errors
///
/// Returns a [`ShellError`] carrying `ENOENT`-style, `ETIMEDOUT` or
/// `ERR_CHILD_PROCESS_STDIO_MAXBUFFER` codes for the failures listed above.
pub async fn run_command_line(
    command_line: &str,
    options: &ExecOptions,
    config: &ShellConfig,
    base_directory: Option<&Path>,
) -> Result<ShellString, ShellError> {
    let shell = options.shell.as_deref().unwrap_or(&config.exec_path);
    let silent = options.silent.unwrap_or(config.silent);
    let max_buffer = options.max_buffer.unwrap_or(config.max_buffer);

    if config.verbose {
        info!("exec: {command_line}");
    } else {
        debug!("exec: {command_line}");
    }

    let mut command = Command::new(shell);
    if config.noglob {
        command.arg("-f");
    }
    command
        .arg("-c")
        .arg(command_line)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = resolve_cwd(&options.cwd, base_directory) {
        command.current_dir(cwd);
    }

    if let Some(environment) = &options.env {
        debug!("Executing with environment variables: {:?}", environment);
        command.envs(environment);
    }

    let mut child = command.spawn().map_err(|e| {
        ShellError::invocation(ErrorCode::from_io(&e), format!("exec: {shell}: {e}"))
    })?;

    let timeout = options.timeout_duration();
    let finished = wait_for(&mut child, max_buffer, silent, timeout).await;
    let keep_bytes = options.encoding == Encoding::Buffer;

    match finished {
        Ok(Finished::Exited(status, stdout, stderr)) => Ok(ShellString::from_bytes(
            stdout.bytes,
            stderr.bytes,
            exit_code(status),
            keep_bytes,
        )),
        Ok(Finished::TimedOut(stdout, stderr)) => {
            let limit = timeout.unwrap_or_default();
            warn!("exec: `{command_line}` timed out after {limit:?}, killing it");
            kill(&mut child).await;
            Err(partial_failure(
                ErrorCode::TIMED_OUT,
                format!("exec: timed out after {}ms", limit.as_millis()),
                stdout,
                stderr,
                keep_bytes,
            ))
        }
        Ok(Finished::Overflowed(stdout, stderr)) => {
            warn!("exec: `{command_line}` exceeded maxBuffer of {max_buffer} bytes, killing it");
            kill(&mut child).await;
            let stream = if stdout.overflowed { "stdout" } else { "stderr" };
            Err(partial_failure(
                ErrorCode::MAX_BUFFER,
                format!("{stream} maxBuffer length exceeded"),
                stdout,
                stderr,
                keep_bytes,
            ))
        }
        Err(e) => Err(ShellError::invocation(
            ErrorCode::from_io(&e),
            format!("exec: {e}"),
        )),
    }
}

impl Captured {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            overflowed: false,
        }
    }

    async fn push<W: AsyncWrite + Unpin>(
        &mut self,
        chunk: &[u8],
        limit: usize,
        echo: &mut Option<W>,
    ) -> std::io::Result<()> {
        if let Some(echo) = echo.as_mut() {
            echo.write_all(chunk).await?;
            echo.flush().await?;
        }

        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > limit {
            self.bytes.truncate(limit);
            self.overflowed = true;
        }

        Ok(())
    }
}

async fn read_some<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buffer: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buffer).await,
        None => Ok(0),
    }
}

async fn expired(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.await,
        None => std::future::pending().await,
    }
}

/// Drains both pipes concurrently, then reaps the child. Stops early as soon
/// as either stream goes past `max_buffer` or `timeout` elapses, keeping what
/// was captured so far.
async fn wait_for(
    child: &mut Child,
    max_buffer: usize,
    silent: bool,
    timeout: Option<Duration>,
) -> std::io::Result<Finished> {
    let mut deadline = timeout.map(|limit| Box::pin(tokio::time::sleep(limit)));
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut stdout_echo = (!silent).then(tokio::io::stdout);
    let mut stderr_echo = (!silent).then(tokio::io::stderr);
    let mut stdout_chunk = vec![0u8; READ_CHUNK];
    let mut stderr_chunk = vec![0u8; READ_CHUNK];
    let mut captured_stdout = Captured::new();
    let mut captured_stderr = Captured::new();

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            read = read_some(&mut stdout, &mut stdout_chunk), if stdout.is_some() => {
                match read? {
                    0 => stdout = None,
                    read => {
                        captured_stdout
                            .push(&stdout_chunk[..read], max_buffer, &mut stdout_echo)
                            .await?;
                    }
                }
            }
            read = read_some(&mut stderr, &mut stderr_chunk), if stderr.is_some() => {
                match read? {
                    0 => stderr = None,
                    read => {
                        captured_stderr
                            .push(&stderr_chunk[..read], max_buffer, &mut stderr_echo)
                            .await?;
                    }
                }
            }
            () = expired(&mut deadline) => {
                return Ok(Finished::TimedOut(captured_stdout, captured_stderr));
            }
        }

        if captured_stdout.overflowed || captured_stderr.overflowed {
            return Ok(Finished::Overflowed(captured_stdout, captured_stderr));
        }
    }

    tokio::select! {
        status = child.wait() => Ok(Finished::Exited(status?, captured_stdout, captured_stderr)),
        () = expired(&mut deadline) => Ok(Finished::TimedOut(captured_stdout, captured_stderr)),
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("Could not kill child process: {e}");
    }
}

/// Exit code of a finished process; a signal death maps to `128 + signal`.
#[cfg(unix)]
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
