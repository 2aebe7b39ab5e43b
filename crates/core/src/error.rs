use std::fmt::{Display, Formatter};

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot modify reserved attribute '{}'", .0)]
    ReservedAttributeModify(String),

    #[error("Cannot delete reserved attribute '{}'", .0)]
    ReservedAttributeDelete(String),

    #[error("{}", .0)]
    Shell(#[from] ShellError),

    #[error("Error {} {} file at `{}`: {}", .action, .file_description, .path, .original)]
    Yaml {
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    },

    #[error("IO error with {} file at path `{}`: {}", .file_description, .path, .original)]
    Io {
        file_description: String,
        path: String,
        original: std::io::Error,
    },

    #[error("STDIO error: {}", .0)]
    Stdio(#[from] std::io::Error),

    #[error("Misc error: {}", .0)]
    Misc(String),
}

impl Error {
    pub fn yaml_error(
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    ) -> Self {
        Self::Yaml {
            action,
            file_description,
            path,
            original,
        }
    }

    pub fn io_error(file_description: String, path: String, original: std::io::Error) -> Self {
        Self::Io {
            file_description,
            path,
            original,
        }
    }

    /// Whether this is an attempt to write or delete the reserved path slot.
    #[must_use]
    pub fn is_reserved_attribute_violation(&self) -> bool {
        matches!(
            self,
            Self::ReservedAttributeModify(_) | Self::ReservedAttributeDelete(_)
        )
    }
}

/// Code carried by a [`ShellError`].
///
/// Commands that ran to completion report their numeric exit status. Failures
/// that happened around the process (spawn errors, timeouts, overflowing
/// output) carry a symbolic code instead, such as `ENOENT` or `ETIMEDOUT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Exit(i32),
    Named(String),
}

impl ErrorCode {
    pub const TIMED_OUT: &'static str = "ETIMEDOUT";
    pub const MAX_BUFFER: &'static str = "ERR_CHILD_PROCESS_STDIO_MAXBUFFER";
    pub const INVALID: &'static str = "EINVAL";

    pub fn named(code: &str) -> Self {
        Self::Named(code.to_string())
    }

    /// Best-effort symbolic code for an I/O failure.
    pub fn from_io(error: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match error.kind() {
            ErrorKind::NotFound => "ENOENT",
            ErrorKind::PermissionDenied => "EACCES",
            ErrorKind::AlreadyExists => "EEXIST",
            ErrorKind::InvalidInput => Self::INVALID,
            ErrorKind::TimedOut => Self::TIMED_OUT,
            ErrorKind::BrokenPipe => "EPIPE",
            _ => "EIO",
        };

        Self::named(code)
    }

    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit(code) => Some(*code),
            Self::Named(_) => None,
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exit(code) => write!(formatter, "{code}"),
            Self::Named(code) => formatter.write_str(code),
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        Self::Exit(code)
    }
}

/// The `type` tag of every [`ShellError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Shell,
}

/// Uniform failure shape for every rejected invocation.
///
/// Serializes to `{ code, message, stdout, stderr, type: "shell" }`.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message}")]
pub struct ShellError {
    pub code: ErrorCode,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
}

impl ShellError {
    /// A command that ran and exited non-zero. The message is its stderr.
    pub fn command_failure(code: i32, stdout: String, stderr: String) -> Self {
        Self {
            code: ErrorCode::Exit(code),
            message: stderr.clone(),
            stdout,
            stderr,
            kind: ErrorKind::Shell,
        }
    }

    /// A failure around the invocation itself (the callable raised, the
    /// process could not be spawned, ...).
    pub fn invocation(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code,
            stderr: message.clone(),
            message,
            stdout: String::new(),
            kind: ErrorKind::Shell,
        }
    }

    #[must_use]
    pub fn with_stdout(mut self, stdout: String) -> Self {
        self.stdout = stdout;
        self
    }

    #[must_use]
    pub fn is_command_failure(&self) -> bool {
        matches!(self.code, ErrorCode::Exit(_))
    }
}

/// Synchronous failure raised by a library member instead of returning.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct InvocationFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl InvocationFailure {
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
