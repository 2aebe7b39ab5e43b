//! The value every successful command produces.

use std::fmt::{Display, Formatter};
use std::ops::Deref;

use serde::Serialize;

/// Captured output of a command together with its exit code.
///
/// A `ShellString` behaves like its `stdout` text: it displays as it and
/// dereferences to `str`, so `result.lines()` or `result.trim()` work directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShellString {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
    #[serde(skip)]
    pub stdout_bytes: Option<Vec<u8>>,
    #[serde(skip)]
    pub stderr_bytes: Option<Vec<u8>>,
}

impl ShellString {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            code,
            stdout_bytes: None,
            stderr_bytes: None,
        }
    }

    /// Successful output with nothing on stderr.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(stdout, "", 0)
    }

    /// A failed command: message on stderr, no stdout.
    pub fn failure(stderr: impl Into<String>, code: i32) -> Self {
        Self::new("", stderr, code)
    }

    /// Builds the result from raw captured bytes, keeping the bytes around
    /// when `keep_bytes` is set.
    pub fn from_bytes(stdout: Vec<u8>, stderr: Vec<u8>, code: i32, keep_bytes: bool) -> Self {
        let mut result = Self::new(
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr),
            code,
        );

        if keep_bytes {
            result.stdout_bytes = Some(stdout);
            result.stderr_bytes = Some(stderr);
        }

        result
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

impl Display for ShellString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.stdout)
    }
}

impl Deref for ShellString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.stdout
    }
}

impl AsRef<str> for ShellString {
    fn as_ref(&self) -> &str {
        &self.stdout
    }
}
