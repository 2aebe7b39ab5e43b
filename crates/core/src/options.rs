use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// How captured output is handed back.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Decode as UTF-8 (lossily) only.
    #[default]
    Utf8,
    /// Decode as UTF-8 and also keep the raw bytes.
    Buffer,
}

/// Per-invocation options for the execution entry point.
///
/// Unset fields fall back to the shared [`crate::config::ShellConfig`].
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecOptions {
    /// Accepted for shape only: execution never blocks the caller.
    #[serde(rename = "async")]
    pub async_mode: bool,
    /// Whether a non-zero exit is raised from the library's `exec` instead of
    /// being returned and remembered as the last error.
    pub fatal: Option<bool>,
    pub silent: Option<bool>,
    pub encoding: Encoding,
    /// Milliseconds after which the process is killed.
    pub timeout: Option<u64>,
    pub max_buffer: Option<usize>,
    pub shell: Option<String>,
    pub cwd: Option<String>,
    pub env: Option<HashMap<String, String>>,
}

impl ExecOptions {
    #[must_use]
    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = Some(fatal);
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    #[must_use]
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn max_buffer(mut self, max_buffer: usize) -> Self {
        self.max_buffer = Some(max_buffer);
        self
    }

    #[must_use]
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_millis)
    }

    /// Options as the façade hands them to the execution entry point:
    /// asynchronous always, fatal unless the caller said otherwise.
    #[must_use]
    pub fn for_facade(mut self) -> Self {
        self.fatal = Some(self.fatal.unwrap_or(true));
        self.async_mode = true;
        self
    }
}
