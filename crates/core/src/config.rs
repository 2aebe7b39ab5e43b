//! Shell configuration and path utilities.
//!
//! The configuration is an explicit object shared between the command library
//! and every façade node built on top of it. Each invocation reads it at call
//! time, so flipping `silent` or `fatal` affects every subsequent call.
//! Mutating it while invocations are in flight is the caller's business: the
//! lock only keeps the individual reads and writes consistent.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Default path for the configuration file
const DEFAULT_CONFIG_PATH: &str = "~/.shell-facade/config.yml";

/// Default shell used to run command lines
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Default cap on captured stdout/stderr, in bytes
pub const DEFAULT_MAX_BUFFER: usize = 20 * 1024 * 1024;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// Suppress echoing of command output to this process' stdout/stderr.
    pub silent: bool,
    /// Raise failures of native commands instead of returning them.
    pub fatal: bool,
    /// Log every executed command line at info level.
    pub verbose: bool,
    /// Disable filename expansion in executed command lines.
    pub noglob: bool,
    /// Shell used to run command lines.
    pub exec_path: String,
    /// Cap on captured output unless an invocation says otherwise.
    pub max_buffer: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            silent: false,
            fatal: false,
            verbose: false,
            noglob: false,
            exec_path: DEFAULT_SHELL.to_string(),
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

/// Handle to a [`ShellConfig`] shared by reference.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Arc<RwLock<ShellConfig>>);

impl SharedConfig {
    pub fn new(config: ShellConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    /// Copy of the configuration as it is right now.
    pub fn snapshot(&self) -> ShellConfig {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<F: FnOnce(&mut ShellConfig)>(&self, change: F) {
        let mut config = self.0.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut config);
    }

    pub fn set_silent(&self, silent: bool) {
        self.update(|config| config.silent = silent);
    }

    pub fn set_fatal(&self, fatal: bool) {
        self.update(|config| config.fatal = fatal);
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.update(|config| config.verbose = verbose);
    }

    pub fn set_noglob(&self, noglob: bool) {
        self.update(|config| config.noglob = noglob);
    }

    pub fn set_exec_path(&self, exec_path: impl Into<String>) {
        let exec_path = exec_path.into();
        self.update(|config| config.exec_path = exec_path);
    }

    /// Restores every setting to its default.
    pub fn reset(&self) {
        self.update(|config| *config = ShellConfig::default());
    }

    /// Whether two handles point at the same configuration.
    #[must_use]
    pub fn same_as(&self, other: &SharedConfig) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<ShellConfig> for SharedConfig {
    fn from(config: ShellConfig) -> Self {
        Self::new(config)
    }
}

/// Resolves the configuration file path.
///
/// If a custom path is provided, uses that path. Otherwise, uses the default
/// configuration path. Shell expansions like `~` are resolved.
///
/// # Examples
///
/// ```
/// use shell_facade_core::config::get_config_path;
///
/// let default_path = get_config_path(&None);
/// assert!(default_path.ends_with("config.yml"));
/// ```
pub fn get_config_path(config_path_arg: &Option<String>) -> String {
    let config_path = match config_path_arg {
        Some(config_path) => config_path,
        None => DEFAULT_CONFIG_PATH,
    };

    shellexpand::tilde(config_path).to_string()
}

/// Expands shell variables in a working directory path.
///
/// Returns None if no working directory is provided.
///
/// # Examples
///
/// ```
/// use shell_facade_core::config::expand_working_directory;
///
/// let expanded = expand_working_directory(&Some("~/projects".to_string()));
/// assert!(expanded.is_some());
///
/// assert!(expand_working_directory(&None).is_none());
/// ```
pub fn expand_working_directory(working_directory: &Option<String>) -> Option<String> {
    working_directory
        .as_ref()
        .map(|working_directory| shellexpand::tilde(working_directory).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_path_with_custom_path() {
        let custom_path = Some("/custom/path/config.yml".to_string());
        let result = get_config_path(&custom_path);
        assert_eq!(result, "/custom/path/config.yml");
    }

    #[test]
    fn test_get_config_path_with_none() {
        let result = get_config_path(&None);
        // Should expand the tilde in the default path
        assert!(result.contains(".shell-facade"));
        assert!(!result.starts_with('~'));
    }

    #[test]
    fn test_expand_working_directory_with_some() {
        let working_dir = Some("~/projects/shell-facade".to_string());
        let expanded = expand_working_directory(&working_dir).unwrap();

        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("projects/shell-facade"));
    }

    #[test]
    fn test_expand_working_directory_without_tilde() {
        let working_dir = Some("/absolute/path".to_string());
        let result = expand_working_directory(&working_dir);
        assert_eq!(result.unwrap(), "/absolute/path");
    }

    #[test]
    fn test_shared_config_mutations_are_observed() {
        let config = SharedConfig::default();
        let other_handle = config.clone();

        other_handle.set_silent(true);
        other_handle.set_fatal(true);
        other_handle.set_exec_path("/bin/bash");

        let snapshot = config.snapshot();
        assert!(snapshot.silent);
        assert!(snapshot.fatal);
        assert_eq!(snapshot.exec_path, "/bin/bash");
        assert!(config.same_as(&other_handle));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let config = SharedConfig::new(ShellConfig {
            silent: true,
            verbose: true,
            ..ShellConfig::default()
        });

        config.reset();

        assert_eq!(config.snapshot(), ShellConfig::default());
    }

    #[test]
    fn test_default_shell_constant() {
        assert_eq!(DEFAULT_SHELL, "/bin/sh");
        assert_eq!(ShellConfig::default().exec_path, DEFAULT_SHELL);
    }
}
