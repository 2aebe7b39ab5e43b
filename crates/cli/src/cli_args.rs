//! Command-line argument parsing and validation.
//!
//! This module defines the command-line interface structure and turns the
//! parsed arguments into a [`Target`] to run, using the `clap` crate.

use clap::Parser;
use shell_facade_core::config::expand_working_directory;
use shell_facade_core::error::{Error, Result};
use shell_facade_core::{ExecOptions, ShellConfig};
use std::time::Duration;

/// Command-line arguments for the shell-facade CLI tool.
///
/// Names before `--` form the command path, everything after it is passed as
/// arguments, each one quoted on its own.
///
/// # Examples
///
/// ```rust
/// use clap::Parser;
/// use shell_facade_cli::cli_args::Args;
///
/// let args = Args::parse_from(["sf", "git", "log", "--", "-n", "3"]);
/// assert_eq!(args.path, ["git", "log"]);
/// ```
#[derive(Parser, Debug)] // requires `derive` feature
#[command(term_width = 0)] // Just to make testing across clap features easier
#[allow(clippy::struct_excessive_bools)] // silence clippy's warning on this struct
pub struct Args {
    /// Path to the shell configuration file YAML.
    ///
    /// If not provided, defaults to `~/.shell-facade/config.yml`.
    #[arg(long, short = 'c')]
    pub config_path: Option<String>,

    /// Print the command line that would run, without running it.
    #[arg(long, short = 'd', action)]
    pub dry_run: bool,

    /// Stream the command's output while it runs instead of printing it at the end.
    ///
    /// Without this flag the `silent` setting of the configuration file decides.
    #[arg(long, short = 's', action)]
    pub stream: bool,

    /// Log every executed command line.
    #[arg(long, short = 'v', action)]
    pub verbose: bool,

    /// Kill the command after this many milliseconds.
    #[arg(long, short = 't')]
    pub timeout: Option<u64>,

    /// Directory to run the command in. `~` is expanded.
    #[arg(long)]
    pub cwd: Option<String>,

    /// Shell used to run the command line.
    #[arg(long)]
    pub shell: Option<String>,

    /// Run a raw command line through the execution entry point instead of a path.
    #[arg(long, short = 'e', conflicts_with = "path")]
    pub exec: Option<String>,

    /// The command path, one segment per name.
    ///
    /// The first name is looked up in the command library, so built-in
    /// commands such as `echo` or `ls` take precedence over programs.
    pub path: Vec<String>,

    /// Arguments for the command, given after `--`.
    ///
    /// # Examples
    /// ```bash
    /// sf git commit -- -m "first commit"
    /// ```
    #[arg(last = true)]
    pub arguments: Vec<String>,
}

/// What the arguments ask to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Exec(String),
    Path(Vec<String>),
}

impl Args {
    /// Determines what to run.
    ///
    /// # Errors
    ///
    /// Returns an error if neither a path nor `--exec` was given, or if
    /// arguments were given alongside `--exec`.
    pub fn target(&self) -> Result<Target> {
        match (&self.exec, self.path.is_empty()) {
            (Some(_), _) if !self.arguments.is_empty() => Err(Error::Misc(
                "Arguments cannot be combined with --exec, put them in the command line"
                    .to_string(),
            )),
            (Some(line), true) => Ok(Target::Exec(line.clone())),
            (Some(_), false) => Err(Error::Misc(
                "A command path cannot be combined with --exec".to_string(),
            )),
            (None, true) => Err(Error::Misc(
                "No command given, pass a command path or --exec".to_string(),
            )),
            (None, false) => Ok(Target::Path(self.path.clone())),
        }
    }

    /// Applies the flags that override the loaded configuration. Flags that
    /// were not given leave the configured values alone.
    pub fn apply_to(&self, config: &mut ShellConfig) {
        if self.stream {
            config.silent = false;
        }
        config.verbose |= self.verbose;
        if let Some(shell) = &self.shell {
            config.exec_path.clone_from(shell);
        }
    }

    /// Per-invocation options for the execution entry point.
    pub fn exec_options(&self) -> ExecOptions {
        let mut options = ExecOptions::default();
        if let Some(timeout) = self.timeout {
            options = options.timeout(Duration::from_millis(timeout));
        }
        if let Some(cwd) = expand_working_directory(&self.cwd) {
            options = options.cwd(cwd);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_args_default_values() {
        let args = Args::parse_from(["sf", "ls"]);

        assert!(args.config_path.is_none());
        assert!(!args.dry_run);
        assert!(!args.stream);
        assert!(!args.verbose);
        assert!(args.timeout.is_none());
        assert!(args.cwd.is_none());
        assert!(args.shell.is_none());
        assert!(args.exec.is_none());
        assert_eq!(args.path, ["ls"]);
        assert!(args.arguments.is_empty());
    }

    #[test]
    fn test_args_short_flags() {
        let args = Args::parse_from([
            "sf",
            "-c",
            "/custom/config.yml",
            "-d",
            "-s",
            "-v",
            "-t",
            "500",
            "git",
        ]);

        assert_eq!(args.config_path, Some("/custom/config.yml".to_string()));
        assert!(args.dry_run);
        assert!(args.stream);
        assert!(args.verbose);
        assert_eq!(args.timeout, Some(500));
    }

    #[test]
    fn test_args_long_flags() {
        let args = Args::parse_from([
            "sf",
            "--config-path",
            "/custom/config.yml",
            "--dry-run",
            "--stream",
            "--verbose",
            "--timeout",
            "250",
            "--cwd",
            "/tmp",
            "--shell",
            "/bin/bash",
            "--exec",
            "ls | wc -l",
        ]);

        assert_eq!(args.config_path, Some("/custom/config.yml".to_string()));
        assert!(args.dry_run);
        assert!(args.stream);
        assert!(args.verbose);
        assert_eq!(args.timeout, Some(250));
        assert_eq!(args.cwd, Some("/tmp".to_string()));
        assert_eq!(args.shell, Some("/bin/bash".to_string()));
        assert_eq!(args.exec, Some("ls | wc -l".to_string()));
    }

    #[test]
    fn test_args_path_and_arguments() {
        let args = Args::parse_from(["sf", "git", "log", "--", "-n", "3"]);

        assert_eq!(args.path, ["git", "log"]);
        assert_eq!(args.arguments, ["-n", "3"]);
        assert_eq!(
            args.target().unwrap(),
            Target::Path(vec!["git".to_string(), "log".to_string()])
        );
    }

    #[test]
    fn test_target_exec() {
        let args = Args::parse_from(["sf", "--exec", "echo hi"]);
        assert_eq!(args.target().unwrap(), Target::Exec("echo hi".to_string()));
    }

    #[test]
    fn test_target_requires_a_command() {
        let args = Args::parse_from(["sf"]);
        assert!(args.target().is_err());
    }

    #[test]
    fn test_exec_rejects_arguments() {
        let args = Args::parse_from(["sf", "--exec", "echo", "--", "hi"]);
        assert!(args.target().is_err());
    }

    #[test]
    fn test_exec_conflicts_with_path() {
        let result = Args::try_parse_from(["sf", "--exec", "echo hi", "git"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_to_config() {
        let args = Args::parse_from(["sf", "--stream", "--verbose", "--shell", "/bin/bash", "ls"]);
        let mut config = ShellConfig::default();
        args.apply_to(&mut config);

        assert!(!config.silent);
        assert!(config.verbose);
        assert_eq!(config.exec_path, "/bin/bash");

        let quiet = Args::parse_from(["sf", "ls"]);
        let mut config = ShellConfig::default();
        quiet.apply_to(&mut config);
        assert!(!config.verbose);
        assert_eq!(config.exec_path, ShellConfig::default().exec_path);
    }

    #[test]
    fn test_unset_flags_keep_configured_values() {
        let args = Args::parse_from(["sf", "ls"]);

        let mut config = ShellConfig {
            silent: true,
            verbose: true,
            ..ShellConfig::default()
        };
        args.apply_to(&mut config);
        assert!(config.silent);
        assert!(config.verbose);

        let mut config = ShellConfig {
            silent: false,
            ..ShellConfig::default()
        };
        args.apply_to(&mut config);
        assert!(!config.silent);

        let streaming = Args::parse_from(["sf", "--stream", "ls"]);
        let mut config = ShellConfig {
            silent: true,
            ..ShellConfig::default()
        };
        streaming.apply_to(&mut config);
        assert!(!config.silent);
    }

    #[test]
    fn test_exec_options_from_flags() {
        let args = Args::parse_from(["sf", "--timeout", "1500", "--cwd", "/tmp", "ls"]);
        let options = args.exec_options();

        assert_eq!(options.timeout_duration(), Some(Duration::from_millis(1500)));
        assert_eq!(options.cwd, Some("/tmp".to_string()));
    }
}
