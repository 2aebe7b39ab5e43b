use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use itertools::Itertools;
use log::{debug, error, info};
use serde_json::Value;

use super::commands::{self, Native, NativeFailure};
use super::{CommandLibrary, Member, Outcome};
use crate::config::SharedConfig;
use crate::error::{InvocationFailure, ShellError};
use crate::execution::run_command_line;
use crate::options::ExecOptions;
use crate::shell_string::ShellString;

const NATIVE_COMMANDS: [(&str, Native); 12] = [
    ("cat", commands::cat),
    ("cd", commands::cd),
    ("echo", commands::echo),
    ("ls", commands::ls),
    ("mkdir", commands::mkdir),
    ("pwd", commands::pwd),
    ("rm", commands::rm),
    ("set", commands::set),
    ("tempdir", commands::tempdir),
    ("test", commands::test),
    ("touch", commands::touch),
    ("which", commands::which),
];

const OTHER_MEMBERS: [&str; 7] = ["config", "dirs", "env", "error", "errorCode", "exec", "sleep"];

#[derive(Debug)]
pub(super) struct State {
    pub cwd: PathBuf,
    pub previous: Option<PathBuf>,
    pub error: Option<String>,
    pub error_code: i32,
    pub tempdir: Option<PathBuf>,
}

#[derive(Debug)]
pub(super) struct Inner {
    pub config: SharedConfig,
    state: Mutex<State>,
}

impl Inner {
    pub fn with_state<T, F: FnOnce(&mut State) -> T>(&self, f: F) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn cwd(&self) -> PathBuf {
        self.with_state(|state| state.cwd.clone())
    }

    /// Resolves `path` the way a shell would from the library's directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(path).to_string());
        if expanded.is_absolute() {
            expanded
        } else {
            self.cwd().join(expanded)
        }
    }

    fn reset_error(&self) {
        self.with_state(|state| {
            state.error = None;
            state.error_code = 0;
        });
    }

    fn set_error(&self, message: &str, code: i32) {
        self.with_state(|state| {
            state.error = Some(message.to_string());
            state.error_code = code;
        });
    }
}

/// Built-in command library: runs command lines through the configured shell
/// and implements a handful of file-system commands natively.
///
/// The library keeps its own working directory (`cd` changes it, `exec` and
/// the native commands start from it) so several libraries can live in one
/// process without stepping on each other.
#[derive(Debug, Clone)]
pub struct ShellLibrary {
    inner: Arc<Inner>,
}

impl ShellLibrary {
    /// Creates a library rooted at the process' current directory.
    pub fn new(config: SharedConfig) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self::with_cwd(config, cwd)
    }

    pub fn with_cwd(config: SharedConfig, cwd: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    cwd: cwd.into(),
                    previous: None,
                    error: None,
                    error_code: 0,
                    tempdir: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.inner.config
    }

    pub fn cwd(&self) -> PathBuf {
        self.inner.cwd()
    }

    /// Message of the latest failure, if the latest command failed.
    pub fn error(&self) -> Option<String> {
        self.inner.with_state(|state| state.error.clone())
    }

    /// Exit code of the latest failure, 0 if the latest command succeeded.
    pub fn error_code(&self) -> i32 {
        self.inner.with_state(|state| state.error_code)
    }

    fn native_member(&self, name: &'static str, native: Native) -> Member {
        let inner = Arc::clone(&self.inner);
        Member::command(move |args| run_native(&inner, name, native, args))
    }

    fn accessor<F>(&self, read: F) -> Member
    where
        F: Fn(&Inner) -> Value + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.inner);
        Member::command(move |_args| Ok(Outcome::Value(read(&inner))))
    }
}

/// Runs a native command and applies the library's failure policy: with
/// `fatal` on the failure is raised, otherwise it is returned as a result
/// with a non-zero code.
fn run_native(
    inner: &Inner,
    name: &str,
    native: Native,
    args: &[Value],
) -> Result<Outcome, InvocationFailure> {
    inner.reset_error();
    if inner.config.snapshot().verbose {
        info!("{name} {}", args.iter().map(Value::to_string).join(" "));
    }

    match native(inner, args) {
        Ok(outcome) => Ok(outcome),
        Err(NativeFailure { message, code }) => {
            let message = format!("{name}: {message}");
            inner.set_error(&message, code);

            if inner.config.snapshot().fatal {
                error!("{message}");
                Err(InvocationFailure::new(code, message))
            } else {
                debug!("{message}");
                Ok(Outcome::Shell(ShellString::failure(message, code)))
            }
        }
    }
}

#[async_trait]
impl CommandLibrary for ShellLibrary {
    fn member(&self, name: &str) -> Option<Member> {
        if let Some((name, native)) = NATIVE_COMMANDS.iter().find(|(n, _)| *n == name) {
            return Some(self.native_member(*name, *native));
        }

        let member = match name {
            "exec" => Member::Exec,
            "sleep" => Member::timed(commands::sleep_duration),
            "config" => Member::Config(self.inner.config.clone()),
            "env" => Member::Value(commands::environment()),
            "error" => self.accessor(|inner| {
                inner.with_state(|state| state.error.clone().map_or(Value::Null, Value::from))
            }),
            "errorCode" => self.accessor(|inner| inner.with_state(|state| state.error_code.into())),
            "dirs" => self.accessor(|inner| {
                Value::from(vec![inner.cwd().to_string_lossy().to_string()])
            }),
            _ => return None,
        };

        Some(member)
    }

    fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = NATIVE_COMMANDS
            .iter()
            .map(|(name, _)| name.to_string())
            .chain(OTHER_MEMBERS.iter().map(ToString::to_string))
            .collect();
        names.sort();
        names
    }

    async fn exec(&self, command: &str, options: &ExecOptions) -> Result<ShellString, ShellError> {
        self.inner.reset_error();
        let config = self.inner.config.snapshot();
        let cwd = self.inner.cwd();

        let fatal = options.fatal.unwrap_or(config.fatal);
        let result = run_command_line(command, options, &config, Some(Path::new(&cwd))).await?;
        if result.is_success() {
            return Ok(result);
        }

        // A fatal exec raises; otherwise the failure is only remembered.
        let error = ShellError::command_failure(result.code, result.stdout.clone(), result.stderr.clone());
        if fatal {
            return Err(error);
        }
        self.record_failure(&error);
        Ok(result)
    }

    fn record_failure(&self, error: &ShellError) {
        let code = error.code.exit_code().unwrap_or(1);
        let message = if error.message.starts_with("exec: ") {
            error.message.clone()
        } else {
            format!("exec: {}", error.message)
        };
        self.inner.set_error(&message, code);

        if self.inner.config.snapshot().fatal {
            error!("{message} (code {})", error.code);
        }
    }
}
