//! The command library a façade wraps.
//!
//! A library exposes named members plus one execution entry point that runs
//! a whole command line. Callable members return an [`Outcome`], which may be
//! a plain value, a result carrying an exit code, work still in progress, or
//! a spawned child process. A member may also fail synchronously with an
//! [`InvocationFailure`].

mod commands;
mod shell;

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Child;

pub use shell::ShellLibrary;

use crate::config::SharedConfig;
use crate::error::{InvocationFailure, ShellError};
use crate::options::ExecOptions;
use crate::shell_string::ShellString;

pub type CommandFn = Arc<dyn Fn(&[Value]) -> Result<Outcome, InvocationFailure> + Send + Sync>;

/// Parses the arguments of a timed member into how long it should wait.
pub type DurationFn = Arc<dyn Fn(&[Value]) -> Result<Duration, InvocationFailure> + Send + Sync>;

pub type PendingOutcome = Pin<Box<dyn Future<Output = Result<Outcome, InvocationFailure>> + Send>>;

/// What a callable member handed back.
pub enum Outcome {
    Value(Value),
    Shell(ShellString),
    Pending(PendingOutcome),
    Child(Child),
}

impl Outcome {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Outcome, InvocationFailure>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }
}

impl From<ShellString> for Outcome {
    fn from(result: ShellString) -> Self {
        Self::Shell(result)
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl Debug for Outcome {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => formatter.debug_tuple("Value").field(value).finish(),
            Self::Shell(result) => formatter.debug_tuple("Shell").field(result).finish(),
            Self::Pending(_) => formatter.write_str("Pending(..)"),
            Self::Child(child) => formatter.debug_tuple("Child").field(&child.id()).finish(),
        }
    }
}

/// A named member of a command library.
#[derive(Clone)]
pub enum Member {
    /// The entry point that runs a raw command line.
    Exec,
    Command(CommandFn),
    /// A blocking wait; the façade schedules it on the async timer.
    Timed(DurationFn),
    Config(SharedConfig),
    Value(Value),
}

impl Member {
    pub fn command<F>(command: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Outcome, InvocationFailure> + Send + Sync + 'static,
    {
        Self::Command(Arc::new(command))
    }

    pub fn timed<F>(duration: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Duration, InvocationFailure> + Send + Sync + 'static,
    {
        Self::Timed(Arc::new(duration))
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Exec | Self::Command(_) | Self::Timed(_))
    }

    /// Calls a command member directly, without any adaptation.
    pub fn invoke(&self, args: &[Value]) -> Option<Result<Outcome, InvocationFailure>> {
        match self {
            Self::Command(command) => Some(command(args)),
            _ => None,
        }
    }
}

impl Debug for Member {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exec => formatter.write_str("Exec"),
            Self::Command(_) => formatter.write_str("Command(..)"),
            Self::Timed(_) => formatter.write_str("Timed(..)"),
            Self::Config(config) => formatter.debug_tuple("Config").field(config).finish(),
            Self::Value(value) => formatter.debug_tuple("Value").field(value).finish(),
        }
    }
}

#[async_trait]
pub trait CommandLibrary: Send + Sync {
    /// Looks up a member by name.
    fn member(&self, name: &str) -> Option<Member>;

    fn member_names(&self) -> Vec<String>;

    fn has_member(&self, name: &str) -> bool {
        self.member(name).is_some()
    }

    /// Runs a command line. A non-zero exit status is returned inside the
    /// [`ShellString`]; `Err` is for failures around the process.
    async fn exec(&self, command: &str, options: &ExecOptions) -> Result<ShellString, ShellError>;

    /// Remembers the latest failure for the library's error accessors.
    fn record_failure(&self, _error: &ShellError) {}
}
