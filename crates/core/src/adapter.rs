//! Future-returning wrappers around library members.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::error::ShellError;
use crate::library::{CommandFn, DurationFn, Outcome};
use crate::normalize;
use crate::shell_string::ShellString;

pub type ReplyFuture = Pin<Box<dyn Future<Output = Result<Reply, ShellError>> + Send>>;

/// What a successfully settled call resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Shell(ShellString),
    Value(Value),
}

impl Reply {
    pub fn into_shell(self) -> Option<ShellString> {
        match self {
            Self::Shell(result) => Some(result),
            Self::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Shell(_) => None,
        }
    }

    /// Text form: a result's stdout, a string value as is, other values as JSON.
    pub fn to_text(&self) -> String {
        match self {
            Self::Shell(result) => result.stdout.clone(),
            Self::Value(Value::String(text)) => text.clone(),
            Self::Value(Value::Null) => String::new(),
            Self::Value(value) => value.to_string(),
        }
    }
}

impl From<ShellString> for Reply {
    fn from(result: ShellString) -> Self {
        Self::Shell(result)
    }
}

/// Settles whatever a member returned into a [`Reply`] or a [`ShellError`].
pub fn settle(outcome: Outcome) -> ReplyFuture {
    Box::pin(async move {
        match outcome {
            Outcome::Value(value) => Ok(Reply::Value(value)),
            Outcome::Shell(result) => normalize::from_shell_string(result).map(Reply::Shell),
            Outcome::Pending(pending) => match pending.await {
                Ok(outcome) => settle(outcome).await,
                Err(failure) => Err(normalize::from_failure(failure)),
            },
            Outcome::Child(child) => normalize::from_child(child).await.map(Reply::Shell),
        }
    })
}

pub(crate) fn collect_args<I, A>(args: I) -> Vec<Value>
where
    I: IntoIterator<Item = A>,
    A: Into<Value>,
{
    args.into_iter().map(Into::into).collect()
}

/// A callable library member adapted to return a future.
///
/// The member runs exactly once, synchronously, when [`WrappedCommand::call`]
/// is made; the returned future only settles its outcome.
#[derive(Clone)]
pub struct WrappedCommand {
    name: String,
    command: CommandFn,
}

impl WrappedCommand {
    pub fn new(name: impl Into<String>, command: CommandFn) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call<I, A>(&self, args: I) -> ReplyFuture
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        let args = collect_args(args);
        debug!("Calling wrapped `{}` with {:?}", self.name, args);

        match (self.command)(&args) {
            Ok(outcome) => settle(outcome),
            Err(failure) => {
                let error = normalize::from_failure(failure);
                Box::pin(async move { Err(error) })
            }
        }
    }
}

impl std::fmt::Debug for WrappedCommand {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("WrappedCommand")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A blocking member (such as `sleep`) that is instead awaited on the
/// runtime's timer, so other invocations keep running while it waits.
#[derive(Clone)]
pub struct TimedCommand {
    name: String,
    duration: DurationFn,
}

impl TimedCommand {
    pub fn new(name: impl Into<String>, duration: DurationFn) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Always true: callers must await this instead of blocking on it.
    pub fn is_async(&self) -> bool {
        true
    }

    pub fn duration<I, A>(&self, args: I) -> Result<Duration, ShellError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        (self.duration)(&collect_args(args)).map_err(normalize::from_failure)
    }

    pub fn call<I, A>(&self, args: I) -> ReplyFuture
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        let duration = self.duration(args);
        Box::pin(async move {
            tokio::time::sleep(duration?).await;
            Ok(Reply::Shell(ShellString::ok("")))
        })
    }
}

impl std::fmt::Debug for TimedCommand {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TimedCommand")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
