//! Running a parsed [`Target`] through the façade.

use log::debug;
use serde_json::Value;
use shell_facade_core::adapter::{settle, Reply};
use shell_facade_core::error::{Error, ErrorCode, Result, ShellError};
use shell_facade_core::facade::{Facade, Resolved, EXEC_ENTRY_POINT};
use shell_facade_core::invoker::Exec;
use shell_facade_core::library::Member;
use shell_facade_core::{normalize, ExecOptions};

use crate::cli_args::Target;

/// What the CLI will do for a target, decided before anything runs.
#[derive(Debug)]
pub enum Plan {
    /// A raw command line through the execution entry point.
    Exec(Exec, String),
    /// A command path run as one command line.
    Node(Facade),
    /// A library member called directly.
    Member(String, Resolved),
}

impl Plan {
    /// Resolves a target against the root façade.
    ///
    /// The first path segment goes through library dispatch; the rest are
    /// appended as subcommands.
    ///
    /// # Errors
    ///
    /// Returns an error if a library member is followed by more segments or
    /// the first segment resolves to nothing.
    pub fn resolve(root: &Facade, target: &Target) -> Result<Self> {
        let path = match target {
            Target::Exec(line) => {
                return match root.resolve(EXEC_ENTRY_POINT) {
                    Resolved::Exec(exec) => Ok(Self::Exec(exec, line.clone())),
                    _ => Err(Error::Misc("The command library has no exec".to_string())),
                }
            }
            Target::Path(path) => path,
        };

        let Some((first, rest)) = path.split_first() else {
            return Err(Error::Misc("Empty command path".to_string()));
        };

        match root.resolve(first) {
            Resolved::Node(node) => Ok(Self::Node(
                rest.iter().fold(node, |node, segment| node.sub(segment)),
            )),
            Resolved::Exec(_) => Err(Error::Misc(
                "Use --exec to run a raw command line".to_string(),
            )),
            Resolved::Undefined => Err(Error::Misc(format!("`{first}` is not a command"))),
            resolved if rest.is_empty() => Ok(Self::Member(first.clone(), resolved)),
            _ => Err(Error::Misc(format!(
                "`{first}` is a library member and takes no subcommands"
            ))),
        }
    }

    /// Whether the child's output reaches the terminal while it runs, when
    /// the configuration is not silent. Library members only return theirs.
    pub fn streams_output(&self) -> bool {
        matches!(self, Self::Exec(..) | Self::Node(_))
    }

    /// Describes what would run, for dry runs.
    pub fn describe(&self, arguments: &[String]) -> String {
        match self {
            Self::Exec(_, line) => line.clone(),
            Self::Node(node) => node.command_line(arguments.iter().cloned()),
            Self::Member(name, _) => {
                let arguments: Vec<Value> = arguments.iter().cloned().map(Value::from).collect();
                format!("{name}({})", Value::from(arguments))
            }
        }
    }

    /// Runs the plan.
    ///
    /// # Errors
    ///
    /// A failed command surfaces as [`Error::Shell`].
    pub async fn run(self, arguments: Vec<String>, options: ExecOptions) -> Result<Reply> {
        debug!("Running {self:?} with {arguments:?}");

        match self {
            Self::Exec(exec, line) => Ok(Reply::Shell(exec.call_with(&line, options).await?)),
            Self::Node(node) => Ok(Reply::Shell(node.call_with(arguments, options).await?)),
            Self::Member(name, Resolved::Member(member)) => {
                run_member(&name, &member, &arguments).await
            }
            Self::Member(_, resolved) => Ok(resolved.call(arguments).await?),
        }
    }
}

async fn run_member(name: &str, member: &Member, arguments: &[String]) -> Result<Reply> {
    match member {
        Member::Config(config) => serde_json::to_value(config.snapshot())
            .map(Reply::Value)
            .map_err(|e| Error::Misc(format!("Cannot serialize configuration: {e}"))),
        Member::Value(value) => Ok(Reply::Value(value.clone())),
        member => {
            let arguments: Vec<Value> = arguments.iter().cloned().map(Value::from).collect();
            let outcome = member
                .invoke(&arguments)
                .ok_or_else(|| Error::Misc(format!("`{name}` cannot be called")))?
                .map_err(normalize::from_failure)?;
            Ok(settle(outcome).await?)
        }
    }
}

/// Exit status for a failed command: its own code when it has one.
pub fn exit_status(error: &ShellError) -> u8 {
    match error.code {
        ErrorCode::Exit(code) => u8::try_from(code).ok().filter(|code| *code != 0).unwrap_or(1),
        ErrorCode::Named(_) => 1,
    }
}
