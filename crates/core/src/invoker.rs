//! Turning a command path plus arguments into one executed command line.

use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use serde_json::Value;

use crate::error::{ErrorCode, ShellError};
use crate::library::CommandLibrary;
use crate::normalize;
use crate::options::ExecOptions;
use crate::shell_string::ShellString;

/// Quotes an argument by JSON-serializing it: strings become double-quoted
/// with embedded quotes escaped, numbers and booleans stay bare.
pub fn quote_argument(argument: &Value) -> String {
    argument.to_string()
}

fn is_shell_safe(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:@%+=,".contains(c))
}

/// Path segments are written as is unless they contain characters the shell
/// would interpret, in which case they are quoted like arguments.
pub fn render_segment(segment: &str) -> String {
    if is_shell_safe(segment) {
        segment.to_string()
    } else {
        quote_argument(&Value::from(segment))
    }
}

/// Joins path segments and quoted arguments with single spaces.
///
/// # Examples
///
/// ```
/// use shell_facade_core::invoker::build_command_line;
///
/// let path = vec!["git".to_string(), "log".to_string()];
/// let line = build_command_line(&path, &["-n".into(), 3.into()]);
/// assert_eq!(line, r#"git log "-n" 3"#);
/// ```
pub fn build_command_line(path: &[String], args: &[Value]) -> String {
    path.iter()
        .map(|segment| render_segment(segment))
        .chain(args.iter().map(quote_argument))
        .join(" ")
}

/// Runs a command line through the library's execution entry point and
/// rejects non-zero exits. Every failure is also recorded with the library.
pub(crate) async fn execute(
    library: &Arc<dyn CommandLibrary>,
    command_line: &str,
    options: ExecOptions,
) -> Result<ShellString, ShellError> {
    let options = options.for_facade();
    debug!("Invoking `{command_line}`");

    let outcome = library
        .exec(command_line, &options)
        .await
        .and_then(normalize::from_shell_string);

    if let Err(error) = &outcome {
        library.record_failure(error);
    }

    outcome
}

/// The execution entry point as seen through the façade: takes a raw command
/// line, bypassing path accumulation.
#[derive(Clone)]
pub struct Exec {
    library: Arc<dyn CommandLibrary>,
}

impl Exec {
    pub(crate) fn new(library: Arc<dyn CommandLibrary>) -> Self {
        Self { library }
    }

    pub async fn call(&self, command_line: &str) -> Result<ShellString, ShellError> {
        self.call_with(command_line, ExecOptions::default()).await
    }

    pub async fn call_with(
        &self,
        command_line: &str,
        options: ExecOptions,
    ) -> Result<ShellString, ShellError> {
        execute(&self.library, command_line, options).await
    }

    /// Calls the entry point with dynamic arguments: a command line, then an
    /// optional options record such as `{"silent": true, "timeout": 50}`.
    ///
    /// A missing command line or a malformed record rejects with `EINVAL`,
    /// and is recorded with the library like any other failure.
    pub async fn call_values(&self, args: &[Value]) -> Result<ShellString, ShellError> {
        match exec_arguments(args) {
            Ok((command_line, options)) => self.call_with(&command_line, options).await,
            Err(error) => {
                self.library.record_failure(&error);
                Err(error)
            }
        }
    }
}

fn exec_arguments(args: &[Value]) -> Result<(String, ExecOptions), ShellError> {
    let command_line = match args.first() {
        Some(Value::String(line)) => line.clone(),
        None | Some(Value::Null) => {
            return Err(ShellError::invocation(
                ErrorCode::named(ErrorCode::INVALID),
                "exec: must specify command",
            ))
        }
        Some(other) => other.to_string(),
    };

    let options = match args.get(1) {
        None | Some(Value::Null) => ExecOptions::default(),
        Some(record) => serde_json::from_value(record.clone()).map_err(|e| {
            ShellError::invocation(
                ErrorCode::named(ErrorCode::INVALID),
                format!("exec: invalid options: {e}"),
            )
        })?,
    };

    Ok((command_line, options))
}

impl std::fmt::Debug for Exec {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("Exec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_are_quoted_independently() {
        let path = vec!["tool".to_string(), "sub".to_string()];
        let line = build_command_line(&path, &["-f".into(), "x y".into()]);
        assert_eq!(line, r#"tool sub "-f" "x y""#);
    }

    #[test]
    fn test_embedded_quotes_are_escaped() {
        let line = build_command_line(&["echo".to_string()], &[r#"say "hi""#.into()]);
        assert_eq!(line, r#"echo "say \"hi\"""#);
    }

    #[test]
    fn test_unsafe_segments_are_quoted() {
        assert_eq!(render_segment("status"), "status");
        assert_eq!(render_segment("--no-pager"), "--no-pager");
        assert_eq!(render_segment("a b"), r#""a b""#);
        assert_eq!(render_segment("a;b"), r#""a;b""#);
        assert_eq!(render_segment(""), r#""""#);
    }

    #[test]
    fn test_exec_arguments() {
        let (line, options) =
            exec_arguments(&["ls".into(), serde_json::json!({"silent": true, "maxBuffer": 8})]).unwrap();
        assert_eq!(line, "ls");
        assert_eq!(options.silent, Some(true));
        assert_eq!(options.max_buffer, Some(8));

        let (_, options) = exec_arguments(&["ls".into()]).unwrap();
        assert_eq!(options, ExecOptions::default());

        let missing = exec_arguments(&[]).unwrap_err();
        assert_eq!(missing.code, ErrorCode::named(ErrorCode::INVALID));

        let malformed = exec_arguments(&["ls".into(), serde_json::json!({"timeout": "soon"})]).unwrap_err();
        assert_eq!(malformed.code, ErrorCode::named(ErrorCode::INVALID));
        assert!(malformed.message.starts_with("exec: invalid options"));
    }

    #[test]
    fn test_no_arguments() {
        let line = build_command_line(&["ls".to_string()], &[]);
        assert_eq!(line, "ls");
    }
}
