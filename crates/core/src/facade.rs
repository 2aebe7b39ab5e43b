//! Façade nodes and the dispatch that decides what a name resolves to.
//!
//! A [`Facade`] stands for a (possibly empty) command path. The root node has
//! an empty path and is bound to the wrapped [`CommandLibrary`]; every other
//! node is synthesized on demand when an unknown name is resolved, and exists
//! only to accumulate path segments until it is called.
//!
//! ```no_run
//! use shell_facade_core::{shell, SharedConfig};
//!
//! # async fn run() -> Result<(), shell_facade_core::ShellError> {
//! let root = shell(SharedConfig::default());
//!
//! // Runs `git log "--oneline" "-n" "3"`
//! let log = root.sub("git").sub("log").call(["--oneline", "-n", "3"]).await?;
//! println!("{log}");
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use serde_json::Value;

use crate::adapter::{collect_args, Reply, ReplyFuture, TimedCommand, WrappedCommand};
use crate::error::{Error, ErrorCode, Result, ShellError};
use crate::invoker::{self, build_command_line, Exec};
use crate::library::{CommandLibrary, Member};
use crate::options::ExecOptions;
use crate::shell_string::ShellString;

/// A pending command-path invocation.
pub type Invocation = Pin<Box<dyn Future<Output = std::result::Result<ShellString, ShellError>> + Send>>;

/// Slot holding a node's command path. Readable, never writable or deletable.
pub const RESERVED_ATTRIBUTE: &str = "__cmdStart__";

/// Name of the library's execution entry point.
pub const EXEC_ENTRY_POINT: &str = "exec";

/// Root members handed back untouched: their natural value is not a command
/// result (configuration, accessors, process control).
pub const PASS_THROUGH: [&str; 10] = [
    "error",
    "errorCode",
    "ShellString",
    "env",
    "config",
    "dirs",
    "popd",
    "pushd",
    "clear",
    "exit",
];

/// Introspection names that never synthesize a child node, at any depth.
pub const NO_WRAP: [&str; 3] = ["inspect", "valueOf", "stdout"];

/// What resolving a name on a [`Facade`] produced.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// The execution entry point, taking a raw command line.
    Exec(Exec),
    /// A library member returned unmodified.
    Member(Member),
    Timed(TimedCommand),
    Wrapped(WrappedCommand),
    /// A concrete attribute of the node (including the reserved slot).
    Value(Value),
    /// A no-wrap name with nothing behind it.
    Undefined,
    Node(Facade),
}

impl Resolved {
    pub fn into_node(self) -> Option<Facade> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Calls whatever was resolved, if it can be called through the façade.
    ///
    /// `Exec` takes a command line and an optional options record. Members handed
    /// back unmodified, plain values and `Undefined` reject with `EINVAL`;
    /// call a pass-through member through [`Member::invoke`] instead.
    pub fn call<I, A>(&self, args: I) -> ReplyFuture
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        match self {
            Self::Wrapped(command) => command.call(args),
            Self::Timed(command) => command.call(args),
            Self::Node(node) => {
                let invocation = node.call(args);
                Box::pin(async move { invocation.await.map(Reply::Shell) })
            }
            Self::Exec(exec) => {
                let exec = exec.clone();
                let args = collect_args(args);
                Box::pin(async move { exec.call_values(&args).await.map(Reply::Shell) })
            }
            Self::Member(_) | Self::Value(_) | Self::Undefined => {
                Box::pin(async { Err(not_callable()) })
            }
        }
    }
}

fn not_callable() -> ShellError {
    ShellError::invocation(
        ErrorCode::named(ErrorCode::INVALID),
        "resolved value is not callable",
    )
}

/// A node of the command-path tree.
///
/// Cloning a node copies its path handle and attributes; the library stays
/// shared by reference.
#[derive(Clone)]
pub struct Facade {
    path: Arc<[String]>,
    library: Arc<dyn CommandLibrary>,
    attributes: IndexMap<String, Value>,
}

impl Facade {
    /// Creates the root node, bound to `library`.
    pub fn new(library: Arc<dyn CommandLibrary>) -> Self {
        Self {
            path: Arc::from(Vec::new()),
            library,
            attributes: IndexMap::new(),
        }
    }

    fn child(&self, name: &str) -> Self {
        let path: Vec<String> = self
            .path
            .iter()
            .cloned()
            .chain(std::iter::once(name.to_string()))
            .collect();

        Self {
            path: Arc::from(path),
            library: Arc::clone(&self.library),
            attributes: IndexMap::new(),
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The wrapped library. Only the root is bound to it.
    pub fn bound_target(&self) -> Option<&Arc<dyn CommandLibrary>> {
        self.is_root().then_some(&self.library)
    }

    /// Resolves `name` the way attribute access on the node would.
    ///
    /// Concrete attributes of the node come first. On the root, names the
    /// library knows then map to its members (adapted where needed), followed
    /// by the no-wrap names. Any other name yields a new child node whose path is
    /// this node's path extended by `name`.
    pub fn resolve(&self, name: &str) -> Resolved {
        if let Some(value) = self.get(name) {
            return Resolved::Value(value);
        }

        if self.is_root() {
            if let Some(member) = self.library.member(name) {
                return self.resolve_member(name, member);
            }
        }

        if NO_WRAP.contains(&name) {
            debug!("`{name}` is never wrapped, resolving to nothing");
            return Resolved::Undefined;
        }

        Resolved::Node(self.child(name))
    }

    fn resolve_member(&self, name: &str, member: Member) -> Resolved {
        if name == EXEC_ENTRY_POINT || matches!(member, Member::Exec) {
            return Resolved::Exec(Exec::new(Arc::clone(&self.library)));
        }

        if PASS_THROUGH.contains(&name) {
            return Resolved::Member(member);
        }

        match member {
            Member::Timed(duration) => Resolved::Timed(TimedCommand::new(name, duration)),
            Member::Command(command) => Resolved::Wrapped(WrappedCommand::new(name, command)),
            Member::Value(value) => Resolved::Value(value),
            other => Resolved::Member(other),
        }
    }

    /// Child node for `name`, whatever the name. This is the explicit form of
    /// chaining onto an unknown subcommand.
    #[must_use]
    pub fn sub(&self, name: &str) -> Self {
        self.child(name)
    }

    /// Reads a concrete attribute. The reserved slot reads as the path.
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == RESERVED_ATTRIBUTE {
            return Some(Value::from(self.path.to_vec()));
        }
        self.attributes.get(name).cloned()
    }

    /// Stores an attribute on the node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedAttributeModify`] for the reserved slot.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if name == RESERVED_ATTRIBUTE {
            return Err(Error::ReservedAttributeModify(name.to_string()));
        }
        self.attributes.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Removes an attribute, returning its previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedAttributeDelete`] for the reserved slot.
    pub fn delete(&mut self, name: &str) -> Result<Option<Value>> {
        if name == RESERVED_ATTRIBUTE {
            return Err(Error::ReservedAttributeDelete(name.to_string()));
        }
        Ok(self.attributes.shift_remove(name))
    }

    /// Whether `name` is a concrete key of the node. Children that would be
    /// synthesized on access do not count.
    pub fn has(&self, name: &str) -> bool {
        name == RESERVED_ATTRIBUTE
            || self.attributes.contains_key(name)
            || (self.is_root() && self.library.has_member(name))
    }

    /// Concrete keys of the node: the reserved slot, its own attributes, and
    /// on the root the library's members.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = vec![RESERVED_ATTRIBUTE.to_string()];
        keys.extend(self.attributes.keys().cloned());
        if self.is_root() {
            keys.extend(
                self.library
                    .member_names()
                    .into_iter()
                    .filter(|name| !self.attributes.contains_key(name)),
            );
        }
        keys
    }

    /// The command line a call with `args` would run.
    pub fn command_line<I, A>(&self, args: I) -> String
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        build_command_line(&self.path, &collect_args(args))
    }

    /// Runs this node's path as a command with `args`.
    ///
    /// Resolves with the captured output on exit code 0 and rejects with a
    /// [`ShellError`] otherwise. The root has no command to run and rejects
    /// with `EINVAL`.
    pub fn call<I, A>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        self.call_with(args, ExecOptions::default())
    }

    /// Like [`Facade::call`], with options for the execution entry point.
    pub fn call_with<I, A>(
        &self,
        args: I,
        options: ExecOptions,
    ) -> Invocation
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        let is_root = self.is_root();
        let command_line = self.command_line(args);
        let library = Arc::clone(&self.library);

        Box::pin(async move {
            if is_root {
                return Err(ShellError::invocation(
                    ErrorCode::named(ErrorCode::INVALID),
                    "the root façade has no command to run",
                ));
            }
            invoker::execute(&library, &command_line, options).await
        })
    }
}

impl std::fmt::Debug for Facade {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Facade")
            .field("path", &self.path)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SharedConfig, ShellConfig};
    use crate::library::ShellLibrary;

    fn root() -> Facade {
        let config = SharedConfig::new(ShellConfig {
            silent: true,
            ..ShellConfig::default()
        });
        Facade::new(Arc::new(ShellLibrary::new(config)))
    }

    #[test]
    fn test_unknown_names_accumulate_path() {
        let node = root()
            .resolve("tool")
            .into_node()
            .unwrap()
            .resolve("nested")
            .into_node()
            .unwrap();

        assert_eq!(node.path(), ["tool", "nested"]);
        assert_eq!(node.command_line(["-f", "x y"]), r#"tool nested "-f" "x y""#);
    }

    #[test]
    fn test_library_names_below_root_are_subcommands() {
        let node = root().sub("git").resolve("echo").into_node().unwrap();
        assert_eq!(node.path(), ["git", "echo"]);
    }

    #[test]
    fn test_root_members_are_dispatched() {
        let root = root();

        assert!(matches!(root.resolve("exec"), Resolved::Exec(_)));
        assert!(matches!(root.resolve("echo"), Resolved::Wrapped(_)));
        assert!(matches!(root.resolve("config"), Resolved::Member(Member::Config(_))));
        assert!(matches!(root.resolve("error"), Resolved::Member(Member::Command(_))));
        assert!(matches!(root.resolve("env"), Resolved::Member(Member::Value(_))));

        match root.resolve("sleep") {
            Resolved::Timed(timed) => assert!(timed.is_async()),
            other => panic!("Expected a timed command, got {other:?}"),
        }
    }

    #[test]
    fn test_no_wrap_names_resolve_to_undefined() {
        let root = root();
        for name in NO_WRAP {
            assert!(root.resolve(name).is_undefined());
            assert!(root.sub("git").resolve(name).is_undefined());
        }
    }

    #[test]
    fn test_reserved_attribute_is_protected() {
        let mut root = root();
        let mut node = root.sub("git");

        for facade in [&mut root, &mut node] {
            let modify = facade.set(RESERVED_ATTRIBUTE, "oops").unwrap_err();
            assert!(matches!(modify, Error::ReservedAttributeModify(_)));

            let delete = facade.delete(RESERVED_ATTRIBUTE).unwrap_err();
            assert!(matches!(delete, Error::ReservedAttributeDelete(_)));
        }

        assert_eq!(node.path(), ["git"]);
        assert_eq!(node.get(RESERVED_ATTRIBUTE), Some(serde_json::json!(["git"])));
        assert_eq!(root.get(RESERVED_ATTRIBUTE), Some(serde_json::json!([])));
    }

    #[test]
    fn test_attributes_shadow_children() {
        let mut node = root().sub("git");

        node.set("label", "vcs").unwrap();
        assert!(node.has("label"));
        assert!(matches!(node.resolve("label"), Resolved::Value(Value::String(_))));

        assert_eq!(node.delete("label").unwrap(), Some(Value::from("vcs")));
        assert!(!node.has("label"));
        assert!(node.resolve("label").is_node());
        assert_eq!(node.delete("label").unwrap(), None);
    }

    #[test]
    fn test_root_attribute_shadows_library_member() {
        let mut root = root();
        root.set("echo", "mine").unwrap();

        assert!(matches!(root.resolve("echo"), Resolved::Value(Value::String(_))));
        assert_eq!(root.keys().iter().filter(|key| *key == "echo").count(), 1);

        root.delete("echo").unwrap();
        assert!(matches!(root.resolve("echo"), Resolved::Wrapped(_)));
    }

    #[tokio::test]
    async fn test_exec_honors_options_record() {
        let exec = root().resolve("exec");

        let started = std::time::Instant::now();
        let error = exec
            .call(vec![Value::from("sleep 2"), serde_json::json!({"timeout": 50})])
            .await
            .unwrap_err();

        assert_eq!(error.code, ErrorCode::named(ErrorCode::TIMED_OUT));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        let error = exec
            .call(vec![Value::from("true"), serde_json::json!({"timeout": "soon"})])
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::named(ErrorCode::INVALID));
    }

    #[tokio::test]
    async fn test_exec_without_command_is_recorded() {
        let root = root();

        let error = root.resolve("exec").call(Vec::<Value>::new()).await.unwrap_err();
        assert_eq!(error.code, ErrorCode::named(ErrorCode::INVALID));

        let recorded = match root.resolve("error") {
            Resolved::Member(member) => member.invoke(&[]).unwrap().unwrap(),
            other => panic!("Expected the error accessor, got {other:?}"),
        };
        match recorded {
            crate::library::Outcome::Value(Value::String(message)) => {
                assert_eq!(message, "exec: must specify command");
            }
            other => panic!("Expected an error message, got {other:?}"),
        }
    }

    #[test]
    fn test_stored_no_wrap_value_is_returned() {
        let mut node = root().sub("git");
        node.set("stdout", "captured").unwrap();
        assert!(matches!(node.resolve("stdout"), Resolved::Value(_)));
    }

    #[test]
    fn test_enumeration_only_sees_concrete_keys() {
        let root = root();
        let mut node = root.sub("git");

        let _ = node.resolve("status");
        assert!(!node.has("status"));
        assert_eq!(node.keys(), vec![RESERVED_ATTRIBUTE.to_string()]);

        node.set("a", 1).unwrap();
        node.set("b", 2).unwrap();
        assert_eq!(node.keys(), vec![RESERVED_ATTRIBUTE, "a", "b"]);

        assert!(root.has("echo"));
        assert!(root.keys().contains(&"exec".to_string()));
        assert!(!root.has("git"));
    }

    #[test]
    fn test_only_root_is_bound() {
        let root = root();
        assert!(root.bound_target().is_some());
        assert!(root.sub("git").bound_target().is_none());
    }

    #[test]
    fn test_repeated_resolution_gives_equal_paths() {
        let root = root();
        let first = root.resolve("git").into_node().unwrap();
        let second = root.resolve("git").into_node().unwrap();
        assert_eq!(first.path(), second.path());
    }

    #[tokio::test]
    async fn test_root_is_not_callable() {
        let error = root().call(Vec::<Value>::new()).await.unwrap_err();
        assert_eq!(error.code, ErrorCode::named(ErrorCode::INVALID));
    }

    #[tokio::test]
    async fn test_pass_through_member_is_not_called_through_resolved() {
        let error = root().resolve("error").call(Vec::<Value>::new()).await.unwrap_err();
        assert_eq!(error.code, ErrorCode::named(ErrorCode::INVALID));
    }
}
