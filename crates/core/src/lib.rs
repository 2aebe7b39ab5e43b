//! Shell Facade Core Library
//!
//! This crate turns a shell command library into a dynamic command façade:
//! chained names accumulate into a command path, and calling a node runs the
//! path as one shell command line, asynchronously. Non-zero exits reject with
//! a structured [`ShellError`] carrying the exit code and captured output.
//!
//! # Key Features
//!
//! - **Command Paths**: Build `tool sub ...` invocations by chaining names
//! - **Async Execution**: Every command returns a future, so many can run at once
//! - **Structured Errors**: One `{ code, message, stdout, stderr }` error shape
//! - **Library Members**: Built-in commands such as `cd`, `ls` and `echo`
//!   adapted to the same future-returning interface
//! - **Configuration**: Shared `silent`, `fatal` and `verbose` flags, loadable from YAML
//!
//! # Examples
//!
//! Running a command through the façade:
//!
//! ```no_run
//! use shell_facade_core::{shell, SharedConfig};
//!
//! # async fn run() -> Result<(), shell_facade_core::ShellError> {
//! let root = shell(SharedConfig::default());
//!
//! let status = root.sub("git").sub("status").call(["--short"]).await?;
//! println!("{status}");
//!
//! let listing = root.resolve("ls").call(["-a"]).await?;
//! println!("{}", listing.to_text());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

pub mod adapter;
pub mod config;
pub mod error;
pub mod execution;
pub mod facade;
pub mod file_handling;
pub mod invoker;
pub mod library;
pub mod normalize;
pub mod options;
pub mod shell_string;

pub use adapter::Reply;
pub use config::{SharedConfig, ShellConfig};
pub use error::{ErrorCode, ShellError};
pub use facade::{Facade, Resolved};
pub use library::{CommandLibrary, ShellLibrary};
pub use options::ExecOptions;
pub use shell_string::ShellString;

/// Creates a root façade over the built-in [`ShellLibrary`].
pub fn shell(config: SharedConfig) -> Facade {
    Facade::new(Arc::new(ShellLibrary::new(config)))
}
