//! Shell Facade CLI Library
//!
//! This crate provides the `sf` command-line interface over the shell façade.
//! It parses a command path and its arguments, runs them through the façade,
//! and reports the result the way the command itself would.
//!
//! # Architecture
//!
//! - [`cli_args`]: Command-line argument parsing and validation
//! - [`invocation`]: Resolving and running a command path, a library member
//!   or a raw command line
//!
//! # Examples
//!
//! ```bash
//! # Run a program through a command path: git log "-n" "3"
//! sf git log -- -n 3
//!
//! # Built-in library commands take precedence
//! sf ls -- -a
//!
//! # Raw command line through the execution entry point
//! sf --exec "ls | wc -l"
//!
//! # Dry run (don't execute, just show what would run)
//! sf --dry-run docker compose up -- -d
//! ```

pub mod cli_args;
pub mod invocation;
