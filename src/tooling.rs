//! Tooling & Integration Layer
//!
//! Command line parsing, terminal prompts and human-readable output around
//! the sync and cleanup core.

pub mod cli;
pub mod format;
pub mod prompt;

pub use cli::{Cli, CliContext, Mode};
pub use prompt::TerminalOperator;
