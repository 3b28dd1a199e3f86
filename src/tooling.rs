//! Tooling
//!
//! The command-line surface. Commands are thin: they parse arguments, call
//! into the wired services and render the result.

pub mod cli;

pub use cli::{load_config, Cli, CliContext, Commands, OutputFormat};
