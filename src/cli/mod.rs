//! Command-line interface for prompt-forge.
//!
//! Provides the `optimize` and `generate` commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
