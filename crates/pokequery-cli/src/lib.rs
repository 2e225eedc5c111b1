//! pokequery CLI library
//!
//! This library provides the components behind the `pokequery` binary:
//! argument parsing, configuration loading, command dispatch and the
//! interactive terminal.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod terminal;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use error::{CliError, Result};
