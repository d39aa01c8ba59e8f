//! GLS shell library
//!
//! Components of `glsctl`: argument parsing, layered configuration, the
//! command table and the shell loop that feeds a GLS session.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod shell;

pub use app::{run, Flow, Shell};
pub use cli::{Cli, Commands};
pub use config::{CliAppConfig, ConfigError};
pub use console::ConsoleGatt;
pub use error::{CliError, Result};
