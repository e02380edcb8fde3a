//! relink daemon harness.
//!
//! Thin CLI around `relink-runtime`: layered configuration, logging setup,
//! and the `run`/`simulate`/`check-config` commands.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod script;

pub use config::AppConfig;
pub use error::{CliError, Result};
