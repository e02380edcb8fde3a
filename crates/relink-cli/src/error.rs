//! CLI error type.

use relink_core::LinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("could not serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("could not serialize snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid environment variable {var}: {reason}")]
    InvalidEnv { var: String, reason: String },

    #[error("invalid simulation script: {reason}")]
    Script { reason: String },
}

pub type Result<T> = std::result::Result<T, CliError>;
