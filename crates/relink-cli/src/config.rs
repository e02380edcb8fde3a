//! Layered configuration for the relink daemon.
//!
//! Priority ordering: `RELINK_*` environment variables > config file >
//! built-in defaults. The file is TOML, looked up in the user config
//! directory unless a path is given on the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use relink_core::{GatewayConfig, LinkConfig};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Everything the daemon needs, in one struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Reconnection and attempt pacing.
    pub link: LinkConfig,
    /// Fixed settings handed to the gateway factory.
    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Load the layered configuration and validate it.
    ///
    /// An explicitly given path must exist; the default location is
    /// optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(file) => {
                info!(file = %file.display(), "loading configuration");
                let text = std::fs::read_to_string(file)?;
                toml::from_str(&text)?
            }
            None => match Self::default_path() {
                Some(file) if file.exists() => {
                    info!(file = %file.display(), "loading configuration");
                    let text = std::fs::read_to_string(&file)?;
                    toml::from_str(&text)?
                }
                _ => Self::default(),
            },
        };
        config.apply_env()?;
        config.link.validate()?;
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("relink").join("relink.toml"))
    }

    /// Apply `RELINK_*` environment overrides.
    fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_u32("RELINK_MAX_RETRIES")? {
            self.link.max_retries = value;
        }
        if let Some(value) = env_u64("RELINK_RETRY_DELAY_MS")? {
            self.link.retry_delay = Duration::from_millis(value);
        }
        if let Some(value) = env_u64("RELINK_CONNECTION_TIMEOUT_MS")? {
            self.link.connection_timeout = Duration::from_millis(value);
        }
        if let Some(value) = env_string("RELINK_ENDPOINT")? {
            self.gateway.endpoint = value;
        }
        if let Some(value) = env_string("RELINK_DEVICE_NAME")? {
            self.gateway.device_name = value;
        }
        if let Some(value) = env_string("RELINK_SESSION_DIR")? {
            self.gateway.session_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Environment Helpers
// ----------------------------------------------------------------------------

fn env_string(var: &str) -> Result<Option<String>> {
    match std::env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(CliError::InvalidEnv {
            var: var.into(),
            reason: "not valid unicode".into(),
        }),
    }
}

fn env_u64(var: &str) -> Result<Option<u64>> {
    env_string(var)?
        .map(|value| {
            value.parse().map_err(|_| CliError::InvalidEnv {
                var: var.into(),
                reason: format!("expected an integer, got {value:?}"),
            })
        })
        .transpose()
}

fn env_u32(var: &str) -> Result<Option<u32>> {
    env_string(var)?
        .map(|value| {
            value.parse().map_err(|_| CliError::InvalidEnv {
                var: var.into(),
                reason: format!("expected an integer, got {value:?}"),
            })
        })
        .transpose()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
