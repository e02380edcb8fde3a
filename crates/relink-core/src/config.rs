//! Configuration for the link supervisor.
//!
//! All values are fixed at process start; nothing here is hot-reloadable.

use core::time::Duration;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{LinkError, Result};

// ----------------------------------------------------------------------------
// Link Configuration
// ----------------------------------------------------------------------------

/// Configuration for reconnection behavior and attempt pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Maximum reconnection attempts before the supervisor goes inert.
    pub max_retries: u32,
    /// Base delay before a scheduled attempt executes.
    #[serde(with = "duration_millis")]
    pub retry_delay: Duration,
    /// Deadline for an attempt to report success before it counts as failed.
    #[serde(with = "duration_millis")]
    pub connection_timeout: Duration,
    /// Minimum spacing between the starts of two attempts. Attempts landing
    /// closer than this have the shortfall added to their delay.
    #[serde(with = "duration_millis")]
    pub min_attempt_interval: Duration,
    /// Window inside which repeated "connecting" signals collapse into one.
    #[serde(with = "duration_millis")]
    pub min_connecting_event_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            retry_delay: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(30),
            min_attempt_interval: Duration::from_secs(5),
            min_connecting_event_interval: Duration::from_secs(1),
        }
    }
}

impl LinkConfig {
    /// Configuration with short durations for fast tests.
    pub fn testing() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(50),
            connection_timeout: Duration::from_millis(100),
            min_attempt_interval: Duration::from_millis(20),
            min_connecting_event_interval: Duration::from_millis(10),
        }
    }

    /// Validate the configuration for feasibility.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(LinkError::config("max_retries cannot be zero"));
        }
        if self.connection_timeout.is_zero() {
            return Err(LinkError::config("connection_timeout cannot be zero"));
        }
        if self.retry_delay.is_zero() {
            return Err(LinkError::config("retry_delay cannot be zero"));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Gateway Configuration
// ----------------------------------------------------------------------------

/// Fixed settings handed to the gateway factory on every construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Endpoint the gateway client should attach to.
    pub endpoint: String,
    /// Device name the client announces to the gateway.
    pub device_name: String,
    /// Directory holding the client's session/credential state, if any.
    pub session_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://gateway.invalid".into(),
            device_name: "relink".into(),
            session_dir: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Duration (De)serialization
// ----------------------------------------------------------------------------

/// Durations are written as integer milliseconds in config files and
/// snapshots.
mod duration_millis {
    use core::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
