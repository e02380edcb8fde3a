//! Error types for the link supervisor.
//!
//! Nothing in this taxonomy is ever propagated out of the controller task:
//! every variant is converted into a state transition plus log output. The
//! types exist so the boundary traits and the CLI harness have a shared
//! vocabulary for what went wrong.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Link Errors
// ----------------------------------------------------------------------------

/// Errors surfaced by the connection lifecycle machinery.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Building a replacement gateway client failed.
    #[error("gateway construction failed: {reason}")]
    TransportConstruction { reason: String },

    /// Attaching the domain handlers to a freshly built client failed.
    #[error("handler attachment failed: {reason}")]
    HandlerAttachment { reason: String },

    /// The retry budget is spent; the supervisor is inert until restart.
    #[error("retry budget exhausted after {attempts} attempts")]
    RetryBudgetExhausted { attempts: u32 },

    /// A status token the translation table does not know.
    #[error("unrecognized status token: {token:?}")]
    UnrecognizedStatus { token: String },

    /// The controller task is gone and its channel closed.
    #[error("controller channel closed")]
    ChannelClosed,

    /// Invalid configuration.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl LinkError {
    /// Create a construction error with a reason.
    pub fn construction<T: Into<String>>(reason: T) -> Self {
        LinkError::TransportConstruction {
            reason: reason.into(),
        }
    }

    /// Create a handler attachment error with a reason.
    pub fn attachment<T: Into<String>>(reason: T) -> Self {
        LinkError::HandlerAttachment {
            reason: reason.into(),
        }
    }

    /// Create a configuration error with a reason.
    pub fn config<T: Into<String>>(reason: T) -> Self {
        LinkError::Configuration {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, LinkError>;
pub type LinkResult<T> = Result<T>;
