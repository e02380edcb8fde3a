//! Gateway boundary traits.
//!
//! The actual protocol client lives in an external library; this module
//! only pins down the seam the supervisor needs: a factory that builds
//! client instances from fixed configuration, takeable notification
//! streams, and the handler-attachment hook supplied by the embedding
//! application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::GatewayConfig;
use crate::errors::Result;
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Message Notifications
// ----------------------------------------------------------------------------

/// Coarse category of an inbound message notification.
///
/// Content semantics stay with the domain handlers; the supervisor only
/// carries the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    Media,
    ViewOnce,
    Story,
    Other,
}

/// Envelope of an inbound message, as emitted by the gateway client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageNotification {
    /// Opaque sender identifier from the gateway.
    pub sender: String,
    /// Coarse category.
    pub kind: MessageKind,
    /// When the client surfaced it.
    pub received_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Gateway Trait
// ----------------------------------------------------------------------------

/// A live gateway client instance.
///
/// Both streams can be taken exactly once: the controller takes the status
/// stream, the handler binder takes the message stream. A second take
/// returns `None`.
pub trait Gateway: Send {
    /// Take the raw connection-status stream. Tokens are the library's
    /// free-form spellings; translation happens at the controller boundary.
    fn take_status_stream(&mut self) -> Option<mpsc::UnboundedReceiver<String>>;

    /// Take the inbound message notification stream.
    fn take_message_stream(&mut self) -> Option<mpsc::UnboundedReceiver<MessageNotification>>;

    /// Short identity for logs.
    fn describe(&self) -> String;
}

// ----------------------------------------------------------------------------
// Factory and Handler Attachment
// ----------------------------------------------------------------------------

/// Builds gateway client instances from fixed configuration.
///
/// Called once at startup by the embedding application and once per
/// reconnection by the supervisor.
#[async_trait]
pub trait GatewayFactory: Send + Sync {
    async fn build(&self, config: &GatewayConfig) -> Result<Box<dyn Gateway>>;
}

/// Attaches the application's message-processing handlers to a freshly
/// built gateway instance.
///
/// Injected into the controller at construction time; the supervisor calls
/// it once per instance it builds.
pub trait HandlerBinder: Send + Sync {
    fn bind(&self, gateway: &mut dyn Gateway) -> Result<()>;
}
