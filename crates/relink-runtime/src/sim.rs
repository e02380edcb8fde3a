//! In-memory simulated gateway.
//!
//! Used by the integration tests and the CLI demo mode: the handle side
//! plays the external library, emitting raw status tokens and message
//! notifications; the gateway side is what the controller supervises. The
//! factory can be scripted to fail construction a number of times to
//! exercise the retry budget.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use relink_core::{
    Gateway, GatewayConfig, GatewayFactory, HandlerBinder, LinkError, MessageNotification, Result,
};

// ----------------------------------------------------------------------------
// Simulated Gateway
// ----------------------------------------------------------------------------

/// The supervised side of a simulated gateway client.
pub struct SimulatedGateway {
    label: String,
    status_rx: Option<mpsc::UnboundedReceiver<String>>,
    message_rx: Option<mpsc::UnboundedReceiver<MessageNotification>>,
}

/// The driving side: emits notifications as the external library would.
#[derive(Debug, Clone)]
pub struct SimulatedGatewayHandle {
    status_tx: mpsc::UnboundedSender<String>,
    message_tx: mpsc::UnboundedSender<MessageNotification>,
}

impl SimulatedGatewayHandle {
    /// Emit a raw status token. Returns false once the gateway is dropped.
    pub fn emit_status(&self, raw: impl Into<String>) -> bool {
        self.status_tx.send(raw.into()).is_ok()
    }

    /// Emit a message notification.
    pub fn emit_message(&self, notification: MessageNotification) -> bool {
        self.message_tx.send(notification).is_ok()
    }
}

/// Create a simulated gateway and the handle that drives it.
pub fn simulated_gateway(label: impl Into<String>) -> (SimulatedGateway, SimulatedGatewayHandle) {
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let (message_tx, message_rx) = mpsc::unbounded_channel();
    (
        SimulatedGateway {
            label: label.into(),
            status_rx: Some(status_rx),
            message_rx: Some(message_rx),
        },
        SimulatedGatewayHandle {
            status_tx,
            message_tx,
        },
    )
}

impl Gateway for SimulatedGateway {
    fn take_status_stream(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.status_rx.take()
    }

    fn take_message_stream(&mut self) -> Option<mpsc::UnboundedReceiver<MessageNotification>> {
        self.message_rx.take()
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

// ----------------------------------------------------------------------------
// Simulated Factory
// ----------------------------------------------------------------------------

/// Factory producing simulated gateways.
///
/// Every constructed instance's driving handle is pushed into a channel so
/// the harness can reach whichever instance is current.
pub struct SimulatedFactory {
    handles: mpsc::UnboundedSender<SimulatedGatewayHandle>,
    fail_budget: AtomicU32,
    built: AtomicU32,
}

impl SimulatedFactory {
    /// Create the factory and the receiving end for instance handles.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SimulatedGatewayHandle>) {
        let (handles, handle_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                handles,
                fail_budget: AtomicU32::new(0),
                built: AtomicU32::new(0),
            }),
            handle_rx,
        )
    }

    /// Make the next `count` constructions fail.
    pub fn fail_next(&self, count: u32) {
        self.fail_budget.store(count, Ordering::SeqCst);
    }

    /// Number of successfully constructed instances.
    pub fn built_count(&self) -> u32 {
        self.built.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.fail_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

#[async_trait]
impl GatewayFactory for SimulatedFactory {
    async fn build(&self, config: &GatewayConfig) -> Result<Box<dyn Gateway>> {
        if self.take_failure() {
            return Err(LinkError::construction("simulated construction failure"));
        }
        let n = self.built.fetch_add(1, Ordering::SeqCst) + 1;
        let (gateway, handle) = simulated_gateway(format!("{}#{n}", config.device_name));
        let _ = self.handles.send(handle);
        Ok(Box::new(gateway))
    }
}

// ----------------------------------------------------------------------------
// Logging Binder
// ----------------------------------------------------------------------------

/// Handler binder that drains message notifications into the log.
///
/// Stands in for the application's domain handlers in the CLI harness and
/// in tests.
pub struct LoggingBinder;

impl HandlerBinder for LoggingBinder {
    fn bind(&self, gateway: &mut dyn Gateway) -> Result<()> {
        let mut messages = gateway
            .take_message_stream()
            .ok_or_else(|| LinkError::attachment("message stream already taken"))?;
        tokio::spawn(async move {
            while let Some(note) = messages.recv().await {
                info!(sender = %note.sender, kind = ?note.kind, "message notification");
            }
        });
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_streams_can_be_taken_once() {
        let (mut gateway, _handle) = simulated_gateway("sim");
        assert!(gateway.take_status_stream().is_some());
        assert!(gateway.take_status_stream().is_none());
        assert!(gateway.take_message_stream().is_some());
        assert!(gateway.take_message_stream().is_none());
    }

    #[tokio::test]
    async fn test_factory_scripts_failures_then_builds() {
        let (factory, mut handles) = SimulatedFactory::new();
        factory.fail_next(2);
        let config = GatewayConfig::default();

        assert!(factory.build(&config).await.is_err());
        assert!(factory.build(&config).await.is_err());

        let gateway = factory.build(&config).await.expect("third build succeeds");
        assert_eq!(factory.built_count(), 1);
        assert!(gateway.describe().ends_with("#1"));
        assert!(handles.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_handle_reports_dropped_gateway() {
        let (gateway, handle) = simulated_gateway("sim");
        assert!(handle.emit_status("open"));
        drop(gateway);
        assert!(!handle.emit_status("open"));
    }
}
