//! Controller construction.

use std::sync::Arc;

use relink_core::{
    GatewayConfig, GatewayFactory, HandlerBinder, LinkConfig, LinkError, Result, TimeSource,
};

use crate::controller::{LinkController, LinkHandle};
use crate::time::TokioTimeSource;

// ----------------------------------------------------------------------------
// Controller Builder
// ----------------------------------------------------------------------------

/// Wires configuration and collaborators into a controller/handle pair.
pub struct ControllerBuilder {
    link_config: LinkConfig,
    gateway_config: GatewayConfig,
    factory: Option<Arc<dyn GatewayFactory>>,
    binder: Option<Arc<dyn HandlerBinder>>,
    clock: Option<Arc<dyn TimeSource>>,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            link_config: LinkConfig::default(),
            gateway_config: GatewayConfig::default(),
            factory: None,
            binder: None,
            clock: None,
        }
    }

    /// Set the reconnection/pacing configuration.
    pub fn link_config(mut self, config: LinkConfig) -> Self {
        self.link_config = config;
        self
    }

    /// Set the fixed configuration handed to the gateway factory.
    pub fn gateway_config(mut self, config: GatewayConfig) -> Self {
        self.gateway_config = config;
        self
    }

    /// Set the gateway factory (required).
    pub fn factory(mut self, factory: Arc<dyn GatewayFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the handler-attachment collaborator (required).
    pub fn binder(mut self, binder: Arc<dyn HandlerBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Override the time source. Defaults to the tokio clock.
    pub fn clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and build. Must be called inside a tokio runtime when the
    /// default clock is used.
    pub fn build(self) -> Result<(LinkController, LinkHandle)> {
        self.link_config.validate()?;
        let factory = self
            .factory
            .ok_or_else(|| LinkError::config("a gateway factory is required"))?;
        let binder = self
            .binder
            .ok_or_else(|| LinkError::config("a handler binder is required"))?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(TokioTimeSource::new()));
        Ok(LinkController::new(
            self.link_config,
            self.gateway_config,
            factory,
            binder,
            clock,
        ))
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
