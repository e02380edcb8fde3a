//! relink runtime engine.
//!
//! Hosts the connection lifecycle controller: a single tokio task that owns
//! the state machine from `relink-core`, executes its timer and rebind
//! effects, and exposes a [`LinkHandle`] for status injection and state
//! inspection. Also provides the simulated gateway used by tests and the
//! CLI demo mode.

pub mod builder;
pub mod controller;
pub mod sim;
pub mod time;

pub use builder::ControllerBuilder;
pub use controller::{LinkController, LinkHandle};
pub use sim::{simulated_gateway, LoggingBinder, SimulatedFactory, SimulatedGateway, SimulatedGatewayHandle};
pub use time::TokioTimeSource;

// Re-export core types for convenience
pub use relink_core::{
    GatewayConfig, LinkConfig, LinkError, LinkSnapshot, LinkStatus, Result, StatusOutcome,
};
