//! Core types and logic for the relink gateway supervisor.
//!
//! This crate holds everything that needs no runtime: the monotonic time
//! abstraction, configuration, the error taxonomy, raw status translation,
//! the connection lifecycle state machine, and the traits that bound the
//! external gateway client. The tokio-driven controller that executes the
//! state machine's effects lives in `relink-runtime`.

pub mod config;
pub mod errors;
pub mod gateway;
pub mod link_state;
pub mod status;
pub mod types;

pub use config::{GatewayConfig, LinkConfig};
pub use errors::{LinkError, LinkResult, Result};
pub use gateway::{Gateway, GatewayFactory, HandlerBinder, MessageKind, MessageNotification};
pub use link_state::{Effects, LinkEffect, LinkSnapshot, LinkState, LinkStatus, TimerEpoch};
pub use status::{map_raw_status, StatusOutcome};
pub use types::{ManualTimeSource, MonotonicTimeSource, TimeSource, Timestamp};
