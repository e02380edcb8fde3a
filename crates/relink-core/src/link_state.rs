//! Connection lifecycle state machine.
//!
//! Pure transition logic for the link supervisor: the state store, the
//! connecting-signal debounce, establishment-timeout bookkeeping, and the
//! reconnection scheduler. Transitions never perform I/O; they mutate the
//! store and return [`LinkEffect`]s for the runtime to execute (arm or
//! cancel a timer, begin a reconnection attempt, report exhaustion).
//!
//! Timers are represented by epoch tokens. Arming hands out a fresh epoch;
//! a fire whose epoch does not match the currently armed one is stale and
//! ignored, so a timer can never act after the state it was guarding has
//! moved on.

use core::time::Duration;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::config::LinkConfig;
use crate::status::StatusOutcome;
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Link Status
// ----------------------------------------------------------------------------

/// Coarse connection status as last reported by the gateway (or derived
/// from a timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    /// No notification processed yet.
    Idle,
    /// An attempt is in flight.
    Connecting,
    /// The link is established.
    Connected,
    /// The link is down.
    Disconnected,
    /// The last signal was not recognizable; handled as down.
    Unknown,
}

impl LinkStatus {
    /// Status name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Idle => "Idle",
            LinkStatus::Connecting => "Connecting",
            LinkStatus::Connected => "Connected",
            LinkStatus::Disconnected => "Disconnected",
            LinkStatus::Unknown => "Unknown",
        }
    }
}

// ----------------------------------------------------------------------------
// Timer Epochs
// ----------------------------------------------------------------------------

/// Token identifying one arming of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerEpoch(u64);

impl TimerEpoch {
    /// Raw value, for logging.
    pub fn value(&self) -> u64 {
        self.0
    }
}

// ----------------------------------------------------------------------------
// Effects
// ----------------------------------------------------------------------------

/// Work the runtime must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEffect {
    /// Start the establishment deadline for the current attempt.
    ArmEstablishmentTimer { epoch: TimerEpoch, after: Duration },
    /// Stop the pending establishment deadline.
    CancelEstablishmentTimer,
    /// Start the delay before the next reconnection attempt executes.
    ArmReconnectionTimer { epoch: TimerEpoch, after: Duration },
    /// Stop the pending reconnection delay.
    CancelReconnectionTimer,
    /// Execute a reconnection attempt (rebuild the gateway client).
    BeginAttempt { attempt: u32 },
    /// The retry budget is spent; the supervisor is inert from here on.
    RetriesExhausted { attempts: u32 },
}

/// Effect lists are at most two entries long in every reachable transition.
pub type Effects = SmallVec<[LinkEffect; 2]>;

// ----------------------------------------------------------------------------
// Snapshot
// ----------------------------------------------------------------------------

/// Read-only view of the state store, for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub status: LinkStatus,
    pub is_connected: bool,
    pub is_reconnecting: bool,
    pub retry_count: u32,
    pub has_active_establishment_timer: bool,
    pub has_active_reconnection_timer: bool,
    pub last_attempt_at: Option<Timestamp>,
    pub last_connecting_event_at: Option<Timestamp>,
}

// ----------------------------------------------------------------------------
// State Machine
// ----------------------------------------------------------------------------

/// The single source of truth for connection status, retry accounting, and
/// timer ownership. One live instance per supervised gateway, owned
/// exclusively by its controller.
#[derive(Debug)]
pub struct LinkState {
    config: LinkConfig,
    status: LinkStatus,
    retry_count: u32,
    is_reconnecting: bool,
    last_attempt_at: Option<Timestamp>,
    last_connecting_event_at: Option<Timestamp>,
    establishment_timer: Option<TimerEpoch>,
    reconnection_timer: Option<TimerEpoch>,
    epoch_counter: u64,
}

impl LinkState {
    /// Create a fresh state store.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            status: LinkStatus::Idle,
            retry_count: 0,
            is_reconnecting: false,
            last_attempt_at: None,
            last_connecting_event_at: None,
            establishment_timer: None,
            reconnection_timer: None,
            epoch_counter: 0,
        }
    }

    /// Reset everything to defaults, cancelling any armed timers.
    ///
    /// Used by `initialize`; re-initialization fully resets retry
    /// accounting.
    pub fn reset(&mut self) -> Effects {
        let mut effects = Effects::new();
        if self.establishment_timer.take().is_some() {
            effects.push(LinkEffect::CancelEstablishmentTimer);
        }
        if self.reconnection_timer.take().is_some() {
            effects.push(LinkEffect::CancelReconnectionTimer);
        }
        self.status = LinkStatus::Idle;
        self.retry_count = 0;
        self.is_reconnecting = false;
        self.last_attempt_at = None;
        self.last_connecting_event_at = None;
        effects
    }

    /// Process a translated status notification.
    pub fn on_outcome(&mut self, outcome: StatusOutcome, now: Timestamp) -> Effects {
        match outcome {
            StatusOutcome::Connecting => self.on_connecting(now),
            StatusOutcome::Succeeded => self.on_succeeded(),
            StatusOutcome::Failed => {
                self.status = LinkStatus::Disconnected;
                self.schedule_reconnection(now)
            }
            StatusOutcome::Unrecognized => {
                self.status = LinkStatus::Unknown;
                self.schedule_reconnection(now)
            }
        }
    }

    /// A "connecting" signal: debounce, then arm the establishment deadline.
    fn on_connecting(&mut self, now: Timestamp) -> Effects {
        if let Some(prev) = self.last_connecting_event_at {
            let window = self.config.min_connecting_event_interval.as_millis() as u64;
            if now - prev < window {
                debug!(elapsed_ms = now - prev, "connecting signal debounced");
                return Effects::new();
            }
        }
        self.last_connecting_event_at = Some(now);

        // A pending reconnection owns the next attempt; the old client's
        // connecting chatter must not arm anything in the meantime.
        if self.is_reconnecting && self.reconnection_timer.is_some() {
            debug!("connecting signal ignored while a reconnection is pending");
            return Effects::new();
        }

        self.status = LinkStatus::Connecting;

        let mut effects = Effects::new();
        if self.establishment_timer.is_none() {
            let epoch = self.next_epoch();
            self.establishment_timer = Some(epoch);
            effects.push(LinkEffect::ArmEstablishmentTimer {
                epoch,
                after: self.config.connection_timeout,
            });
        }
        effects
    }

    /// The link is up. The only path that resets the retry budget.
    fn on_succeeded(&mut self) -> Effects {
        let mut effects = Effects::new();
        if self.establishment_timer.take().is_some() {
            effects.push(LinkEffect::CancelEstablishmentTimer);
        }
        if self.reconnection_timer.take().is_some() {
            effects.push(LinkEffect::CancelReconnectionTimer);
        }
        self.status = LinkStatus::Connected;
        self.retry_count = 0;
        self.is_reconnecting = false;
        effects
    }

    /// Decide whether and when another attempt may run.
    pub fn schedule_reconnection(&mut self, now: Timestamp) -> Effects {
        // Single flight: one reconnection sequence at a time.
        if self.is_reconnecting {
            debug!("reconnection already in flight, not scheduling another");
            return Effects::new();
        }
        if self.retry_count >= self.config.max_retries {
            let mut effects = Effects::new();
            effects.push(LinkEffect::RetriesExhausted {
                attempts: self.retry_count,
            });
            return effects;
        }

        self.retry_count += 1;
        self.is_reconnecting = true;

        // The delay only grows to keep attempts apart; this is spacing
        // enforcement, not exponential backoff.
        let deficit = match self.last_attempt_at {
            Some(at) => {
                let elapsed = Duration::from_millis(now - at);
                self.config.min_attempt_interval.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        };
        let delay = self.config.retry_delay + deficit;

        let mut effects = Effects::new();
        if self.reconnection_timer.take().is_some() {
            effects.push(LinkEffect::CancelReconnectionTimer);
        }
        let epoch = self.next_epoch();
        self.reconnection_timer = Some(epoch);
        effects.push(LinkEffect::ArmReconnectionTimer {
            epoch,
            after: delay,
        });
        effects
    }

    /// The establishment deadline fired: the attempt counts as failed.
    pub fn on_establishment_timeout(&mut self, epoch: TimerEpoch, now: Timestamp) -> Effects {
        if self.establishment_timer != Some(epoch) {
            debug!(epoch = epoch.value(), "stale establishment timeout ignored");
            return Effects::new();
        }
        self.establishment_timer = None;
        self.status = LinkStatus::Disconnected;
        self.schedule_reconnection(now)
    }

    /// The reconnection delay elapsed: the attempt may execute.
    pub fn on_reconnection_due(&mut self, epoch: TimerEpoch) -> Effects {
        if self.reconnection_timer != Some(epoch) {
            debug!(epoch = epoch.value(), "stale reconnection timer ignored");
            return Effects::new();
        }
        self.reconnection_timer = None;
        let mut effects = Effects::new();
        effects.push(LinkEffect::BeginAttempt {
            attempt: self.retry_count,
        });
        effects
    }

    /// An attempt is executing: record its start.
    pub fn begin_attempt(&mut self, now: Timestamp) {
        self.last_attempt_at = Some(now);
        self.status = LinkStatus::Connecting;
    }

    /// The replacement client is built and its handlers attached; the
    /// attempt now rides on the establishment deadline.
    pub fn attempt_attached(&mut self) -> Effects {
        self.is_reconnecting = false;
        let mut effects = Effects::new();
        if self.establishment_timer.take().is_some() {
            effects.push(LinkEffect::CancelEstablishmentTimer);
        }
        let epoch = self.next_epoch();
        self.establishment_timer = Some(epoch);
        effects.push(LinkEffect::ArmEstablishmentTimer {
            epoch,
            after: self.config.connection_timeout,
        });
        effects
    }

    /// Construction or attachment failed; feed the failure back through the
    /// same budget gate as transport-reported failures.
    pub fn attempt_failed(&mut self, now: Timestamp) -> Effects {
        self.is_reconnecting = false;
        self.status = LinkStatus::Disconnected;
        self.schedule_reconnection(now)
    }

    /// Read-only snapshot for diagnostics.
    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            status: self.status,
            is_connected: self.status == LinkStatus::Connected,
            is_reconnecting: self.is_reconnecting,
            retry_count: self.retry_count,
            has_active_establishment_timer: self.establishment_timer.is_some(),
            has_active_reconnection_timer: self.reconnection_timer.is_some(),
            last_attempt_at: self.last_attempt_at,
            last_connecting_event_at: self.last_connecting_event_at,
        }
    }

    /// Current status.
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Attempts made since the last successful connection.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Whether a reconnection is scheduled or executing.
    pub fn is_reconnecting(&self) -> bool {
        self.is_reconnecting
    }

    fn next_epoch(&mut self) -> TimerEpoch {
        self.epoch_counter += 1;
        TimerEpoch(self.epoch_counter)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
