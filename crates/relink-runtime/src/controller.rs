//! Connection lifecycle controller task.
//!
//! One controller supervises one gateway client. Status notifications,
//! timer fires, and inspection requests all arrive as messages on a single
//! channel and are processed one at a time, so state mutation never races:
//! the only suspension points are the gateway construction awaits, and
//! anything that arrives meanwhile queues behind them.
//!
//! Timers are plain spawned sleeps that send a fire message back into the
//! queue. Cancelling aborts the sleep task and the state machine bumps the
//! timer epoch, so a fire that already made it into the queue is discarded
//! on receipt. Status events carry the generation of the gateway instance
//! that produced them; events from superseded instances are discarded the
//! same way.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use relink_core::{
    map_raw_status, Effects, Gateway, GatewayConfig, GatewayFactory, HandlerBinder, LinkConfig,
    LinkEffect, LinkError, LinkSnapshot, LinkState, Result, StatusOutcome, TimeSource, TimerEpoch,
};

// ----------------------------------------------------------------------------
// Control Messages
// ----------------------------------------------------------------------------

/// Everything the controller task reacts to.
#[derive(Debug)]
enum ControlMsg {
    /// A raw status token. `generation` is the gateway instance that
    /// produced it; `None` marks a trusted injection (tests, harness).
    Status {
        generation: Option<u64>,
        raw: String,
    },
    /// The establishment deadline elapsed.
    EstablishmentTimeout { epoch: TimerEpoch },
    /// The reconnection delay elapsed.
    ReconnectionDue { epoch: TimerEpoch },
    /// State snapshot request.
    Inspect {
        reply: oneshot::Sender<LinkSnapshot>,
    },
    /// Stop the controller task.
    Shutdown,
}

// ----------------------------------------------------------------------------
// Handle
// ----------------------------------------------------------------------------

/// Cheap clonable handle onto a running controller.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    tx: mpsc::UnboundedSender<ControlMsg>,
}

impl LinkHandle {
    /// Inject a raw status notification, as if the gateway had emitted it.
    pub fn notify_status(&self, raw: impl Into<String>) -> Result<()> {
        self.tx
            .send(ControlMsg::Status {
                generation: None,
                raw: raw.into(),
            })
            .map_err(|_| LinkError::ChannelClosed)
    }

    /// Read-only snapshot of the controller's state.
    ///
    /// The request rides the same queue as notifications, so the snapshot
    /// reflects everything sent before it.
    pub async fn state(&self) -> Result<LinkSnapshot> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(ControlMsg::Inspect { reply })
            .map_err(|_| LinkError::ChannelClosed)?;
        response.await.map_err(|_| LinkError::ChannelClosed)
    }

    /// Ask the controller task to stop.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ControlMsg::Shutdown);
    }
}

// ----------------------------------------------------------------------------
// Controller
// ----------------------------------------------------------------------------

/// Owns the lifecycle state machine and executes its effects.
pub struct LinkController {
    state: LinkState,
    clock: Arc<dyn TimeSource>,
    factory: Arc<dyn GatewayFactory>,
    binder: Arc<dyn HandlerBinder>,
    gateway_config: GatewayConfig,
    rx: mpsc::UnboundedReceiver<ControlMsg>,
    tx: mpsc::UnboundedSender<ControlMsg>,
    gateway: Option<Box<dyn Gateway>>,
    generation: u64,
    status_forwarder: Option<JoinHandle<()>>,
    establishment_sleep: Option<JoinHandle<()>>,
    reconnection_sleep: Option<JoinHandle<()>>,
    controller_id: Uuid,
    initialized: bool,
    running: bool,
}

impl LinkController {
    /// Create a controller and its handle.
    pub fn new(
        link_config: LinkConfig,
        gateway_config: GatewayConfig,
        factory: Arc<dyn GatewayFactory>,
        binder: Arc<dyn HandlerBinder>,
        clock: Arc<dyn TimeSource>,
    ) -> (Self, LinkHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = LinkHandle { tx: tx.clone() };
        let controller = Self {
            state: LinkState::new(link_config),
            clock,
            factory,
            binder,
            gateway_config,
            rx,
            tx,
            gateway: None,
            generation: 0,
            status_forwarder: None,
            establishment_sleep: None,
            reconnection_sleep: None,
            controller_id: Uuid::new_v4(),
            initialized: false,
            running: true,
        };
        (controller, handle)
    }

    /// Bind the controller to its first gateway instance and reset all
    /// state.
    ///
    /// Must be called before [`run`](Self::run). The embedding application
    /// attaches its own handlers to this first instance; the controller
    /// only attaches handlers to instances it constructs itself. Calling
    /// again fully resets retry accounting.
    pub fn initialize(&mut self, mut gateway: Box<dyn Gateway>) -> Result<()> {
        let effects = self.state.reset();
        self.apply_effects(effects);
        self.subscribe(gateway.as_mut())?;
        info!(
            controller = %self.controller_id,
            gateway = %gateway.describe(),
            "controller initialized"
        );
        self.gateway = Some(gateway);
        self.initialized = true;
        Ok(())
    }

    /// Run the controller until shutdown.
    pub async fn run(mut self) -> Result<()> {
        if !self.initialized {
            return Err(LinkError::config(
                "initialize must be called before running the controller",
            ));
        }
        info!(controller = %self.controller_id, "link controller running");

        while self.running {
            match self.rx.recv().await {
                Some(msg) => self.handle(msg).await,
                None => break,
            }
        }

        self.teardown();
        info!(controller = %self.controller_id, "link controller stopped");
        Ok(())
    }

    async fn handle(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::Status { generation, raw } => {
                if let Some(origin) = generation {
                    if origin != self.generation {
                        debug!(origin, current = self.generation, token = %raw,
                            "status from superseded gateway dropped");
                        return;
                    }
                }
                let outcome = map_raw_status(&raw);
                match outcome {
                    StatusOutcome::Unrecognized => {
                        warn!(token = %raw, "unrecognized status token, treating as failure")
                    }
                    _ => debug!(token = %raw, outcome = outcome.as_str(), "status notification"),
                }
                let now = self.clock.now();
                let effects = self.state.on_outcome(outcome, now);
                self.dispatch(effects).await;
            }
            ControlMsg::EstablishmentTimeout { epoch } => {
                warn!("connection attempt timed out before establishment");
                let now = self.clock.now();
                let effects = self.state.on_establishment_timeout(epoch, now);
                self.dispatch(effects).await;
            }
            ControlMsg::ReconnectionDue { epoch } => {
                let effects = self.state.on_reconnection_due(epoch);
                self.dispatch(effects).await;
            }
            ControlMsg::Inspect { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            ControlMsg::Shutdown => {
                self.running = false;
            }
        }
    }

    /// Execute effects; any `BeginAttempt` is drained in a loop so even a
    /// synchronous construction-failure storm stays bounded by the single
    /// budget gate rather than growing the call stack.
    async fn dispatch(&mut self, effects: Effects) {
        let mut next = self.apply_effects(effects);
        while let Some(attempt) = next {
            next = self.perform_reconnection(attempt).await;
        }
    }

    fn apply_effects(&mut self, effects: Effects) -> Option<u32> {
        let mut begin = None;
        for effect in effects {
            match effect {
                LinkEffect::ArmEstablishmentTimer { epoch, after } => {
                    if let Some(old) = self.establishment_sleep.take() {
                        old.abort();
                    }
                    self.establishment_sleep =
                        Some(self.spawn_timer(after, ControlMsg::EstablishmentTimeout { epoch }));
                }
                LinkEffect::CancelEstablishmentTimer => {
                    if let Some(old) = self.establishment_sleep.take() {
                        old.abort();
                    }
                }
                LinkEffect::ArmReconnectionTimer { epoch, after } => {
                    if let Some(old) = self.reconnection_sleep.take() {
                        old.abort();
                    }
                    info!(
                        delay_ms = after.as_millis() as u64,
                        attempt = self.state.retry_count(),
                        "reconnection scheduled"
                    );
                    self.reconnection_sleep =
                        Some(self.spawn_timer(after, ControlMsg::ReconnectionDue { epoch }));
                }
                LinkEffect::CancelReconnectionTimer => {
                    if let Some(old) = self.reconnection_sleep.take() {
                        old.abort();
                    }
                }
                LinkEffect::BeginAttempt { attempt } => {
                    begin = Some(attempt);
                }
                LinkEffect::RetriesExhausted { attempts } => {
                    error!(
                        attempts,
                        "retry budget exhausted; supervision is inert until the process restarts"
                    );
                }
            }
        }
        begin
    }

    /// Rebuild the gateway client and re-attach the domain handlers.
    async fn perform_reconnection(&mut self, attempt: u32) -> Option<u32> {
        info!(attempt, "executing reconnection attempt");
        self.state.begin_attempt(self.clock.now());

        // Drop the superseded instance. No explicit shutdown call is issued
        // to it; the library tears down its own resources when dropped.
        if let Some(forwarder) = self.status_forwarder.take() {
            forwarder.abort();
        }
        self.gateway = None;

        match self.factory.build(&self.gateway_config).await {
            Ok(mut gateway) => {
                if let Err(error) = self.binder.bind(gateway.as_mut()) {
                    warn!(%error, attempt, "handler attachment failed");
                    let effects = self.state.attempt_failed(self.clock.now());
                    return self.apply_effects(effects);
                }
                if let Err(error) = self.subscribe(gateway.as_mut()) {
                    warn!(%error, attempt, "status subscription failed");
                    let effects = self.state.attempt_failed(self.clock.now());
                    return self.apply_effects(effects);
                }
                info!(gateway = %gateway.describe(), attempt, "gateway client rebuilt");
                self.gateway = Some(gateway);
                let effects = self.state.attempt_attached();
                self.apply_effects(effects)
            }
            Err(error) => {
                warn!(%error, attempt, "gateway construction failed");
                let effects = self.state.attempt_failed(self.clock.now());
                self.apply_effects(effects)
            }
        }
    }

    /// Re-subscribe the controller as the status listener of `gateway`.
    ///
    /// Bumps the generation first, so anything still queued from an older
    /// instance is recognizably stale.
    fn subscribe(&mut self, gateway: &mut dyn Gateway) -> Result<()> {
        let mut stream = gateway
            .take_status_stream()
            .ok_or_else(|| LinkError::config("gateway status stream already taken"))?;

        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();

        if let Some(old) = self.status_forwarder.take() {
            old.abort();
        }
        self.status_forwarder = Some(tokio::spawn(async move {
            while let Some(raw) = stream.recv().await {
                let msg = ControlMsg::Status {
                    generation: Some(generation),
                    raw,
                };
                if tx.send(msg).is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn spawn_timer(&self, after: Duration, msg: ControlMsg) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(msg);
        })
    }

    fn teardown(&mut self) {
        for handle in [
            self.status_forwarder.take(),
            self.establishment_sleep.take(),
            self.reconnection_sleep.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
        self.gateway = None;
    }
}
