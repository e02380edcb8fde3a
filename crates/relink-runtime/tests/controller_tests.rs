//! Integration tests for the controller task.
//!
//! All tests run under a paused tokio clock: `advance` moves virtual time,
//! timer sleeps fire in order, and `settle` yields until the forwarder and
//! controller tasks have drained everything in flight.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

use relink_core::{
    Gateway, GatewayConfig, GatewayFactory, HandlerBinder, LinkConfig, LinkError, LinkStatus,
    Result,
};
use relink_runtime::{
    simulated_gateway, ControllerBuilder, LinkHandle, SimulatedFactory, SimulatedGatewayHandle,
};

fn scenario_config() -> LinkConfig {
    LinkConfig {
        max_retries: 3,
        retry_delay: Duration::from_millis(1_000),
        connection_timeout: Duration::from_millis(2_000),
        min_attempt_interval: Duration::from_millis(5_000),
        min_connecting_event_interval: Duration::from_millis(1_000),
    }
}

/// Yield until spawned tasks (forwarders, the controller) have drained
/// everything already in flight.
async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

async fn advance(millis: u64) {
    tokio::time::advance(Duration::from_millis(millis)).await;
    settle().await;
}

/// Handler binder that counts how many instances it was attached to.
struct CountingBinder {
    bound: AtomicU32,
}

impl CountingBinder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bound: AtomicU32::new(0),
        })
    }
}

impl HandlerBinder for CountingBinder {
    fn bind(&self, gateway: &mut dyn Gateway) -> Result<()> {
        gateway
            .take_message_stream()
            .ok_or_else(|| LinkError::attachment("message stream already taken"))?;
        self.bound.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Start a supervised controller over a simulated factory. Returns the
/// handle, the factory, the stream of per-instance driving handles, and the
/// binder used for rebuilt instances.
async fn start_supervised(
    config: LinkConfig,
) -> (
    LinkHandle,
    Arc<SimulatedFactory>,
    mpsc::UnboundedReceiver<SimulatedGatewayHandle>,
    Arc<CountingBinder>,
) {
    let (factory, mut handles) = SimulatedFactory::new();
    let binder = CountingBinder::new();

    let (mut controller, handle) = ControllerBuilder::new()
        .link_config(config)
        .factory(factory.clone())
        .binder(binder.clone())
        .build()
        .expect("controller builds");

    // The embedding application builds and initializes the first instance.
    let first = factory
        .build(&GatewayConfig::default())
        .await
        .expect("initial gateway");
    controller.initialize(first).expect("initialize");
    tokio::spawn(controller.run());

    // Re-order so the caller's first recv() is the initial instance.
    let first_handle = handles.try_recv().expect("initial handle");
    (handle, factory, prepend(first_handle, handles), binder)
}

fn prepend(
    first: SimulatedGatewayHandle,
    mut rest: mpsc::UnboundedReceiver<SimulatedGatewayHandle>,
) -> mpsc::UnboundedReceiver<SimulatedGatewayHandle> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(first);
    tokio::spawn(async move {
        while let Some(handle) = rest.recv().await {
            if tx.send(handle).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::test(start_paused = true)]
async fn test_connect_flow_reaches_connected() {
    let (handle, _factory, mut gateways, _) = start_supervised(scenario_config()).await;
    let sim = gateways.recv().await.unwrap();

    sim.emit_status("connecting");
    settle().await;
    let snap = handle.state().await.unwrap();
    assert_eq!(snap.status, LinkStatus::Connecting);
    assert!(snap.has_active_establishment_timer);

    sim.emit_status("open");
    settle().await;
    let snap = handle.state().await.unwrap();
    assert!(snap.is_connected);
    assert_eq!(snap.retry_count, 0);
    assert!(!snap.is_reconnecting);
    assert!(!snap.has_active_establishment_timer);
    assert!(!snap.has_active_reconnection_timer);
}

#[tokio::test(start_paused = true)]
async fn test_establishment_timeout_rebuilds_gateway() {
    let (handle, factory, mut gateways, binder) = start_supervised(scenario_config()).await;
    let sim = gateways.recv().await.unwrap();

    sim.emit_status("connecting");
    settle().await;

    // Deadline passes with no success signal.
    advance(2_000).await;
    let snap = handle.state().await.unwrap();
    assert!(snap.is_reconnecting);
    assert_eq!(snap.retry_count, 1);
    assert!(snap.has_active_reconnection_timer);

    // No prior attempt recorded, so the delay is the base retry delay.
    advance(1_000).await;
    assert_eq!(factory.built_count(), 2);
    assert_eq!(binder.bound.load(Ordering::SeqCst), 1);

    // The replacement instance connects; the superseded one is gone.
    let replacement = gateways.recv().await.unwrap();
    replacement.emit_status("open");
    settle().await;
    let snap = handle.state().await.unwrap();
    assert!(snap.is_connected);
    assert_eq!(snap.retry_count, 0);
    assert!(!sim.emit_status("open"), "old instance should be dropped");
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_recovers_on_new_instance() {
    let (handle, factory, mut gateways, _) = start_supervised(scenario_config()).await;
    let sim = gateways.recv().await.unwrap();

    sim.emit_status("open");
    settle().await;
    assert!(handle.state().await.unwrap().is_connected);

    sim.emit_status("closed");
    settle().await;
    let snap = handle.state().await.unwrap();
    assert_eq!(snap.status, LinkStatus::Disconnected);
    assert_eq!(snap.retry_count, 1);

    advance(1_000).await;
    assert_eq!(factory.built_count(), 2);

    let replacement = gateways.recv().await.unwrap();
    replacement.emit_status("open");
    settle().await;
    let snap = handle.state().await.unwrap();
    assert!(snap.is_connected);
    assert_eq!(snap.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_construction_failures_exhaust_shared_budget() {
    let config = LinkConfig {
        max_retries: 2,
        ..scenario_config()
    };
    let (handle, factory, mut gateways, _) = start_supervised(config).await;
    let sim = gateways.recv().await.unwrap();
    factory.fail_next(u32::MAX);

    sim.emit_status("closed");
    settle().await;
    assert_eq!(handle.state().await.unwrap().retry_count, 1);

    // Attempt 1 executes and fails to construct; attempt 2 is spaced by the
    // minimum attempt interval on top of the base delay.
    advance(1_000).await;
    let snap = handle.state().await.unwrap();
    assert_eq!(snap.retry_count, 2);
    assert!(snap.has_active_reconnection_timer);

    // Attempt 2 also fails to construct; the budget is spent.
    advance(6_000).await;
    let snap = handle.state().await.unwrap();
    assert_eq!(snap.retry_count, 2);
    assert!(!snap.is_reconnecting);
    assert!(!snap.has_active_reconnection_timer);
    assert!(!snap.has_active_establishment_timer);
    assert_eq!(snap.status, LinkStatus::Disconnected);
    assert_eq!(factory.built_count(), 1);

    // Later failures only report exhaustion; the controller stays alive
    // and inert. The initial instance is gone, so inject directly.
    assert!(!sim.emit_status("error"));
    handle.notify_status("error").unwrap();
    settle().await;
    let snap = handle.state().await.unwrap();
    assert_eq!(snap.retry_count, 2);
    assert!(!snap.has_active_reconnection_timer);
}

#[tokio::test(start_paused = true)]
async fn test_stale_establishment_timer_cannot_fire_after_success() {
    let (handle, factory, mut gateways, _) = start_supervised(scenario_config()).await;
    let sim = gateways.recv().await.unwrap();

    sim.emit_status("connecting");
    settle().await;
    sim.emit_status("open");
    settle().await;

    // Well past the old deadline: nothing must happen.
    advance(10_000).await;
    let snap = handle.state().await.unwrap();
    assert!(snap.is_connected);
    assert_eq!(snap.retry_count, 0);
    assert_eq!(factory.built_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connecting_chatter_is_debounced() {
    let (handle, _factory, mut gateways, _) = start_supervised(scenario_config()).await;
    let sim = gateways.recv().await.unwrap();

    sim.emit_status("connecting");
    settle().await;
    let first = handle.state().await.unwrap();

    advance(500).await;
    sim.emit_status("connecting");
    settle().await;
    let second = handle.state().await.unwrap();

    assert_eq!(
        first.last_connecting_event_at,
        second.last_connecting_event_at
    );
    assert!(second.has_active_establishment_timer);
}

#[tokio::test(start_paused = true)]
async fn test_succeeded_cancels_pending_reconnection() {
    let (handle, factory, mut gateways, _) = start_supervised(scenario_config()).await;
    let sim = gateways.recv().await.unwrap();

    sim.emit_status("closed");
    settle().await;
    assert!(handle.state().await.unwrap().has_active_reconnection_timer);

    // The old client recovered on its own before the attempt executed.
    sim.emit_status("open");
    settle().await;
    let snap = handle.state().await.unwrap();
    assert!(snap.is_connected);
    assert_eq!(snap.retry_count, 0);
    assert!(!snap.has_active_reconnection_timer);

    // The cancelled attempt never executes.
    advance(10_000).await;
    assert_eq!(factory.built_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_requires_initialize() {
    let (factory, _handles) = SimulatedFactory::new();
    let (controller, _handle) = ControllerBuilder::new()
        .link_config(scenario_config())
        .factory(factory)
        .binder(CountingBinder::new())
        .build()
        .unwrap();

    assert!(controller.run().await.is_err());
}

// ----------------------------------------------------------------------------
// Single-flight across the construction await
// ----------------------------------------------------------------------------

/// Factory whose builds block until the test releases them.
struct GatedFactory {
    gate: Arc<Semaphore>,
    built: AtomicU32,
    handles: mpsc::UnboundedSender<SimulatedGatewayHandle>,
}

#[async_trait]
impl GatewayFactory for GatedFactory {
    async fn build(&self, config: &GatewayConfig) -> Result<Box<dyn Gateway>> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| LinkError::construction("gate closed"))?;
        permit.forget();
        let n = self.built.fetch_add(1, Ordering::SeqCst) + 1;
        let (gateway, handle) = simulated_gateway(format!("{}#{n}", config.device_name));
        let _ = self.handles.send(handle);
        Ok(Box::new(gateway))
    }
}

#[tokio::test(start_paused = true)]
async fn test_failure_during_construction_does_not_stack_attempts() {
    let gate = Arc::new(Semaphore::new(0));
    let (handles_tx, mut handles_rx) = mpsc::unbounded_channel();
    let factory = Arc::new(GatedFactory {
        gate: gate.clone(),
        built: AtomicU32::new(0),
        handles: handles_tx,
    });

    let (mut controller, handle) = ControllerBuilder::new()
        .link_config(scenario_config())
        .factory(factory.clone())
        .binder(CountingBinder::new())
        .build()
        .unwrap();

    let (first, sim) = simulated_gateway("initial");
    controller.initialize(Box::new(first)).unwrap();
    tokio::spawn(controller.run());
    settle().await;

    sim.emit_status("closed");
    settle().await;
    advance(1_000).await;

    // The attempt is now blocked inside construction. A failure arriving
    // here must not start a second concurrent attempt.
    handle.notify_status("closed").unwrap();
    settle().await;
    assert_eq!(factory.built.load(Ordering::SeqCst), 0);

    // Release construction: the queued failure is then processed
    // sequentially and schedules attempt two.
    gate.add_permits(1);
    settle().await;
    let snap = handle.state().await.unwrap();
    assert_eq!(factory.built.load(Ordering::SeqCst), 1);
    assert_eq!(snap.retry_count, 2);
    assert!(snap.is_reconnecting);
    assert!(snap.has_active_reconnection_timer);
    assert!(handles_rx.try_recv().is_ok());
}
