//! Command implementations.
//!
//! The binary supervises the in-memory simulated gateway: the point of the
//! harness is exercising the lifecycle controller, not shipping a protocol
//! client. Real deployments embed `relink-runtime` and inject their own
//! `GatewayFactory` and `HandlerBinder`.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use relink_core::{GatewayFactory, HandlerBinder, LinkSnapshot, Result as LinkResult};
use relink_runtime::{ControllerBuilder, LinkHandle, LoggingBinder, SimulatedFactory};

use crate::config::AppConfig;
use crate::error::Result;
use crate::script::ScriptStep;

/// Build, initialize, and spawn a controller over the simulated gateway.
async fn start_controller(config: &AppConfig) -> Result<(LinkHandle, JoinHandle<LinkResult<()>>)> {
    let (factory, instance_handles) = SimulatedFactory::new();
    let binder = Arc::new(LoggingBinder);

    let (mut controller, handle) = ControllerBuilder::new()
        .link_config(config.link.clone())
        .gateway_config(config.gateway.clone())
        .factory(factory.clone())
        .binder(binder.clone())
        .build()?;

    // The application owns the first instance: build it and attach the
    // domain handlers before handing it to the controller.
    let mut first = factory.build(&config.gateway).await?;
    binder.bind(first.as_mut())?;
    controller.initialize(first)?;

    // Rebuilt instances are driven through the controller handle in this
    // harness, not through their own emit handles.
    drop(instance_handles);

    let task = tokio::spawn(controller.run());
    Ok((handle, task))
}

/// `relink run`: supervise until interrupted, injecting stdin lines as raw
/// status tokens.
pub async fn run(config: AppConfig, report_interval_secs: Option<u64>) -> Result<()> {
    let (handle, task) = start_controller(&config).await?;
    info!(endpoint = %config.gateway.endpoint, "supervising gateway link (ctrl-c to stop)");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut report = report_interval_secs
        .map(|secs| tokio::time::interval(Duration::from_secs(secs.max(1))));
    if let Some(interval) = report.as_mut() {
        // The first tick fires immediately; skip it.
        interval.tick().await;
    }

    loop {
        tokio::select! {
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let token = line.trim();
                    if !token.is_empty() {
                        handle.notify_status(token)?;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(error) => {
                    warn!(%error, "stdin closed");
                    stdin_open = false;
                }
            },
            _ = tick(report.as_mut()) => {
                let snapshot = handle.state().await?;
                log_snapshot(&snapshot);
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("interrupt received, shutting down");
                break;
            }
        }
    }

    handle.shutdown();
    if let Ok(result) = task.await {
        result?;
    }
    Ok(())
}

/// Tick the report interval, or never when reporting is off.
async fn tick(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// `relink simulate`: replay a scripted status sequence and print the
/// snapshot after every step.
pub async fn simulate(config: AppConfig, steps: Vec<ScriptStep>, json: bool) -> Result<()> {
    let (handle, task) = start_controller(&config).await?;
    let start = tokio::time::Instant::now();

    for step in &steps {
        tokio::time::sleep_until(start + step.at).await;
        handle.notify_status(step.token.as_str())?;
        // Give the controller a beat to process before sampling.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = handle.state().await?;
        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            info!(step = %step.token, at_ms = step.at.as_millis() as u64, "step injected");
            log_snapshot(&snapshot);
        }
    }

    let snapshot = handle.state().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        info!("replay finished");
        log_snapshot(&snapshot);
    }

    handle.shutdown();
    if let Ok(result) = task.await {
        result?;
    }
    Ok(())
}

/// `relink check-config`: print the effective layered configuration.
pub fn check_config(config: &AppConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

fn log_snapshot(snapshot: &LinkSnapshot) {
    info!(
        status = snapshot.status.as_str(),
        connected = snapshot.is_connected,
        reconnecting = snapshot.is_reconnecting,
        retries = snapshot.retry_count,
        establishment_timer = snapshot.has_active_establishment_timer,
        reconnection_timer = snapshot.has_active_reconnection_timer,
        "link state"
    );
}
