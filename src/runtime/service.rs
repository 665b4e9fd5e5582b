//! # Service Loop
//!
//! Long-running mode: HTTP server plus scheduler until SIGINT/SIGTERM.
//! Also the one-shot `once` and `plan` entry points.

use crate::config::SyncConfig;
use crate::controller::reconciler::Plan;
use crate::controller::scheduler::Scheduler;
use crate::controller::server::{start_server, ServerState};
use crate::model::ReconciliationReport;
use crate::runtime::initialization::build_components;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Run passes on the configured interval until a shutdown signal arrives.
///
/// A pass already in flight when the signal arrives runs to completion.
///
/// # Errors
/// Returns an error if the collaborators cannot be built
pub async fn run_service(config: SyncConfig) -> Result<()> {
    let components = build_components(&config)?;

    let scheduler = Scheduler::new(
        Arc::clone(&components.reconciler),
        config.poll_interval(),
        config.sync.run_on_start,
    );

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
        trigger: Some(scheduler.trigger_handle()),
        last_report: components.last_report,
    });

    let server_handle = if config.server.enabled {
        let state = Arc::clone(&server_state);
        let port = config.server.port;
        Some(tokio::spawn(async move {
            if let Err(e) = start_server(port, state).await {
                error!("HTTP server error: {}", e);
            }
        }))
    } else {
        info!("HTTP server disabled");
        None
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    server_state.is_ready.store(true, Ordering::Relaxed);
    info!(
        poll_interval_secs = config.sync.poll_interval_secs,
        "✅ roster-sync running"
    );

    tokio::select! {
        () = shutdown_signal() => {
            info!("Received shutdown signal, finishing in-flight pass...");
        }
        result = &mut scheduler_handle => {
            warn!("Scheduler exited unexpectedly: {:?}", result);
        }
    }

    server_state.is_ready.store(false, Ordering::Relaxed);
    let _ = shutdown_tx.send(true);
    if !scheduler_handle.is_finished() {
        if let Err(e) = scheduler_handle.await {
            error!("Scheduler task failed: {}", e);
        }
    }
    if let Some(handle) = server_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

/// Run exactly one pass and return its report
///
/// # Errors
/// Returns an error if the collaborators cannot be built
pub async fn run_once(config: SyncConfig) -> Result<ReconciliationReport> {
    let components = build_components(&config)?;
    Ok(components.reconciler.run_pass().await)
}

/// Fetch and diff without writing anything
///
/// # Errors
/// Returns an error if the collaborators cannot be built or a fetch fails
pub async fn run_plan(config: SyncConfig) -> Result<Plan> {
    let components = build_components(&config)?;
    components
        .reconciler
        .plan()
        .await
        .context("Failed to compute plan")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
