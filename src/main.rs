use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use procurement_api as api;
use api::{
    clock::{Clock, SystemClock},
    services::WorkflowEngine,
    store::{EntityStore, InMemoryStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let store: Arc<dyn EntityStore> = match cfg.store.snapshot_path.as_ref() {
        Some(path) => Arc::new(
            InMemoryStore::open(path)
                .await
                .with_context(|| format!("failed to open snapshot {}", path.display()))?,
        ),
        None => {
            warn!("no store.snapshot_path configured; records live in memory only");
            Arc::new(InMemoryStore::new())
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let app_state = api::AppState::bootstrap(cfg.clone(), store, clock);
    tokio::spawn(run_sweeper(
        app_state.workflow.clone(),
        cfg.sweep_interval(),
    ));

    let app = api::build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("procurement-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Closes expired RFQs and flags overdue installments on every tick.
/// A failed sweep is logged and retried on the next tick.
async fn run_sweeper(workflow: WorkflowEngine, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match workflow.run_sweeps().await {
            Ok(report) => info!(
                today = %report.today,
                closed_rfqs = report.closed_rfqs.len(),
                overdue_payments = report.overdue_payments.len(),
                "sweep finished"
            ),
            Err(e) => error!(error = %e, "sweep failed"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
