//! Floodwatch Service Entry Point
//!
//! Wires the pipeline together: data source -> forecast engine ->
//! issuance policy -> store -> dispatcher, runs the monitor loop in the
//! background, and serves the query API until Ctrl+C.

use alerting::DedupPolicy;
use api::{create_router, init_logging, AppState, Settings};
use forecast::{ForecastEngine, JitterExtrapolation};
use monitor::{MonitorLoop, SimulatedSource};
use notify::{Dispatcher, EmailGatewayChannel, NotificationChannel, WebhookChannel};
use risk_model::ThresholdPredictor;
use std::sync::Arc;
use storage::AlertStore;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let settings = Settings::load()?;
    info!(
        "Starting floodwatch: {} regions, db={}",
        settings.regions.len(),
        settings.database_url
    );

    let store = Arc::new(AlertStore::connect(&settings.database_url).await?);

    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
    if let Some(url) = &settings.notify.webhook_url {
        channels.push(Box::new(WebhookChannel::new(url.clone())));
    }
    if let Some(email) = &settings.notify.email {
        channels.push(Box::new(EmailGatewayChannel::new(
            email.gateway_url.clone(),
            email.sender.clone(),
            email.recipients.clone(),
        )));
    }
    if channels.is_empty() {
        warn!("No notification channels configured; alerts will be stored but not delivered");
    }
    let dispatcher = Arc::new(Dispatcher::new(
        channels,
        store.clone(),
        settings.notify.dispatcher_config(),
    ));

    let engine = Arc::new(ForecastEngine::new(
        Arc::new(ThresholdPredictor::new()),
        Box::new(JitterExtrapolation::new()),
    ));
    let policy = Arc::new(DedupPolicy::new(settings.dedup.clone()));
    let source = Arc::new(SimulatedSource::new(settings.regions()));

    let monitor = Arc::new(MonitorLoop::new(
        source,
        engine,
        policy,
        store.clone(),
        dispatcher,
        settings.monitor.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_task = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run(shutdown_rx).await }
    });

    let state = Arc::new(AppState::new(store));
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&settings.listen_addr).await?;
    info!("API listening on {}", settings.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    monitor_task.await?;
    info!("Floodwatch stopped");
    Ok(())
}
