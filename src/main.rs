//! gracewatch - HTTP uptime monitor with grace-period alerting.
//!
//! Probes one endpoint on an interval, records every outcome, alerts only after
//! a run of consecutive failures, and serves uptime statistics over HTTP.

mod config;
mod db;
mod monitor;
mod notify;
mod probe;
mod scheduler;
mod web;

use config::Config;
use db::SqliteStore;
use monitor::Monitor;
use notify::{ConsoleNotifier, Notifier, WebhookNotifier};
use probe::HttpProber;
use scheduler::{RetentionManager, Scheduler};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("gracewatch=info".parse()?))
        .init();

    // Load configuration; a misconfigured monitor must not start.
    let cfg = Config::load()?;
    tracing::info!(
        "Starting gracewatch for {} ({} {})",
        cfg.target.service_name,
        cfg.target.method,
        cfg.target.url
    );
    tracing::info!("Using database at {}", cfg.server.db_path);

    let store = Arc::new(SqliteStore::new(&cfg.server.db_path)?);
    tracing::info!("Database initialized successfully");

    let prober = Arc::new(HttpProber::new(&cfg.target)?);

    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if cfg.alerts.console {
        notifiers.push(Arc::new(ConsoleNotifier));
    }
    if let Some(url) = &cfg.alerts.webhook_url {
        notifiers.push(Arc::new(WebhookNotifier::new(url.clone())?));
    }
    if notifiers.is_empty() {
        tracing::warn!("No notifiers enabled; outages will only be recorded");
    }

    let monitor = Arc::new(Monitor::new(
        cfg.target.service_name.clone(),
        cfg.alerts.grace_period,
        prober,
        store.clone(),
        notifiers,
    ));

    let scheduler = Scheduler::new(monitor.clone(), cfg.target.interval);
    scheduler.start().await;

    let retention = match cfg.retention {
        Some(max_age) => {
            let manager = RetentionManager::new(store.clone(), max_age);
            manager.start().await;
            Some(manager)
        }
        None => None,
    };

    let server = Server::new(cfg, monitor);
    server.start(shutdown_signal()).await?;

    scheduler.stop().await;
    if let Some(manager) = &retention {
        manager.stop().await;
    }
    tracing::info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
