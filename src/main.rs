use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use storesim::actions::build_actions;
use storesim::catalog::SharedCatalog;
use storesim::driver::Worker;
use storesim::executor::RetryPolicy;
use storesim::scheduler::renormalize;
use storesim::service::ProductService;
use storesim::stats::RunStats;
use storesim::SimConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = SimConfig::from_env().context("invalid configuration")?;
    let actions = build_actions(&config.weight_overrides, &config.caps)
        .context("invalid action weights")?;

    let weights: Vec<f64> = actions.iter().map(|action| action.weight).collect();
    for (action, share) in actions.iter().zip(renormalize(&weights)) {
        tracing::info!(
            action = action.kind.name(),
            weight = action.weight,
            share = format!("{share:.3}").as_str(),
            cap = action.cap,
            "action configured"
        );
    }
    tracing::info!(
        url = %config.base_url,
        workers = config.workers,
        mode = ?config.mode,
        pace_ms = config.pace().as_millis() as u64,
        "starting simulation"
    );

    let service = ProductService::new(&config.base_url, config.request_timeout);
    let catalog = SharedCatalog::new();
    let stats = Arc::new(RunStats::new());
    let policy = RetryPolicy {
        max_attempts: config.max_attempts,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::with_capacity(config.workers);
    for id in 0..config.workers {
        let worker = Worker::new(
            id,
            service.clone(),
            catalog.clone(),
            actions.clone(),
            Arc::clone(&stats),
            policy.clone(),
            config.pace(),
        );
        handles.push(tokio::spawn(worker.run(shutdown_rx.clone())));
    }
    drop(shutdown_rx);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received, draining workers");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "worker task panicked");
        }
    }

    stats.log_summary();
    Ok(())
}
