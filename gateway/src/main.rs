//! Green Miles node binary

use anyhow::Context;
use claims_service::InMemoryCatalog;
use gateway::{Config, RewardsService};
use std::sync::Arc;
use trip_engine::StaticAttestor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Green Miles node");

    let config = Config::load().context("loading configuration")?;
    tracing::info!(data_dir = %config.ledger.data_dir.display(), "Configuration loaded");

    // No attestation collaborator or catalog admin is wired in a standalone node
    let service = RewardsService::open(
        &config,
        Arc::new(StaticAttestor::trusting()),
        Arc::new(InMemoryCatalog::sample()),
    )
    .context("opening rewards service")?;

    let report = service.reconcile_all().await;
    tracing::info!(
        checked = report.checked,
        balanced = report.balanced,
        violations = report.violations.len(),
        "Startup reconciliation complete"
    );

    service.resume_pending().await.context("resuming pending trips")?;

    let scheduler = Arc::new(service.maturity_scheduler());
    let sweeper = tokio::spawn(scheduler.start());

    tokio::signal::ctrl_c().await?;

    sweeper.abort();
    tracing::info!("Shutting down Green Miles node");
    Ok(())
}
