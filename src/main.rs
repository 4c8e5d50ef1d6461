// Entry point of the group moderation bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (transport-agnostic)
// - `infra/` = Implementations of core traits (snapshot file, messaging gateway)
// - `bot/` = Adapters that turn gateway events into core calls and outbound actions
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Connect to the gateway
// 4. Run the event loop and the rental checker until Ctrl+C

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "bot/bot_layer.rs"]
mod bot;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::bot::config::BotConfig;
use crate::bot::events::handle_event;
use crate::bot::scheduler::RentalScheduler;
use crate::bot::Data;
use crate::core::state::StateStore;
use crate::infra::gateway::HttpGateway;
use crate::infra::snapshot::JsonSnapshotStore;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Upper bound on the wait between polls after the gateway failed.
const MAX_POLL_BACKOFF: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        bot = %config.bot_name,
        data_dir = %config.data_dir.display(),
        timezone = %config.timezone,
        "Bot is starting up"
    );

    // ============================================================================
    // STORAGE
    // ============================================================================

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("Failed to create data dir {}", config.data_dir.display()))?;
    let snapshots = Arc::new(JsonSnapshotStore::in_dir(&config.data_dir));
    let store = Arc::new(
        StateStore::open(snapshots, &config.default_prefix)
            .await
            .context("Failed to open moderation state")?,
    );

    // ============================================================================
    // GATEWAY
    // ============================================================================

    let gateway = Arc::new(
        HttpGateway::new(
            &config.gateway_url,
            config.gateway_token.as_deref(),
            config.action_timeout,
        )
        .context("Failed to build gateway client")?,
    );
    gateway
        .connect()
        .await
        .context("Failed to connect to the messaging gateway")?;

    let poll_interval = config.gateway_poll_interval;
    let data = Data::new(config, store, gateway.clone());

    // ============================================================================
    // BACKGROUND TASKS
    // ============================================================================

    let token = CancellationToken::new();
    let scheduler = tokio::spawn(RentalScheduler::new(data.clone()).run(token.clone()));
    let events = tokio::spawn(run_event_loop(gateway, data, poll_interval, token.clone()));

    tracing::info!("Bot is ready");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Shutdown requested");

    token.cancel();
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Rental checker task failed");
    }
    if let Err(e) = events.await {
        tracing::error!(error = %e, "Event loop task failed");
    }
    tracing::info!("Bot stopped");
    Ok(())
}

/// Pull events from the gateway and hand each one to its own task.
async fn run_event_loop(
    gateway: Arc<HttpGateway>,
    data: Data,
    poll_interval: Duration,
    token: CancellationToken,
) {
    let mut cursor = 0u64;
    let mut backoff = poll_interval;
    let mut tasks = JoinSet::new();

    loop {
        let batch = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            batch = gateway.poll_events(cursor) => batch,
        };

        let idle = match batch {
            Ok(batch) => {
                backoff = poll_interval;
                cursor = batch.cursor;
                let idle = batch.events.is_empty();
                for event in batch.events {
                    let data = data.clone();
                    tasks.spawn(async move {
                        if let Err(e) = handle_event(&data, event).await {
                            tracing::error!(error = %e, "Event handler failed");
                        }
                    });
                }
                idle
            }
            Err(e) => {
                tracing::warn!(error = %e, cursor, "Event poll failed");
                backoff = (backoff * 2).min(MAX_POLL_BACKOFF);
                true
            }
        };

        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                tracing::error!(error = %e, "Event task panicked");
            }
        }

        if idle {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    tracing::info!(in_flight = tasks.len(), "Event loop stopping, draining tasks");
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Event task panicked");
        }
    }
}
