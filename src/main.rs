use collector::{AuthorEligibilityFilter, CollectionPipeline, LoungeCollector};
use loungewatch_core::AppConfig;
use reddit_client::RedditApiClient;
use std::sync::Arc;
use tickers::{TickerCatalog, TickerExtractor};
use tracing_subscriber::EnvFilter;
use update_service::{run_scheduler, RunOutcome, SnapshotStore, TriggerOutcome, UpdateOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Loungewatch - Reddit ticker pipeline");

    let config = AppConfig::from_env()?;
    tracing::info!(
        "Filters: minimum {} comment karma, minimum {} days account age",
        config.filter_policy.min_comment_karma,
        config.filter_policy.min_account_age_days
    );

    let catalog = TickerCatalog::load(&config.tickers_file);
    tracing::info!(
        "Ticker catalog: {} valid symbols, {} excluded common words",
        catalog.len(),
        catalog.excluded_count()
    );

    let client = Arc::new(RedditApiClient::new(
        config.user_agent.clone(),
        config.pacing_delay,
    )?);
    let extractor = Arc::new(TickerExtractor::new(catalog));
    let filter = AuthorEligibilityFilter::new(config.filter_policy);
    let pipeline: Arc<dyn CollectionPipeline> = Arc::new(LoungeCollector::new(
        client,
        extractor,
        filter,
        config.subreddit.clone(),
        config.thread_query.clone(),
    ));

    let store = SnapshotStore::new(config.data_file.clone(), config.metadata_file.clone());
    let orchestrator = Arc::new(UpdateOrchestrator::new(
        pipeline,
        store,
        config.scrape_timeout,
    ));

    tracing::info!("Running initial update before starting the scheduler");
    match orchestrator.run_once().await {
        TriggerOutcome::Completed(RunOutcome::Succeeded) => {
            tracing::info!("Initial update completed successfully")
        }
        TriggerOutcome::Completed(outcome) => {
            tracing::warn!("Initial update ended with {:?}; will retry on schedule", outcome)
        }
        TriggerOutcome::AlreadyRunning(_) => unreachable!("no other trigger exists yet"),
    }

    let scheduler = tokio::spawn(run_scheduler(
        Arc::clone(&orchestrator),
        config.refresh_interval,
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down scheduler");
    scheduler.abort();
    Ok(())
}
