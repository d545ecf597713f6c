//! newsloom: harvest curated RSS/Atom feeds into enriched JSON articles.
//!
//! One invocation is one bounded ingestion run: fetch the active feeds,
//! drop near-duplicate stories, normalize survivors into canonical
//! articles, enrich them through an OpenAI-compatible model service (with
//! graceful fallback when the service is unavailable), and upsert the
//! results as JSON files keyed by a stable URL-derived id.

mod breaker;
mod cli;
mod config;
mod dedup;
mod enrich;
mod feeds;
mod models;
mod normalize;
mod orchestrator;
mod scrape;
mod store;
mod utils;

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(UtcTime::rfc_3339())
        .init();

    let args = cli::Cli::parse();
    info!(config = %args.config, output = %args.output_dir, "Starting newsloom");

    let config = config::load_config(&args.config)?;
    let mut engine_settings = config.engine.clone();
    engine_settings.api_key = args.api_key.clone();
    if let Some(base) = &args.api_base {
        engine_settings.api_base_url = base.clone();
    }
    if engine_settings.api_key.is_none() {
        info!("No API key provided; articles will use fallback enrichment");
    }

    utils::ensure_writable_dir(&args.output_dir).await?;

    let client = enrich::client::HttpModelClient::new(
        &engine_settings.api_base_url,
        engine_settings.api_key.clone(),
    );
    let engine = enrich::EnrichmentEngine::new(Box::new(client), engine_settings);
    let normalizer = normalize::Normalizer::new(Arc::new(scrape::HttpPageSource::new()));
    let store = Arc::new(store::JsonFileStore::new(&args.output_dir));
    let fetcher = Arc::new(feeds::HttpFeedFetcher::new());

    let orchestrator = orchestrator::Orchestrator::new(
        config.active_feeds(None),
        fetcher,
        normalizer,
        engine,
        store,
    );

    let options = orchestrator::IngestOptions {
        max_items: args.max_items,
        time_budget: Duration::from_secs(args.time_budget_secs),
        category: args.category.clone(),
    };
    let stats = orchestrator.run(&options).await;

    info!(
        processed = stats.processed,
        fallbacks = stats.fallbacks,
        duplicates_dropped = stats.duplicates_dropped,
        feeds_fetched = stats.feeds_fetched,
        feeds_failed = stats.feeds_failed,
        feeds_skipped = stats.feeds_skipped,
        errors = stats.errors,
        duration_ms = stats.duration_ms,
        "Ingestion run finished"
    );
    Ok(())
}
