//! sales-relay server entry point.
//!
//! Wires the ledger, upstream clients, sinks and dispatchers from the
//! environment and starts the Axum HTTP server.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sales_relay::api;
use sales_relay::app_state::AppState;
use sales_relay::config::{LedgerBackend, RelayConfig};
use sales_relay::domain::TraitTable;
use sales_relay::error::RelayError;
use sales_relay::ledger::{MemoryLedger, PostgresLedger};
use sales_relay::pipeline::{Deduplicator, Enricher, Normalizer, Presentation, RateLimitedDispatcher};
use sales_relay::service::{Dispatchers, RelayService, TopSalesAggregator, Upstream};
use sales_relay::sink::DiscordWebhookSink;
use sales_relay::upstream::{
    ChainedMetadata, DasMetadata, HttpTransactionParser, MarketplaceFeed, SnapshotMetadata,
};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_dedup(config: &RelayConfig) -> Result<Deduplicator, RelayError> {
    match config.ledger_backend {
        LedgerBackend::Postgres => {
            let connected = match PostgresLedger::connect(config).await {
                Ok(ledger) => ledger.migrate().await.map(|()| ledger),
                Err(e) => Err(e),
            };
            match connected {
                Ok(ledger) => {
                    tracing::info!("dedup backed by postgres ledger");
                    Ok(Deduplicator::persistent(Arc::new(ledger), config.seller_repeat_window))
                }
                Err(e) if config.allow_degraded_dedup => {
                    tracing::warn!(
                        error = %e,
                        "ledger unreachable; running DEGRADED window dedup (no restart safety, no top sales)"
                    );
                    Ok(Deduplicator::recent_window())
                }
                Err(e) => Err(e),
            }
        }
        LedgerBackend::Memory => {
            tracing::info!("dedup backed by in-memory ledger; state is lost on restart");
            Ok(Deduplicator::persistent(
                Arc::new(MemoryLedger::new()),
                config.seller_repeat_window,
            ))
        }
        LedgerBackend::Window => {
            tracing::warn!("running DEGRADED window dedup (no restart safety, no top sales)");
            Ok(Deduplicator::recent_window())
        }
    }
}

fn build_metadata(config: &RelayConfig) -> Result<ChainedMetadata, RelayError> {
    let mut chain = ChainedMetadata::new();
    if let Some(path) = &config.metadata_snapshot_path {
        let snapshot = SnapshotMetadata::load(path)?;
        tracing::info!(items = snapshot.len(), path = %path.display(), "metadata snapshot loaded");
        chain = chain.with(Arc::new(snapshot));
    }
    if let Some(url) = &config.asset_rpc_url {
        chain = chain.with(Arc::new(DasMetadata::new(url.as_str(), config.http_timeout)?));
    }
    if chain.is_empty() {
        tracing::warn!(
            "neither METADATA_SNAPSHOT_PATH nor ASSET_RPC_URL is set; every listing will be skipped"
        );
    }
    Ok(chain)
}

fn load_traits(config: &RelayConfig) -> Result<TraitTable, RelayError> {
    let table = match &config.trait_table_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| RelayError::Config(format!("{}: {e}", path.display())))?;
            TraitTable::from_json(&json)
        }
        None => TraitTable::embedded(),
    };
    table.map_err(|e| RelayError::Config(format!("trait table: {e}")))
}

fn build_dispatchers(config: &RelayConfig) -> Result<Dispatchers, RelayError> {
    let sales = RateLimitedDispatcher::spawn(
        Arc::new(DiscordWebhookSink::new(config.sales_webhook_url.as_str(), config.http_timeout)?),
        config.dispatch_interval,
    );
    if config.listings_webhook_url == config.sales_webhook_url {
        return Ok(Dispatchers::shared(sales));
    }
    let listings = RateLimitedDispatcher::spawn(
        Arc::new(DiscordWebhookSink::new(config.listings_webhook_url.as_str(), config.http_timeout)?),
        config.dispatch_interval,
    );
    Ok(Dispatchers { sales, listings })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(RelayConfig::log_json_from_env());

    // Load configuration
    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };
    tracing::info!(
        addr = %config.listen_addr,
        collection = %config.collection,
        backend = ?config.ledger_backend,
        "starting sales-relay"
    );

    // Reference data and collaborators
    let traits = Arc::new(load_traits(&config)?);
    tracing::info!(trait_types = traits.len(), "trait table loaded");
    let metadata = Arc::new(build_metadata(&config)?);
    let dedup = Arc::new(build_dedup(&config).await?);
    let dispatchers = build_dispatchers(&config)?;
    tracing::info!(
        interval_ms = dispatchers.sales.min_interval().as_millis(),
        "notification dispatchers started"
    );
    let feed = MarketplaceFeed::new(
        &config.marketplace_api_url,
        &config.collection,
        config.activity_page_limit,
        config.http_timeout,
    )?;
    tracing::info!(url = %feed.url(), "activity feed configured");
    let upstream = Upstream {
        feed: Arc::new(feed),
        parser: Arc::new(HttpTransactionParser::new(
            config.parser_api_url.as_str(),
            config.parser_api_key.clone(),
            config.parser_network.as_str(),
            config.http_timeout,
        )?),
    };

    // Build service layer
    let presentation = Presentation {
        collection_label: config.collection_label.clone(),
        footer_text: config.footer_text.clone(),
        footer_icon_url: config.footer_icon_url.clone(),
    };
    let aggregator = Arc::new(TopSalesAggregator::new(
        dedup.ledger().map(Arc::clone),
        dispatchers.sales.clone(),
        config.collection.as_str(),
        config.top_sales_limit,
        config.top_sales_window,
        presentation.clone(),
    ));
    let relay = Arc::new(RelayService::new(
        Normalizer::new(config.collection.as_str(), config.native_decimals),
        dedup,
        Enricher::new(metadata, traits, presentation),
        dispatchers,
        upstream,
        config.batch_budget,
    ));

    let app_state = AppState { relay, aggregator };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
