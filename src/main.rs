use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contact_intel::cache::EnrichmentCache;
use contact_intel::config::Config;
use contact_intel::enrichment::EnrichmentOrchestrator;
use contact_intel::handlers::{self, AppState};
use contact_intel::pipeline::Pipeline;
use contact_intel::scoring::ScoringEngine;
use contact_intel::sources::build_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contact_intel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let registry = build_registry(&config)?;
    let enabled = registry.iter().filter(|a| a.is_enabled()).count();
    if enabled == 0 {
        tracing::warn!("⚠ No enrichment sources enabled; contacts will only be merged and scored");
    }

    let cache = EnrichmentCache::new(
        config.orchestrator.cache_ttl,
        config.orchestrator.cache_max_entries,
    );
    if let Some(path) = &config.orchestrator.cache_snapshot_path {
        match cache.load_snapshot(path).await {
            Ok(loaded) => tracing::info!("✓ Restored {} cache entries from {}", loaded, path.display()),
            Err(e) => tracing::warn!("Cache snapshot not restored from {}: {}", path.display(), e),
        }
    }
    tracing::info!(
        "Enrichment cache initialized ({}h TTL, {} capacity)",
        config.orchestrator.cache_ttl.as_secs() / 3600,
        config.orchestrator.cache_max_entries
    );

    let orchestrator =
        EnrichmentOrchestrator::new(registry, cache.clone(), config.orchestrator.clone());
    let engine = ScoringEngine::new(config.scoring_weights.clone(), config.ai_sentiment_enabled);

    let app_state = Arc::new(AppState {
        config: config.clone(),
        pipeline: Pipeline::new(orchestrator, engine),
    });

    // 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .route("/api/v1/pipeline/run", post(handlers::run_pipeline))
        .route("/api/v1/contacts/merge", post(handlers::merge_contacts))
        .route("/api/v1/contacts/score", post(handlers::score_contacts))
        .route("/api/v1/enrichment/sources", get(handlers::list_sources))
        .route("/api/v1/cache/stats", get(handlers::cache_stats))
        .layer(
            ServiceBuilder::new()
                // 5MB max payload
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(path) = &config.orchestrator.cache_snapshot_path {
        match cache.save_snapshot(path).await {
            Ok(saved) => tracing::info!("✓ Saved {} cache entries to {}", saved, path.display()),
            Err(e) => tracing::error!("✗ Failed to save cache snapshot: {}", e),
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
