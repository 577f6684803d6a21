use crate::cache::CacheStats;
use crate::config::Config;
use crate::errors::AppError;
use crate::merge::{merge, MergeReport};
use crate::models::{Contact, RawContact};
use crate::pipeline::{Pipeline, PipelineOptions, PipelineReport};
use crate::scoring::{RankKey, ScoringInsights};
use crate::sources::SourceInfo;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Merge, enrichment and scoring wired together. The orchestrator inside
    /// owns the cache and the circuit breakers, so both outlive single requests.
    pub pipeline: Pipeline,
}

/// Contact lists keyed by mail provider / account name.
#[derive(Debug, Deserialize)]
pub struct ProvidersRequest {
    pub providers: BTreeMap<String, Vec<RawContact>>,
}

#[derive(Debug, Deserialize)]
pub struct PipelineRunRequest {
    pub providers: BTreeMap<String, Vec<RawContact>>,
    #[serde(default)]
    pub options: PipelineOptions,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub rank_by: RankKey,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub contacts: Vec<Contact>,
    pub insights: ScoringInsights,
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "contact-intel",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

fn ensure_providers(providers: &BTreeMap<String, Vec<RawContact>>) -> Result<(), AppError> {
    if providers.values().all(|list| list.is_empty()) {
        return Err(AppError::BadRequest(
            "At least one provider with contacts is required".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/v1/pipeline/run
///
/// Merges the provider lists, enriches the canonical contacts, then scores
/// and ranks them.
///
/// # Returns
///
/// * `Result<Json<PipelineReport>, AppError>` - Ranked contacts with merge,
///   enrichment and scoring reports.
pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PipelineRunRequest>,
) -> Result<Json<PipelineReport>, AppError> {
    let raw_total: usize = request.providers.values().map(Vec::len).sum();
    tracing::info!(
        "POST /pipeline/run - {} providers, {} raw contacts",
        request.providers.len(),
        raw_total
    );
    ensure_providers(&request.providers)?;

    let report = state.pipeline.run(&request.providers, &request.options).await;

    if let Some(summary) = &report.enrichment {
        tracing::info!(
            "✓ Pipeline run {}: {} enriched, ${:.2} spent",
            summary.run_id,
            summary.enriched,
            summary.total_cost
        );
    }
    Ok(Json(report))
}

/// POST /api/v1/contacts/merge
pub async fn merge_contacts(
    Json(request): Json<ProvidersRequest>,
) -> Result<Json<MergeReport>, AppError> {
    tracing::info!("POST /contacts/merge - {} providers", request.providers.len());
    ensure_providers(&request.providers)?;

    let report = merge(&request.providers);
    if report.diagnostics.dropped() > 0 {
        tracing::warn!(
            "⚠ Dropped {} raw contacts without a usable email",
            report.diagnostics.dropped()
        );
    }
    Ok(Json(report))
}

/// POST /api/v1/contacts/score
///
/// Scores contacts that are already canonical (merged, optionally enriched).
pub async fn score_contacts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    tracing::info!("POST /contacts/score - {} contacts", request.contacts.len());
    if request.contacts.is_empty() {
        return Err(AppError::BadRequest("No contacts to score".to_string()));
    }

    let engine = state.pipeline.engine();
    let ranked = engine.rank(request.contacts, request.rank_by);
    let insights = engine.insights(&ranked);
    let contacts = match request.limit {
        Some(limit) => ranked.into_iter().take(limit).collect(),
        None => ranked,
    };

    Ok(Json(ScoreResponse { contacts, insights }))
}

/// Waterfall order plus the spend limits applied to it.
#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub daily_budget: f64,
    pub max_cost_per_contact: f64,
    pub ai_sentiment_enabled: bool,
    pub sources: Vec<SourceInfo>,
}

/// GET /api/v1/enrichment/sources
pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<SourcesResponse> {
    let sources = state
        .pipeline
        .orchestrator()
        .registry()
        .iter()
        .map(|adapter| adapter.describe())
        .collect();
    let config = &state.config;
    Json(SourcesResponse {
        daily_budget: config.orchestrator.daily_budget,
        max_cost_per_contact: config.orchestrator.max_cost_per_contact,
        ai_sentiment_enabled: config.ai_sentiment_enabled,
        sources,
    })
}

/// GET /api/v1/cache/stats
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.pipeline.orchestrator().cache().stats().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EnrichmentCache;
    use crate::config::OrchestratorSettings;
    use crate::enrichment::EnrichmentOrchestrator;
    use crate::scoring::ScoringEngine;
    use crate::sources::build_registry;

    fn state() -> Arc<AppState> {
        let config = Config::default();
        let registry = build_registry(&config).expect("registry builds without keys");
        let cache = EnrichmentCache::new(config.orchestrator.cache_ttl, 100);
        let orchestrator =
            EnrichmentOrchestrator::new(registry, cache, OrchestratorSettings::default());
        let engine = ScoringEngine::new(config.scoring_weights.clone(), false);
        Arc::new(AppState {
            config,
            pipeline: Pipeline::new(orchestrator, engine),
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, Json(body)) = health().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_empty_providers_rejected() {
        let request = ProvidersRequest {
            providers: BTreeMap::from([("gmail".to_string(), Vec::new())]),
        };
        let result = merge_contacts(Json(request)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_empty_score_request_rejected() {
        let request = ScoreRequest {
            contacts: Vec::new(),
            rank_by: RankKey::Overall,
            limit: None,
        };
        let result = score_contacts(State(state()), Json(request)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_list_sources_reports_registry() {
        let Json(response) = list_sources(State(state())).await;
        assert_eq!(response.sources.len(), 5);
        // No API keys in the default config.
        assert!(response.sources.iter().filter(|s| s.paid).all(|s| !s.enabled));
        assert_eq!(response.daily_budget, 100.0);
        assert_eq!(response.max_cost_per_contact, 1.0);
        assert!(!response.ai_sentiment_enabled);
    }

    #[tokio::test]
    async fn test_cache_stats_start_empty() {
        let Json(stats) = cache_stats(State(state())).await;
        assert_eq!(stats.entries, 0);
    }
}
