//! Contact Intelligence Library
//!
//! Merges contacts seen by several mail providers into one record per email,
//! enriches them through a waterfall of paid and free sources under a spend
//! budget, and ranks them with a weighted multi-factor score.
//!
//! # Modules
//!
//! - `cache`: TTL cache of enrichment payloads with JSON snapshots.
//! - `cache_validator`: Snapshot envelope and integrity checks.
//! - `circuit_breaker`: Per-source circuit breakers.
//! - `config`: Configuration management.
//! - `enrichment`: Enrichment orchestrator (cache, budget, waterfall).
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `merge`: Cross-provider merge and dedup.
//! - `models`: Core data models.
//! - `pipeline`: Merge, enrich, score in one call.
//! - `scoring`: Multi-factor contact scoring and ranking.
//! - `sentiment`: Keyword sentiment fallback.
//! - `sources`: Enrichment source adapters.
//! - `validation`: Email and phone normalization.

pub mod cache;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod scoring;
pub mod sentiment;
pub mod sources;
pub mod validation;
