//! Enrichment source adapters.
//!
//! Every upstream (paid API or local heuristic) implements [`SourceAdapter`].
//! The registry returned by [`build_registry`] is ordered by priority:
//! premium, paid general, email intelligence, free domain inference, mock.

use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{Config, SourceSettings};
use crate::errors::AppError;
use crate::models::{Contact, EnrichmentResult, EnrichmentSource};

pub mod clearbit;
pub mod domain_inference;
pub mod heuristics;
pub mod hunter;
pub mod mock;
pub mod peopledatalabs;

pub use clearbit::ClearbitAdapter;
pub use domain_inference::DomainInferenceAdapter;
pub use hunter::HunterAdapter;
pub use mock::MockAdapter;
pub use peopledatalabs::PeopleDataLabsAdapter;

/// Identity handed to an adapter.
#[derive(Debug, Clone)]
pub struct EnrichmentTarget {
    pub email: String,
    pub name: Option<String>,
    pub domain: String,
}

impl EnrichmentTarget {
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        let email = email.into();
        let domain = email
            .rsplit_once('@')
            .map(|(_, d)| d.to_string())
            .unwrap_or_default();
        Self {
            email,
            name: name.filter(|n| !n.trim().is_empty()),
            domain,
        }
    }

    pub fn from_contact(contact: &Contact) -> Self {
        Self::new(contact.email.clone(), Some(contact.name.clone()))
    }

    /// The part of the email before `@`.
    pub fn local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

/// Uniform contract for enrichment providers.
///
/// `enrich` returns `Ok` with `success == false` for "no data". Throttling
/// surfaces as [`AppError::RateLimited`], bad credentials as
/// [`AppError::Authentication`].
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> EnrichmentSource;

    fn settings(&self) -> &SourceSettings;

    /// Config flag plus credentials for keyed sources.
    fn is_enabled(&self) -> bool {
        self.settings().enabled
    }

    fn cost_per_request(&self) -> f64 {
        self.settings().cost_per_request
    }

    fn is_paid(&self) -> bool {
        self.cost_per_request() > 0.0
    }

    fn confidence(&self) -> f64 {
        self.settings().confidence_score
    }

    fn timeout(&self) -> Duration {
        self.settings().timeout
    }

    /// Takes one slot from the hourly quota without waiting.
    fn try_acquire(&self) -> Result<(), AppError>;

    /// Waits out the minimum spacing between upstream calls. Called before
    /// the request timeout starts.
    async fn pace(&self) {}

    async fn enrich(&self, target: &EnrichmentTarget) -> Result<EnrichmentResult, AppError>;

    fn describe(&self) -> SourceInfo {
        let settings = self.settings();
        SourceInfo {
            source: self.source(),
            enabled: self.is_enabled(),
            paid: self.is_paid(),
            cost_per_request: settings.cost_per_request,
            confidence_score: settings.confidence_score,
            rate_limit_per_hour: settings.rate_limit_per_hour,
            timeout_secs: settings.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub source: EnrichmentSource,
    pub enabled: bool,
    pub paid: bool,
    pub cost_per_request: f64,
    pub confidence_score: f64,
    pub rate_limit_per_hour: u32,
    pub timeout_secs: u64,
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Hourly quota plus a minimum spacing between calls.
pub struct RateGate {
    source: EnrichmentSource,
    limiter: DirectLimiter,
    clock: DefaultClock,
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateGate {
    pub fn new(source: EnrichmentSource, per_hour: u32, min_interval: Duration) -> Self {
        let burst = NonZeroU32::new(per_hour).unwrap_or(NonZeroU32::MIN);
        Self {
            source,
            limiter: RateLimiter::direct(Quota::per_hour(burst)),
            clock: DefaultClock::default(),
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    pub fn from_settings(source: EnrichmentSource, settings: &SourceSettings) -> Self {
        Self::new(source, settings.rate_limit_per_hour, settings.min_interval)
    }

    pub fn try_acquire(&self) -> Result<(), AppError> {
        self.limiter.check().map_err(|not_until| {
            let retry_after = not_until.wait_time_from(self.clock.now());
            tracing::debug!(
                "{} hourly quota exhausted, next slot in {:?}",
                self.source,
                retry_after
            );
            AppError::RateLimited {
                source: self.source.to_string(),
                retry_after,
            }
        })
    }

    /// Waits until `min_interval` has passed since the previous call.
    pub async fn pace(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("{} pacing: waiting {:?}", self.source, wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Shared HTTP client for one adapter. Dropped with the adapter.
pub(crate) fn http_client(settings: &SourceSettings) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(settings.timeout)
        .user_agent(concat!("contact-intel/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn retry_after(headers: &reqwest::header::HeaderMap, default_secs: u64) -> Duration {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

/// All adapters in waterfall priority order, enabled or not.
pub fn build_registry(config: &Config) -> Result<Vec<Arc<dyn SourceAdapter>>, AppError> {
    let registry: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(ClearbitAdapter::new(config.clearbit.clone())?),
        Arc::new(PeopleDataLabsAdapter::new(config.peopledatalabs.clone())?),
        Arc::new(HunterAdapter::new(config.hunter.clone())?),
        Arc::new(DomainInferenceAdapter::new(config.domain_inference.clone())),
        Arc::new(MockAdapter::new(config.mock.clone())),
    ];

    for adapter in &registry {
        tracing::info!(
            "Enrichment source {}: enabled={} cost={:.3} confidence={:.2}",
            adapter.source(),
            adapter.is_enabled(),
            adapter.cost_per_request(),
            adapter.confidence()
        );
    }

    Ok(registry)
}
