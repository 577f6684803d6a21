use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::scoring::ScoringWeights;

/// Settings shared by every enrichment source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSettings {
    /// Config flag. Keyed sources additionally need `api_key` to be usable.
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub cost_per_request: f64,
    pub rate_limit_per_hour: u32,
    pub confidence_score: f64,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Minimum spacing between two calls to the same upstream.
    #[serde(with = "duration_millis")]
    pub min_interval: Duration,
}

impl SourceSettings {
    pub fn clearbit() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: "https://person.clearbit.com".to_string(),
            cost_per_request: 0.10,
            rate_limit_per_hour: 600,
            confidence_score: 0.9,
            timeout: Duration::from_secs(15),
            min_interval: Duration::from_secs(1),
        }
    }

    pub fn peopledatalabs() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: "https://api.peopledatalabs.com".to_string(),
            cost_per_request: 0.05,
            rate_limit_per_hour: 1000,
            confidence_score: 0.85,
            timeout: Duration::from_secs(15),
            min_interval: Duration::from_secs(1),
        }
    }

    pub fn hunter() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: "https://api.hunter.io".to_string(),
            cost_per_request: 0.05,
            rate_limit_per_hour: 500,
            confidence_score: 0.7,
            timeout: Duration::from_secs(15),
            min_interval: Duration::from_secs(1),
        }
    }

    pub fn domain_inference() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: String::new(),
            cost_per_request: 0.0,
            rate_limit_per_hour: 100_000,
            confidence_score: 0.3,
            timeout: Duration::from_secs(1),
            min_interval: Duration::ZERO,
        }
    }

    pub fn mock() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: String::new(),
            cost_per_request: 0.0,
            rate_limit_per_hour: 100_000,
            confidence_score: 0.5,
            timeout: Duration::from_secs(1),
            min_interval: Duration::ZERO,
        }
    }

    /// True when the flag is on and, for keyed sources, a non-empty key is present.
    pub fn has_credentials(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Knobs for the enrichment waterfall.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorSettings {
    pub max_concurrent_enrichments: usize,
    pub daily_budget: f64,
    pub max_cost_per_contact: f64,
    #[serde(with = "duration_secs")]
    pub cache_ttl: Duration,
    pub cache_max_entries: u64,
    #[serde(with = "duration_millis")]
    pub batch_delay: Duration,
    pub cache_snapshot_path: Option<PathBuf>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_enrichments: 5,
            daily_budget: 100.0,
            max_cost_per_contact: 1.0,
            cache_ttl: Duration::from_secs(24 * 3600),
            cache_max_entries: 50_000,
            batch_delay: Duration::from_millis(100),
            cache_snapshot_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub clearbit: SourceSettings,
    pub peopledatalabs: SourceSettings,
    pub hunter: SourceSettings,
    pub domain_inference: SourceSettings,
    pub mock: SourceSettings,
    pub orchestrator: OrchestratorSettings,
    pub scoring_weights: ScoringWeights,
    /// Whether interaction sentiment annotations come from an AI analyzer upstream.
    pub ai_sentiment_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            clearbit: SourceSettings::clearbit(),
            peopledatalabs: SourceSettings::peopledatalabs(),
            hunter: SourceSettings::hunter(),
            domain_inference: SourceSettings::domain_inference(),
            mock: SourceSettings::mock(),
            orchestrator: OrchestratorSettings::default(),
            scoring_weights: ScoringWeights::default(),
            ai_sentiment_enabled: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            port: parse_or(&get, "PORT", defaults.port)
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            clearbit: load_source(&get, "CLEARBIT", defaults.clearbit)?,
            peopledatalabs: load_source(&get, "PDL", defaults.peopledatalabs)?,
            hunter: load_source(&get, "HUNTER", defaults.hunter)?,
            domain_inference: load_source(&get, "DOMAIN_INFERENCE", defaults.domain_inference)?,
            mock: load_source(&get, "MOCK_ENRICHMENT", defaults.mock)?,
            orchestrator: load_orchestrator(&get, defaults.orchestrator)?,
            scoring_weights: load_weights(&get, defaults.scoring_weights)?,
            ai_sentiment_enabled: parse_bool(&get, "AI_SENTIMENT_ENABLED", false)?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        for (name, source) in [
            ("clearbit", &config.clearbit),
            ("peopledatalabs", &config.peopledatalabs),
            ("hunter", &config.hunter),
        ] {
            tracing::debug!(
                "{}: enabled={} credentials={} base_url={}",
                name,
                source.enabled,
                source.has_credentials(),
                source.base_url
            );
        }
        tracing::debug!(
            "Orchestrator: concurrency={} budget={:.2} per_contact_cap={:.2} cache_ttl={}h",
            config.orchestrator.max_concurrent_enrichments,
            config.orchestrator.daily_budget,
            config.orchestrator.max_cost_per_contact,
            config.orchestrator.cache_ttl.as_secs() / 3600
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> anyhow::Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{} must be a boolean, got {}", key, v),
        },
    }
}

fn non_negative<G>(get: &G, key: &str, default: f64) -> anyhow::Result<f64>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default).and_then(|v: f64| {
        if !v.is_finite() || v < 0.0 {
            anyhow::bail!("{} must be a non-negative number", key);
        }
        Ok(v)
    })
}

fn load_source<G>(get: &G, prefix: &str, defaults: SourceSettings) -> anyhow::Result<SourceSettings>
where
    G: Fn(&str) -> Option<String>,
{
    let key = |suffix: &str| format!("{}_{}", prefix, suffix);

    let base_url = match get(&key("BASE_URL")) {
        Some(raw) => {
            let parsed = url::Url::parse(raw.trim())
                .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", key("BASE_URL"), e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("{} must start with http:// or https://", key("BASE_URL"));
            }
            raw.trim().trim_end_matches('/').to_string()
        }
        None => defaults.base_url,
    };

    Ok(SourceSettings {
        enabled: parse_bool(get, &key("ENABLED"), defaults.enabled)?,
        api_key: get(&key("API_KEY")).or(defaults.api_key),
        base_url,
        cost_per_request: non_negative(get, &key("COST_PER_REQUEST"), defaults.cost_per_request)?,
        rate_limit_per_hour: parse_or(get, &key("RATE_LIMIT_PER_HOUR"), defaults.rate_limit_per_hour)
            .and_then(|v: u32| {
                if v == 0 {
                    anyhow::bail!("{} must be at least 1", key("RATE_LIMIT_PER_HOUR"));
                }
                Ok(v)
            })?,
        confidence_score: parse_or(get, &key("CONFIDENCE"), defaults.confidence_score).and_then(
            |v: f64| {
                if !(0.0..=1.0).contains(&v) {
                    anyhow::bail!("{} must be between 0 and 1", key("CONFIDENCE"));
                }
                Ok(v)
            },
        )?,
        timeout: parse_or(get, &key("TIMEOUT_SECS"), defaults.timeout.as_secs()).and_then(
            |v: u64| {
                if v == 0 {
                    anyhow::bail!("{} must be greater than zero", key("TIMEOUT_SECS"));
                }
                Ok(Duration::from_secs(v))
            },
        )?,
        min_interval: Duration::from_millis(parse_or(
            get,
            &key("MIN_INTERVAL_MS"),
            defaults.min_interval.as_millis() as u64,
        )?),
    })
}

fn load_orchestrator<G>(get: &G, defaults: OrchestratorSettings) -> anyhow::Result<OrchestratorSettings>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(OrchestratorSettings {
        max_concurrent_enrichments: parse_or(
            get,
            "MAX_CONCURRENT_ENRICHMENTS",
            defaults.max_concurrent_enrichments,
        )
        .and_then(|v: usize| {
            if v == 0 {
                anyhow::bail!("MAX_CONCURRENT_ENRICHMENTS must be at least 1");
            }
            Ok(v)
        })?,
        daily_budget: non_negative(get, "DAILY_BUDGET", defaults.daily_budget)?,
        max_cost_per_contact: non_negative(get, "MAX_COST_PER_CONTACT", defaults.max_cost_per_contact)?,
        cache_ttl: parse_or(get, "CACHE_TTL_HOURS", defaults.cache_ttl.as_secs() / 3600).and_then(
            |v: u64| {
                if v == 0 {
                    anyhow::bail!("CACHE_TTL_HOURS must be greater than zero");
                }
                Ok(Duration::from_secs(v * 3600))
            },
        )?,
        cache_max_entries: parse_or(get, "CACHE_MAX_ENTRIES", defaults.cache_max_entries)?,
        batch_delay: Duration::from_millis(parse_or(
            get,
            "ENRICHMENT_BATCH_DELAY_MS",
            defaults.batch_delay.as_millis() as u64,
        )?),
        cache_snapshot_path: get("CACHE_SNAPSHOT_PATH")
            .map(PathBuf::from)
            .or(defaults.cache_snapshot_path),
    })
}

fn load_weights<G>(get: &G, defaults: ScoringWeights) -> anyhow::Result<ScoringWeights>
where
    G: Fn(&str) -> Option<String>,
{
    let w = |name: &str, default: f64| non_negative(get, &format!("SCORING_WEIGHT_{}", name), default);

    let weights = ScoringWeights {
        interaction_frequency: w("FREQUENCY", defaults.interaction_frequency)?,
        response_rate: w("RESPONSE_RATE", defaults.response_rate)?,
        recency: w("RECENCY", defaults.recency)?,
        sentiment: w("SENTIMENT", defaults.sentiment)?,
        company_importance: w("COMPANY_IMPORTANCE", defaults.company_importance)?,
        title_seniority: w("TITLE_SENIORITY", defaults.title_seniority)?,
        social_influence: w("SOCIAL_INFLUENCE", defaults.social_influence)?,
        network_quality: w("NETWORK_QUALITY", defaults.network_quality)?,
        content_engagement: w("CONTENT_ENGAGEMENT", defaults.content_engagement)?,
        meeting_engagement: w("MEETING_ENGAGEMENT", defaults.meeting_engagement)?,
    };

    let total = weights.total();
    if (total - 1.0).abs() > 0.01 {
        tracing::warn!("Scoring weights sum to {:.3}, expected 1.0", total);
    }

    Ok(weights)
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::from_lookup(|_| None).unwrap();

        assert_eq!(config.port, 3000);
        assert!(!config.clearbit.has_credentials());
        assert!(config.domain_inference.enabled);
        assert!(!config.mock.enabled);
        assert_eq!(config.orchestrator.max_concurrent_enrichments, 5);
        assert_eq!(config.orchestrator.daily_budget, 100.0);
        assert_eq!(config.orchestrator.cache_ttl, Duration::from_secs(86_400));
        assert!((config.scoring_weights.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_source_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CLEARBIT_API_KEY", "sk_test"),
            ("CLEARBIT_BASE_URL", "http://127.0.0.1:9999/"),
            ("CLEARBIT_COST_PER_REQUEST", "0.25"),
            ("PDL_ENABLED", "false"),
            ("HUNTER_API_KEY", "hk_test"),
            ("HUNTER_RATE_LIMIT_PER_HOUR", "50"),
            ("MAX_CONCURRENT_ENRICHMENTS", "8"),
            ("CACHE_TTL_HOURS", "2"),
        ]))
        .unwrap();

        assert!(config.clearbit.has_credentials());
        assert_eq!(config.clearbit.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.clearbit.cost_per_request, 0.25);
        assert!(!config.peopledatalabs.enabled);
        assert!(config.hunter.has_credentials());
        assert_eq!(config.hunter.rate_limit_per_hour, 50);
        assert_eq!(config.hunter.base_url, "https://api.hunter.io");
        assert_eq!(config.orchestrator.max_concurrent_enrichments, 8);
        assert_eq!(config.orchestrator.cache_ttl, Duration::from_secs(7200));
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        assert!(Config::from_lookup(lookup(&[("PORT", "not-a-port")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DAILY_BUDGET", "-1")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CLEARBIT_CONFIDENCE", "1.5")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PDL_BASE_URL", "ftp://x")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MAX_CONCURRENT_ENRICHMENTS", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MOCK_ENRICHMENT_ENABLED", "maybe")])).is_err());
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[("CLEARBIT_API_KEY", "  "), ("PORT", "")])).unwrap();
        assert!(!config.clearbit.has_credentials());
        assert_eq!(config.port, 3000);
    }
}
