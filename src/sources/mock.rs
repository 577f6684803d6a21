use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::heuristics::has_any_term;
use super::{EnrichmentTarget, RateGate, SourceAdapter};
use crate::config::SourceSettings;
use crate::errors::AppError;
use crate::models::{EnrichmentData, EnrichmentResult, EnrichmentSource};

const MOCK_LOCATIONS: &[&str] = &[
    "San Francisco, CA",
    "New York, NY",
    "London, UK",
    "Toronto, Canada",
    "Austin, TX",
    "Seattle, WA",
    "Boston, MA",
    "Chicago, IL",
    "Los Angeles, CA",
    "Berlin, Germany",
    "Amsterdam, Netherlands",
    "Sydney, Australia",
    "Tokyo, Japan",
    "Singapore",
    "Hong Kong",
    "Tel Aviv, Israel",
    "Stockholm, Sweden",
    "Zurich, Switzerland",
];

const EXECUTIVE_MARKERS: &[&str] = &["ceo", "cto", "cfo", "founder", "president", "vp"];
const SENIOR_MARKERS: &[&str] = &["director", "head", "lead", "senior", "principal"];
const BIG_TECH_DOMAINS: &[&str] = &["apple.com", "google.com", "microsoft.com", "amazon.com", "meta.com"];

/// Deterministic demo data. The same email always yields the same payload.
pub struct MockAdapter {
    settings: SourceSettings,
    gate: RateGate,
}

impl MockAdapter {
    pub fn new(settings: SourceSettings) -> Self {
        let gate = RateGate::from_settings(EnrichmentSource::MockData, &settings);
        Self { settings, gate }
    }
}

fn seed(email: &str) -> u64 {
    let digest = Sha256::digest(email.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Band picked from the score, with the hash choosing within the band.
fn mock_net_worth(target: &EnrichmentTarget, seed: u64) -> &'static str {
    let local = target.local_part().to_lowercase();
    let name = target.name.as_deref().unwrap_or_default().to_lowercase();
    let domain = target.domain.as_str();

    let mut score: i32 = 0;
    if BIG_TECH_DOMAINS.contains(&domain) {
        score += 3;
    } else if domain.ends_with(".edu") {
        score -= 1;
    } else if domain.split('.').count() == 2
        && !(domain.ends_with(".com") || domain.ends_with(".org") || domain.ends_with(".net"))
    {
        score += 1;
    }

    for text in [&local, &name] {
        if has_any_term(text, EXECUTIVE_MARKERS) {
            score += 3;
        } else if has_any_term(text, SENIOR_MARKERS) {
            score += 2;
        }
    }

    let choices: &[&str] = if score >= 5 {
        &["$1M - $2.5M", "$2.5M - $5M", "$5M - $10M"]
    } else if score >= 3 {
        &["$500K - $1M", "$1M - $2.5M"]
    } else if score >= 1 {
        &["$250K - $500K", "$500K - $1M"]
    } else if score >= 0 {
        &["$100K - $250K", "$250K - $500K"]
    } else {
        &["$50K - $100K", "$100K - $250K"]
    };
    choices[(seed % choices.len() as u64) as usize]
}

pub fn mock_payload(target: &EnrichmentTarget) -> EnrichmentData {
    let seed = seed(&target.email);
    let location = MOCK_LOCATIONS[(seed % MOCK_LOCATIONS.len() as u64) as usize];
    EnrichmentData {
        location: Some(location.to_string()),
        estimated_net_worth: Some(mock_net_worth(target, seed >> 16).to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn source(&self) -> EnrichmentSource {
        EnrichmentSource::MockData
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn try_acquire(&self) -> Result<(), AppError> {
        self.gate.try_acquire()
    }

    async fn enrich(&self, target: &EnrichmentTarget) -> Result<EnrichmentResult, AppError> {
        Ok(EnrichmentResult::found(
            self.source(),
            mock_payload(target),
            self.settings.confidence_score,
            self.settings.cost_per_request,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_deterministic() {
        let target = EnrichmentTarget::new("carol@example.com", Some("Carol".into()));
        assert_eq!(mock_payload(&target), mock_payload(&target));
    }

    #[test]
    fn test_executive_markers_raise_band() {
        let target = EnrichmentTarget::new("ceo@google.com", Some("Jane Founder".into()));
        let band = mock_net_worth(&target, 0);
        assert!(["$1M - $2.5M", "$2.5M - $5M", "$5M - $10M"].contains(&band));

        let student = EnrichmentTarget::new("kim@state.edu", None);
        let band = mock_net_worth(&student, 1);
        assert!(["$50K - $100K", "$100K - $250K"].contains(&band));
    }

    #[tokio::test]
    async fn test_enrich_uses_configured_confidence() {
        let adapter = MockAdapter::new(SourceSettings::mock());
        assert!(!adapter.is_enabled());

        let result = adapter
            .enrich(&EnrichmentTarget::new("dave@example.com", None))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.cost, 0.0);
    }
}
