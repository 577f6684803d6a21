use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;

use super::heuristics::{classify_industry, company_from_domain};
use super::{EnrichmentTarget, RateGate, SourceAdapter};
use crate::config::SourceSettings;
use crate::errors::AppError;
use crate::models::{EnrichmentData, EnrichmentResult, EnrichmentSource};
use crate::validation::is_free_mail_domain;

const DOMAIN_LOCATIONS: &[(&str, &str)] = &[
    ("apple.com", "Cupertino, CA"),
    ("google.com", "Mountain View, CA"),
    ("microsoft.com", "Redmond, WA"),
    ("amazon.com", "Seattle, WA"),
    ("facebook.com", "Menlo Park, CA"),
    ("meta.com", "Menlo Park, CA"),
    ("netflix.com", "Los Gatos, CA"),
    ("salesforce.com", "San Francisco, CA"),
    ("uber.com", "San Francisco, CA"),
    ("airbnb.com", "San Francisco, CA"),
    ("tesla.com", "Austin, TX"),
];

const TLD_COUNTRIES: &[(&str, &str)] = &[
    (".uk", "United Kingdom"),
    (".ca", "Canada"),
    (".au", "Australia"),
    (".de", "Germany"),
    (".fr", "France"),
    (".br", "Brazil"),
];

const BIG_TECH_DOMAINS: &[&str] = &[
    "apple.com",
    "google.com",
    "microsoft.com",
    "amazon.com",
    "facebook.com",
    "meta.com",
];

/// Free, local enrichment from the email domain alone.
pub struct DomainInferenceAdapter {
    settings: SourceSettings,
    gate: RateGate,
}

impl DomainInferenceAdapter {
    pub fn new(settings: SourceSettings) -> Self {
        let gate = RateGate::from_settings(EnrichmentSource::DomainInference, &settings);
        Self { settings, gate }
    }
}

fn domain_net_worth(domain: &str) -> &'static str {
    if BIG_TECH_DOMAINS.contains(&domain) {
        "$250K - $500K"
    } else if domain.ends_with(".edu") {
        "$50K - $100K"
    } else if domain.ends_with(".gov") {
        "$75K - $150K"
    } else {
        "$100K - $250K"
    }
}

/// Everything derivable from a domain. Free-mail domains only yield the
/// email type.
pub fn infer_from_domain(domain: &str) -> EnrichmentData {
    let domain = domain.trim().trim_start_matches("www.").to_lowercase();
    let mut data = EnrichmentData::default();
    if domain.is_empty() {
        return data;
    }

    if is_free_mail_domain(&domain) {
        data.extras
            .insert("email_type".to_string(), Value::String("personal".into()));
        return data;
    }

    data.extras
        .insert("email_type".to_string(), Value::String("business".into()));
    data.company_domain = Some(domain.clone());
    data.company = company_from_domain(&domain);
    data.industry = data
        .company
        .as_deref()
        .map(|c| classify_industry(c).to_string());
    data.estimated_net_worth = Some(domain_net_worth(&domain).to_string());

    data.location = DOMAIN_LOCATIONS
        .iter()
        .find(|(d, _)| *d == domain)
        .map(|(_, loc)| loc.to_string())
        .or_else(|| {
            TLD_COUNTRIES
                .iter()
                .find(|(tld, _)| domain.ends_with(tld))
                .map(|(_, country)| country.to_string())
        });

    data
}

#[async_trait]
impl SourceAdapter for DomainInferenceAdapter {
    fn source(&self) -> EnrichmentSource {
        EnrichmentSource::DomainInference
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn try_acquire(&self) -> Result<(), AppError> {
        self.gate.try_acquire()
    }

    async fn enrich(&self, target: &EnrichmentTarget) -> Result<EnrichmentResult, AppError> {
        let start = Instant::now();
        let data = infer_from_domain(&target.domain);

        let mut result = if data.is_empty() {
            EnrichmentResult::not_found(self.source(), 0.0, 0, "Email has no usable domain")
        } else {
            EnrichmentResult::found(
                self.source(),
                data,
                self.settings.confidence_score,
                self.settings.cost_per_request,
            )
        };
        result.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}
