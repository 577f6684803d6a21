use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Instant;

use super::heuristics::{classify_industry, estimate_net_worth, WealthSignals};
use super::{http_client, retry_after, EnrichmentTarget, RateGate, SourceAdapter};
use crate::config::SourceSettings;
use crate::errors::AppError;
use crate::models::{EnrichmentData, EnrichmentResult, EnrichmentSource, SocialProfile};
use crate::validation::normalize_phone;

/// Seconds to back off when a 429 carries no `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 3600;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearbitPerson {
    #[serde(default)]
    name: Option<ClearbitName>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    time_zone: Option<String>,
    #[serde(default)]
    geo: Option<ClearbitGeo>,
    #[serde(default)]
    employment: Option<ClearbitEmployment>,
    #[serde(default)]
    linkedin: Option<ClearbitHandle>,
    #[serde(default)]
    twitter: Option<ClearbitHandle>,
    #[serde(default)]
    github: Option<ClearbitHandle>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearbitName {
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClearbitGeo {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClearbitEmployment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    seniority: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClearbitHandle {
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    followers: Option<u64>,
}

/// Premium person lookup against the Clearbit Person API.
pub struct ClearbitAdapter {
    settings: SourceSettings,
    client: Client,
    gate: RateGate,
}

impl ClearbitAdapter {
    pub fn new(settings: SourceSettings) -> Result<Self, AppError> {
        let client = http_client(&settings)?;
        let gate = RateGate::from_settings(EnrichmentSource::Clearbit, &settings);
        Ok(Self {
            settings,
            client,
            gate,
        })
    }

    async fn fetch_person(&self, email: &str) -> Result<Option<ClearbitPerson>, AppError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Authentication("Clearbit API key missing".to_string()))?;

        let url = format!("{}/v2/people/find", self.settings.base_url);
        tracing::debug!("Clearbit lookup: {}", email);

        let response = self
            .client
            .get(&url)
            .query(&[("email", email)])
            .basic_auth(api_key, Some(""))
            .send()
            .await
            .map_err(AppError::from)?;

        match response.status() {
            StatusCode::OK => {
                let person = response.json::<ClearbitPerson>().await.map_err(|e| {
                    AppError::Provider(format!("Failed to parse Clearbit response: {}", e))
                })?;
                Ok(Some(person))
            }
            // 202 means the lookup was queued upstream; treat as no data for this run.
            StatusCode::ACCEPTED | StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::Authentication(
                "Clearbit rejected the API key".to_string(),
            )),
            StatusCode::PAYMENT_REQUIRED => Err(AppError::Provider(
                "Clearbit quota exhausted".to_string(),
            )),
            StatusCode::UNPROCESSABLE_ENTITY => Err(AppError::Validation(format!(
                "Clearbit rejected email {}",
                email
            ))),
            StatusCode::TOO_MANY_REQUESTS => Err(AppError::RateLimited {
                source: EnrichmentSource::Clearbit.to_string(),
                retry_after: retry_after(response.headers(), DEFAULT_RETRY_AFTER_SECS),
            }),
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(AppError::Provider(format!(
                    "Clearbit returned status {}: {}",
                    status, error_text
                )))
            }
        }
    }
}

fn process_person(person: ClearbitPerson) -> EnrichmentData {
    let mut data = EnrichmentData {
        name: person.name.and_then(|n| n.full_name),
        timezone: person.time_zone,
        ..Default::default()
    };

    let geo = person.geo.unwrap_or_default();
    let parts: Vec<&str> = [&geo.city, &geo.state, &geo.country]
        .into_iter()
        .flatten()
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    data.location = if parts.is_empty() {
        person.location
    } else {
        Some(parts.join(", "))
    };

    let employment = person.employment.unwrap_or_default();
    data.job_title = employment.title.clone();
    data.company = employment.name.clone();
    data.company_domain = employment.domain.clone();
    data.seniority = employment.seniority.clone();
    if let Some(role) = &employment.role {
        data.extras
            .insert("role".to_string(), serde_json::Value::String(role.clone()));
    }
    data.industry = employment
        .name
        .as_deref()
        .map(|c| classify_industry(c).to_string());
    if employment.title.is_some() || employment.name.is_some() {
        data.estimated_net_worth = Some(
            estimate_net_worth(WealthSignals {
                title: employment.title.as_deref(),
                company: employment.name.as_deref(),
                seniority: employment.seniority.as_deref(),
                city: geo.city.as_deref(),
            })
            .to_string(),
        );
    }

    let handles = [
        ("linkedin", "https://linkedin.com/in/", person.linkedin),
        ("twitter", "https://twitter.com/", person.twitter),
        ("github", "https://github.com/", person.github),
    ];
    for (platform, prefix, handle) in handles {
        let Some(handle) = handle else { continue };
        let Some(username) = handle.handle.filter(|h| !h.is_empty()) else {
            continue;
        };
        let mut profile = SocialProfile::new(platform);
        profile.url = Some(format!("{}{}", prefix, username));
        profile.username = Some(username);
        profile.followers = handle.followers;
        data.social_profiles.push(profile);
    }

    if let Some(phone) = person.phone.as_deref().and_then(normalize_phone) {
        data.phone_numbers.push(phone);
    }

    data
}

#[async_trait]
impl SourceAdapter for ClearbitAdapter {
    fn source(&self) -> EnrichmentSource {
        EnrichmentSource::Clearbit
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn is_enabled(&self) -> bool {
        self.settings.enabled && self.settings.has_credentials()
    }

    fn try_acquire(&self) -> Result<(), AppError> {
        self.gate.try_acquire()
    }

    async fn pace(&self) {
        self.gate.pace().await;
    }

    async fn enrich(&self, target: &EnrichmentTarget) -> Result<EnrichmentResult, AppError> {
        let start = Instant::now();
        let cost = self.settings.cost_per_request;
        let mut result = match self.fetch_person(&target.email).await? {
            Some(person) => {
                let data = process_person(person);
                if data.is_empty() {
                    EnrichmentResult::not_found(self.source(), cost, 1, "Empty Clearbit profile")
                } else {
                    tracing::info!("Enriched {} via Clearbit", target.email);
                    EnrichmentResult::found(self.source(), data, self.settings.confidence_score, cost)
                }
            }
            None => EnrichmentResult::not_found(self.source(), cost, 1, "No data found for email"),
        };
        result.api_calls_used = 1;
        result.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}
