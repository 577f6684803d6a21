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

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct PdlEnvelope {
    #[serde(default)]
    likelihood: Option<u8>,
    #[serde(default)]
    data: Option<PdlPerson>,
}

#[derive(Debug, Default, Deserialize)]
struct PdlPerson {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    job_title: Option<String>,
    #[serde(default)]
    job_title_levels: Vec<String>,
    #[serde(default)]
    job_company_name: Option<String>,
    #[serde(default)]
    job_company_website: Option<String>,
    #[serde(default)]
    job_company_size: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    location_name: Option<String>,
    #[serde(default)]
    location_locality: Option<String>,
    #[serde(default)]
    linkedin_url: Option<String>,
    #[serde(default)]
    linkedin_username: Option<String>,
    #[serde(default)]
    linkedin_connections: Option<u64>,
    #[serde(default)]
    twitter_url: Option<String>,
    #[serde(default)]
    github_url: Option<String>,
    #[serde(default)]
    facebook_url: Option<String>,
    #[serde(default)]
    phone_numbers: Vec<String>,
    #[serde(default)]
    mobile_phone: Option<String>,
}

/// People Data Labs person enrichment.
pub struct PeopleDataLabsAdapter {
    settings: SourceSettings,
    client: Client,
    gate: RateGate,
}

impl PeopleDataLabsAdapter {
    pub fn new(settings: SourceSettings) -> Result<Self, AppError> {
        let client = http_client(&settings)?;
        let gate = RateGate::from_settings(EnrichmentSource::PeopleDataLabs, &settings);
        Ok(Self {
            settings,
            client,
            gate,
        })
    }

    async fn fetch_person(&self, email: &str) -> Result<Option<PdlEnvelope>, AppError> {
        let api_key = self.settings.api_key.as_deref().ok_or_else(|| {
            AppError::Authentication("People Data Labs API key missing".to_string())
        })?;

        let url = format!("{}/v5/person/enrich", self.settings.base_url);
        tracing::debug!("People Data Labs lookup: {}", email);

        let response = self
            .client
            .get(&url)
            .query(&[("email", email)])
            .header("X-Api-Key", api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let envelope = response.json::<PdlEnvelope>().await.map_err(|e| {
                    AppError::Provider(format!("Failed to parse People Data Labs response: {}", e))
                })?;
                Ok(Some(envelope))
            }
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::Authentication(
                "People Data Labs rejected the API key".to_string(),
            )),
            StatusCode::PAYMENT_REQUIRED => Err(AppError::Provider(
                "People Data Labs credits exhausted".to_string(),
            )),
            StatusCode::BAD_REQUEST => Err(AppError::Validation(format!(
                "People Data Labs rejected email {}",
                email
            ))),
            StatusCode::TOO_MANY_REQUESTS => Err(AppError::RateLimited {
                source: EnrichmentSource::PeopleDataLabs.to_string(),
                retry_after: retry_after(response.headers(), DEFAULT_RETRY_AFTER_SECS),
            }),
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(AppError::Provider(format!(
                    "People Data Labs returned status {}: {}",
                    status, error_text
                )))
            }
        }
    }
}

/// PDL title levels ordered from most to least senior.
fn seniority_from_levels(levels: &[String]) -> Option<String> {
    const ORDER: [&str; 9] = [
        "cxo", "owner", "partner", "vp", "director", "manager", "senior", "entry", "training",
    ];
    ORDER
        .iter()
        .find(|rank| levels.iter().any(|l| l.eq_ignore_ascii_case(rank)))
        .map(|rank| match *rank {
            "cxo" | "owner" | "partner" => "executive".to_string(),
            other => other.to_string(),
        })
}

fn domain_from_website(website: &str) -> String {
    let host = website
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.");
    host.split('/').next().unwrap_or(host).to_lowercase()
}

fn process_person(person: PdlPerson, likelihood: Option<u8>) -> EnrichmentData {
    let seniority = seniority_from_levels(&person.job_title_levels);
    let industry = person.industry.clone().or_else(|| {
        person
            .job_company_name
            .as_deref()
            .map(|c| classify_industry(c).to_string())
    });

    let mut data = EnrichmentData {
        name: person.full_name,
        location: person.location_name,
        job_title: person.job_title.clone(),
        company: person.job_company_name.clone(),
        company_domain: person.job_company_website.as_deref().map(domain_from_website),
        industry,
        seniority: seniority.clone(),
        ..Default::default()
    };

    if data.job_title.is_some() || data.company.is_some() {
        data.estimated_net_worth = Some(
            estimate_net_worth(WealthSignals {
                title: person.job_title.as_deref(),
                company: person.job_company_name.as_deref(),
                seniority: seniority.as_deref(),
                city: person.location_locality.as_deref(),
            })
            .to_string(),
        );
    }

    if let Some(url) = person.linkedin_url {
        let mut profile = SocialProfile::new("linkedin");
        profile.url = Some(normalize_url(&url));
        profile.username = person.linkedin_username;
        profile.connections = person.linkedin_connections;
        data.social_profiles.push(profile);
    }
    for (platform, url) in [
        ("twitter", person.twitter_url),
        ("github", person.github_url),
        ("facebook", person.facebook_url),
    ] {
        if let Some(url) = url {
            let mut profile = SocialProfile::new(platform);
            profile.url = Some(normalize_url(&url));
            data.social_profiles.push(profile);
        }
    }

    let mut phones: Vec<String> = person
        .mobile_phone
        .into_iter()
        .chain(person.phone_numbers)
        .filter_map(|p| normalize_phone(&p))
        .collect();
    phones.dedup();
    data.phone_numbers = phones;

    if let Some(size) = person.job_company_size {
        data.extras
            .insert("company_size".to_string(), serde_json::Value::String(size));
    }
    if let Some(likelihood) = likelihood {
        data.extras
            .insert("pdl_likelihood".to_string(), serde_json::json!(likelihood));
    }

    data
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[async_trait]
impl SourceAdapter for PeopleDataLabsAdapter {
    fn source(&self) -> EnrichmentSource {
        EnrichmentSource::PeopleDataLabs
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
            Some(PdlEnvelope {
                likelihood,
                data: Some(person),
            }) => {
                let data = process_person(person, likelihood);
                tracing::info!("Enriched {} via People Data Labs", target.email);
                EnrichmentResult::found(self.source(), data, self.settings.confidence_score, cost)
            }
            _ => EnrichmentResult::not_found(self.source(), cost, 1, "No match in People Data Labs"),
        };
        result.api_calls_used = 1;
        result.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}
