use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Instant;

use super::heuristics::{classify_industry, estimate_net_worth, WealthSignals};
use super::{http_client, retry_after, EnrichmentTarget, RateGate, SourceAdapter};
use crate::config::SourceSettings;
use crate::errors::AppError;
use crate::models::{EnrichmentData, EnrichmentResult, EnrichmentSource, SocialProfile};
use crate::validation::{is_free_mail_domain, normalize_phone};

const DEFAULT_RETRY_AFTER_SECS: u64 = 3600;

/// Domain search results beyond this are not needed to find the target.
const DOMAIN_SEARCH_LIMIT: &str = "10";

#[derive(Debug, Deserialize)]
struct HunterEnvelope<T> {
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Verification {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    score: Option<u8>,
    #[serde(default)]
    webmail: Option<bool>,
    #[serde(default)]
    disposable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct DomainSearch {
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    accept_all: Option<bool>,
    #[serde(default)]
    emails: Vec<DomainEmail>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct DomainEmail {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    seniority: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    linkedin: Option<String>,
    #[serde(default)]
    twitter: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailFinder {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    seniority: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default, alias = "linkedin")]
    linkedin_url: Option<String>,
    #[serde(default)]
    twitter: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    score: Option<u8>,
}

/// Person facts from either the finder or a matching domain-search row.
#[derive(Debug, Default)]
struct Person {
    position: Option<String>,
    seniority: Option<String>,
    department: Option<String>,
    linkedin: Option<String>,
    twitter: Option<String>,
    phone_number: Option<String>,
    score: Option<u8>,
}

impl From<EmailFinder> for Person {
    fn from(f: EmailFinder) -> Self {
        Self {
            position: f.position,
            seniority: f.seniority,
            department: f.department,
            linkedin: f.linkedin_url,
            twitter: f.twitter,
            phone_number: f.phone_number,
            score: f.score,
        }
    }
}

impl From<DomainEmail> for Person {
    fn from(e: DomainEmail) -> Self {
        Self {
            position: e.position,
            seniority: e.seniority,
            department: e.department,
            linkedin: e.linkedin,
            twitter: e.twitter,
            phone_number: e.phone_number,
            score: None,
        }
    }
}

/// Hunter.io email verification, domain search and email finder.
pub struct HunterAdapter {
    settings: SourceSettings,
    client: Client,
    gate: RateGate,
}

impl HunterAdapter {
    pub fn new(settings: SourceSettings) -> Result<Self, AppError> {
        let client = http_client(&settings)?;
        let gate = RateGate::from_settings(EnrichmentSource::Hunter, &settings);
        Ok(Self {
            settings,
            client,
            gate,
        })
    }

    /// One `GET /v2/{endpoint}`. `None` when Hunter has nothing for the query.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<T>, AppError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Authentication("Hunter API key missing".to_string()))?;

        let url = format!("{}/v2/{}", self.settings.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("api_key", api_key)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let envelope = response.json::<HunterEnvelope<T>>().await.map_err(|e| {
                    AppError::Provider(format!("Failed to parse Hunter {} response: {}", endpoint, e))
                })?;
                Ok(envelope.data)
            }
            // Unknown person or malformed address: nothing to add.
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Ok(None)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::Authentication(
                "Hunter rejected the API key".to_string(),
            )),
            StatusCode::PAYMENT_REQUIRED => Err(AppError::Provider(
                "Hunter credits exhausted".to_string(),
            )),
            StatusCode::TOO_MANY_REQUESTS => Err(AppError::RateLimited {
                source: EnrichmentSource::Hunter.to_string(),
                retry_after: retry_after(response.headers(), DEFAULT_RETRY_AFTER_SECS),
            }),
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(AppError::Provider(format!(
                    "Hunter {} returned status {}: {}",
                    endpoint, status, error_text
                )))
            }
        }
    }
}

fn split_name(name: &str) -> Option<(&str, &str)> {
    let name = name.trim();
    let (first, last) = name.split_once(char::is_whitespace).unwrap_or((name, ""));
    (!first.is_empty()).then_some((first, last.trim()))
}

fn twitter_profile(handle: &str) -> SocialProfile {
    let username = handle
        .trim_start_matches("https://twitter.com/")
        .trim_start_matches("https://x.com/")
        .trim_start_matches('@')
        .to_string();
    let mut profile = SocialProfile::new("twitter");
    profile.url = Some(format!("https://twitter.com/{}", username));
    profile.username = Some(username);
    profile
}

fn linkedin_profile(url: &str) -> SocialProfile {
    let mut profile = SocialProfile::new("linkedin");
    profile.username = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    profile.url = Some(if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{}", url)
    });
    profile
}

fn process(
    verification: Option<Verification>,
    domain: Option<DomainSearch>,
    person: Option<Person>,
) -> EnrichmentData {
    let mut data = EnrichmentData::default();

    if let Some(v) = verification {
        if let Some(status) = v.status {
            data.extras.insert("email_status".into(), serde_json::json!(status));
        }
        if let Some(result) = v.result {
            data.extras.insert(
                "email_deliverable".into(),
                serde_json::json!(result == "deliverable"),
            );
        }
        if let Some(score) = v.score {
            data.extras
                .insert("email_quality_score".into(), serde_json::json!(score));
        }
        if let Some(webmail) = v.webmail {
            let kind = if webmail { "webmail" } else { "corporate" };
            data.extras.insert("email_type".into(), serde_json::json!(kind));
        }
        if v.disposable == Some(true) {
            data.extras
                .insert("disposable_email".into(), serde_json::json!(true));
        }
    }

    if let Some(d) = domain {
        data.company = d.organization.filter(|o| !o.trim().is_empty());
        let location: Vec<String> = [d.state, d.country].into_iter().flatten().collect();
        if !location.is_empty() {
            data.location = Some(location.join(", "));
        }
        if let Some(pattern) = d.pattern {
            data.extras.insert("email_pattern".into(), serde_json::json!(pattern));
        }
        if let Some(accept_all) = d.accept_all {
            data.extras
                .insert("domain_accepts_all".into(), serde_json::json!(accept_all));
        }
    }

    if let Some(p) = person {
        data.job_title = p.position;
        data.seniority = p.seniority.map(|s| s.to_lowercase());
        if let Some(department) = p.department {
            data.extras.insert("department".into(), serde_json::json!(department));
        }
        if let Some(score) = p.score {
            data.extras.insert("hunter_score".into(), serde_json::json!(score));
        }
        data.phone_numbers = p
            .phone_number
            .as_deref()
            .and_then(normalize_phone)
            .into_iter()
            .collect();
        if let Some(url) = p.linkedin.filter(|u| !u.is_empty()) {
            data.social_profiles.push(linkedin_profile(&url));
        }
        if let Some(handle) = p.twitter.filter(|h| !h.is_empty()) {
            data.social_profiles.push(twitter_profile(&handle));
        }
    }

    if let Some(company) = data.company.as_deref() {
        data.industry = Some(classify_industry(company).to_string());
    }
    if data.job_title.is_some() || data.company.is_some() {
        data.estimated_net_worth = Some(
            estimate_net_worth(WealthSignals {
                title: data.job_title.as_deref(),
                company: data.company.as_deref(),
                seniority: data.seniority.as_deref(),
                city: None,
            })
            .to_string(),
        );
    }

    data
}

#[async_trait]
impl SourceAdapter for HunterAdapter {
    fn source(&self) -> EnrichmentSource {
        EnrichmentSource::Hunter
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
        let mut calls = 1;

        let verification: Option<Verification> =
            self.get("email-verifier", &[("email", target.email.as_str())]).await?;

        // Domain search on a webmail domain lists strangers.
        let domain: Option<DomainSearch> = if target.domain.is_empty()
            || is_free_mail_domain(&target.domain)
        {
            None
        } else {
            calls += 1;
            self.get(
                "domain-search",
                &[("domain", target.domain.as_str()), ("limit", DOMAIN_SEARCH_LIMIT)],
            )
            .await?
        };

        let listed = domain.as_ref().and_then(|d| {
            d.emails
                .iter()
                .find(|e| {
                    e.value
                        .as_deref()
                        .is_some_and(|v| v.eq_ignore_ascii_case(&target.email))
                })
                .cloned()
        });

        let person = match (listed, target.name.as_deref().and_then(split_name)) {
            (Some(row), _) => Some(Person::from(row)),
            (None, Some((first, last))) if !target.domain.is_empty() => {
                calls += 1;
                let found: Option<EmailFinder> = self
                    .get(
                        "email-finder",
                        &[
                            ("domain", target.domain.as_str()),
                            ("first_name", first),
                            ("last_name", last),
                        ],
                    )
                    .await?;
                // The finder guesses an address; only trust it for this contact.
                found
                    .filter(|f| {
                        f.email
                            .as_deref()
                            .is_some_and(|e| e.eq_ignore_ascii_case(&target.email))
                    })
                    .map(Person::from)
            }
            _ => None,
        };

        let cost = self.settings.cost_per_request;
        let data = process(verification, domain, person);
        let mut result = if data.is_empty() {
            EnrichmentResult::not_found(self.source(), cost, calls, "No data found for email")
        } else {
            tracing::info!("Enriched {} via Hunter", target.email);
            EnrichmentResult::found(self.source(), data, self.settings.confidence_score, cost)
        };
        result.api_calls_used = calls;
        result.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("Ada Lovelace King"), Some(("Ada", "Lovelace King")));
        assert_eq!(split_name("  Cher "), Some(("Cher", "")));
        assert_eq!(split_name("   "), None);
    }

    #[test]
    fn test_process_combines_endpoints() {
        let verification = Verification {
            status: Some("valid".into()),
            result: Some("deliverable".into()),
            score: Some(92),
            webmail: Some(false),
            disposable: Some(false),
        };
        let domain = DomainSearch {
            organization: Some("Acme Software".into()),
            state: Some("CA".into()),
            country: Some("US".into()),
            pattern: Some("{first}".into()),
            accept_all: Some(false),
            emails: Vec::new(),
        };
        let person = Person {
            position: Some("Head of Sales".into()),
            seniority: Some("Executive".into()),
            twitter: Some("@pcollison".into()),
            ..Default::default()
        };

        let data = process(Some(verification), Some(domain), Some(person));
        assert_eq!(data.company.as_deref(), Some("Acme Software"));
        assert_eq!(data.location.as_deref(), Some("CA, US"));
        assert_eq!(data.job_title.as_deref(), Some("Head of Sales"));
        assert_eq!(data.seniority.as_deref(), Some("executive"));
        assert_eq!(data.industry.as_deref(), Some("Technology"));
        assert_eq!(data.extras["email_type"], "corporate");
        assert_eq!(data.extras["email_deliverable"], true);
        assert!(!data.extras.contains_key("disposable_email"));
        assert_eq!(data.social_profiles[0].username.as_deref(), Some("pcollison"));
        assert_eq!(
            data.social_profiles[0].url.as_deref(),
            Some("https://twitter.com/pcollison")
        );
    }

    #[test]
    fn test_linkedin_username_from_url() {
        let profile = linkedin_profile("linkedin.com/in/ada-lovelace/");
        assert_eq!(profile.username.as_deref(), Some("ada-lovelace"));
        assert_eq!(profile.url.as_deref(), Some("https://linkedin.com/in/ada-lovelace/"));
    }

    #[test]
    fn test_disabled_without_key() {
        let adapter = HunterAdapter::new(SourceSettings::hunter()).unwrap();
        assert!(!adapter.is_enabled());
        assert!(adapter.is_paid());
    }
}
