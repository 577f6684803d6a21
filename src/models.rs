use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Maximum number of source-specific extras kept on a contact.
pub const MAX_EXTRAS: usize = 32;

/// Maximum length (in chars) of an interaction excerpt.
pub const MAX_EXCERPT_CHARS: usize = 280;

// ============ Sources ============

/// Where a piece of enrichment data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnrichmentSource {
    #[serde(rename = "clearbit")]
    Clearbit,
    #[serde(rename = "peopledatalabs")]
    PeopleDataLabs,
    #[serde(rename = "hunter")]
    Hunter,
    #[serde(rename = "domain_inference")]
    DomainInference,
    #[serde(rename = "mock_data")]
    MockData,
    /// Guesses carried on raw provider records.
    #[serde(rename = "provider_hint")]
    ProviderHint,
}

impl EnrichmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentSource::Clearbit => "clearbit",
            EnrichmentSource::PeopleDataLabs => "peopledatalabs",
            EnrichmentSource::Hunter => "hunter",
            EnrichmentSource::DomainInference => "domain_inference",
            EnrichmentSource::MockData => "mock_data",
            EnrichmentSource::ProviderHint => "provider_hint",
        }
    }
}

impl fmt::Display for EnrichmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field value tagged with the confidence and source that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub value: T,
    pub confidence: f64,
    pub source: EnrichmentSource,
}

impl<T> Sourced<T> {
    pub fn new(value: T, confidence: f64, source: EnrichmentSource) -> Self {
        Self {
            value,
            confidence,
            source,
        }
    }
}

/// Stores `value` into `slot` only if `confidence` is strictly greater than
/// what the slot currently holds. Returns whether the slot changed.
pub fn offer<T>(
    slot: &mut Option<Sourced<T>>,
    value: T,
    confidence: f64,
    source: EnrichmentSource,
) -> bool {
    let better = match slot {
        Some(current) => confidence > current.confidence,
        None => true,
    };
    if better {
        *slot = Some(Sourced::new(value, confidence, source));
    }
    better
}

// ============ Interactions ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
    Cc,
    Bcc,
    Meeting,
    Call,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

/// Which analyzer produced a sentiment annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentOrigin {
    Ai,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnnotation {
    pub label: SentimentLabel,
    /// Strength of the label, 0..1.
    pub score: f64,
    pub origin: SentimentOrigin,
}

impl SentimentAnnotation {
    /// Signed sentiment in [-1, 1].
    pub fn polarity(&self) -> f64 {
        let strength = self.score.clamp(0.0, 1.0);
        match self.label {
            SentimentLabel::Positive => strength,
            SentimentLabel::Negative => -strength,
            SentimentLabel::Neutral => 0.0,
        }
    }
}

/// One observed exchange with a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub excerpt: String,
    /// Mail account that observed the interaction.
    #[serde(default)]
    pub account: Option<String>,
    /// Hours it took the contact to answer, when known.
    #[serde(default)]
    pub response_time_hours: Option<f64>,
    #[serde(default)]
    pub sentiment: Option<SentimentAnnotation>,
}

impl Interaction {
    pub fn new(
        direction: Direction,
        timestamp: DateTime<Utc>,
        subject: impl Into<String>,
        excerpt: &str,
    ) -> Self {
        Self {
            direction,
            timestamp,
            subject: subject.into(),
            excerpt: truncate_chars(excerpt, MAX_EXCERPT_CHARS),
            account: None,
            response_time_hours: None,
            sentiment: None,
        }
    }

    /// The only mutation allowed after creation.
    pub fn annotate(&mut self, annotation: SentimentAnnotation) {
        self.sentiment = Some(annotation);
    }
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Per-type interaction counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCounters {
    pub sent: u64,
    pub received: u64,
    pub cc: u64,
    pub bcc: u64,
    pub meetings: u64,
    pub calls: u64,
    pub frequency: u64,
}

impl InteractionCounters {
    /// Sum of the typed counters, used when a provider did not report a frequency.
    pub fn typed_total(&self) -> u64 {
        [self.received, self.cc, self.bcc, self.meetings, self.calls]
            .into_iter()
            .fold(self.sent, u64::saturating_add)
    }

    pub fn add(&mut self, other: &InteractionCounters) {
        self.sent = self.sent.saturating_add(other.sent);
        self.received = self.received.saturating_add(other.received);
        self.cc = self.cc.saturating_add(other.cc);
        self.bcc = self.bcc.saturating_add(other.bcc);
        self.meetings = self.meetings.saturating_add(other.meetings);
        self.calls = self.calls.saturating_add(other.calls);
        self.frequency = self.frequency.saturating_add(other.frequency);
    }

    /// min/max ratio of sent and received, 0 when either side is silent.
    pub fn balance(&self) -> f64 {
        if self.sent == 0 || self.received == 0 {
            return 0.0;
        }
        self.sent.min(self.received) as f64 / self.sent.max(self.received) as f64
    }
}

// ============ Enrichment payloads ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialProfile {
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<u64>,
    #[serde(default)]
    pub verified: bool,
}

impl SocialProfile {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into().to_lowercase(),
            ..Default::default()
        }
    }
}

/// Sparse payload returned by a source adapter or carried on a raw record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_net_worth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub social_profiles: Vec<SocialProfile>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl EnrichmentData {
    pub fn is_empty(&self) -> bool {
        self == &EnrichmentData::default()
    }
}

/// What an adapter returns for one lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub success: bool,
    pub data: EnrichmentData,
    pub source: EnrichmentSource,
    pub confidence: f64,
    pub cost: f64,
    pub api_calls_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl EnrichmentResult {
    pub fn found(source: EnrichmentSource, data: EnrichmentData, confidence: f64, cost: f64) -> Self {
        Self {
            success: true,
            data,
            source,
            confidence,
            cost,
            api_calls_used: if cost > 0.0 { 1 } else { 0 },
            error: None,
            elapsed_ms: 0,
        }
    }

    /// The upstream answered but had nothing for this identity.
    pub fn not_found(source: EnrichmentSource, cost: f64, api_calls_used: u32, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            data: EnrichmentData::default(),
            source,
            confidence: 0.0,
            cost,
            api_calls_used,
            error: Some(reason.into()),
            elapsed_ms: 0,
        }
    }
}

// ============ Raw provider input ============

/// One contact as a single mail provider saw it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawContact {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sent: u64,
    #[serde(default)]
    pub received: u64,
    #[serde(default)]
    pub cc: u64,
    #[serde(default)]
    pub bcc: u64,
    #[serde(default)]
    pub meetings: u64,
    #[serde(default)]
    pub calls: u64,
    /// Falls back to the sum of typed counters when absent.
    #[serde(default)]
    pub frequency: Option<u64>,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Single-source enrichment guesses made by the provider.
    #[serde(default)]
    pub hints: Option<EnrichmentData>,
    #[serde(default)]
    pub hint_confidence: Option<f64>,
}

impl RawContact {
    pub fn counters(&self) -> InteractionCounters {
        let mut counters = InteractionCounters {
            sent: self.sent,
            received: self.received,
            cc: self.cc,
            bcc: self.bcc,
            meetings: self.meetings,
            calls: self.calls,
            frequency: 0,
        };
        counters.frequency = self.frequency.unwrap_or_else(|| counters.typed_total());
        counters
    }
}

// ============ Canonical contact ============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentMeta {
    pub sources: BTreeSet<EnrichmentSource>,
    pub total_cost: f64,
    pub api_calls: u32,
    pub from_cache: bool,
    pub last_enriched: Option<DateTime<Utc>>,
}

/// The deduplicated record for one email identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub name: String,
    pub domain: String,
    pub counters: InteractionCounters,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Mail accounts / providers that observed this contact.
    #[serde(default)]
    pub accounts: BTreeSet<String>,
    #[serde(default)]
    pub account_stats: BTreeMap<String, InteractionCounters>,

    #[serde(default)]
    pub location: Option<Sourced<String>>,
    #[serde(default)]
    pub estimated_net_worth: Option<Sourced<String>>,
    #[serde(default)]
    pub job_title: Option<Sourced<String>>,
    #[serde(default)]
    pub company: Option<Sourced<String>>,
    #[serde(default)]
    pub company_domain: Option<Sourced<String>>,
    #[serde(default)]
    pub industry: Option<Sourced<String>>,
    #[serde(default)]
    pub seniority: Option<Sourced<String>>,
    #[serde(default)]
    pub timezone: Option<Sourced<String>>,
    #[serde(default)]
    pub phone_numbers: BTreeSet<String>,
    #[serde(default)]
    pub social_profiles: BTreeMap<String, Sourced<SocialProfile>>,
    #[serde(default)]
    pub extras: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub enrichment: EnrichmentMeta,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub score: Option<ContactScore>,
}

impl Contact {
    /// `email` must already be normalized.
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();
        let domain = email
            .rsplit_once('@')
            .map(|(_, d)| d.to_string())
            .unwrap_or_default();
        Self {
            email,
            name: String::new(),
            domain,
            counters: InteractionCounters::default(),
            first_seen: None,
            last_seen: None,
            interactions: Vec::new(),
            accounts: BTreeSet::new(),
            account_stats: BTreeMap::new(),
            location: None,
            estimated_net_worth: None,
            job_title: None,
            company: None,
            company_domain: None,
            industry: None,
            seniority: None,
            timezone: None,
            phone_numbers: BTreeSet::new(),
            social_profiles: BTreeMap::new(),
            extras: BTreeMap::new(),
            enrichment: EnrichmentMeta::default(),
            confidence: 0.0,
            score: None,
        }
    }

    /// Longest non-empty name wins; ties keep the current one.
    pub fn offer_name(&mut self, candidate: &str) {
        let candidate = candidate.trim();
        if candidate.chars().count() > self.name.chars().count() {
            self.name = candidate.to_string();
        }
    }

    /// Folds an enrichment payload in, field by field. A field only changes
    /// when `confidence` is strictly greater than what it holds. Returns the
    /// number of fields that changed.
    pub fn apply_enrichment(
        &mut self,
        data: &EnrichmentData,
        confidence: f64,
        source: EnrichmentSource,
    ) -> usize {
        let mut changed = 0;
        let mut take = |slot: &mut Option<Sourced<String>>, value: &Option<String>| {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                if offer(slot, v.to_string(), confidence, source) {
                    changed += 1;
                }
            }
        };

        take(&mut self.location, &data.location);
        take(&mut self.estimated_net_worth, &data.estimated_net_worth);
        take(&mut self.job_title, &data.job_title);
        take(&mut self.company, &data.company);
        take(&mut self.company_domain, &data.company_domain);
        take(&mut self.industry, &data.industry);
        take(&mut self.seniority, &data.seniority);
        take(&mut self.timezone, &data.timezone);

        if self.name.is_empty() {
            if let Some(name) = data.name.as_deref() {
                self.offer_name(name);
            }
        }

        for phone in &data.phone_numbers {
            if self.phone_numbers.insert(phone.clone()) {
                changed += 1;
            }
        }

        for profile in &data.social_profiles {
            let key = profile.platform.to_lowercase();
            let mut slot = self.social_profiles.remove(&key);
            if offer(&mut slot, profile.clone(), confidence, source) {
                changed += 1;
            }
            if let Some(slot) = slot {
                self.social_profiles.insert(key, slot);
            }
        }

        for (key, value) in &data.extras {
            if self.extras.contains_key(key) {
                continue;
            }
            if self.extras.len() >= MAX_EXTRAS {
                tracing::debug!("Dropping extra '{}' for {}: bound reached", key, self.email);
                continue;
            }
            self.extras.insert(key.clone(), value.clone());
            changed += 1;
        }

        if changed > 0 {
            self.enrichment.sources.insert(source);
        }
        self.recompute_confidence();
        changed
    }

    /// Contact confidence is the best confidence of any populated field.
    pub fn recompute_confidence(&mut self) {
        let scalar = [
            &self.location,
            &self.estimated_net_worth,
            &self.job_title,
            &self.company,
            &self.company_domain,
            &self.industry,
            &self.seniority,
            &self.timezone,
        ]
        .into_iter()
        .flatten()
        .map(|f| f.confidence);
        let profiles = self.social_profiles.values().map(|p| p.confidence);

        self.confidence = scalar.chain(profiles).fold(0.0, f64::max);
    }

    pub fn company_name(&self) -> Option<&str> {
        self.company.as_ref().map(|c| c.value.as_str())
    }

    pub fn job_title_str(&self) -> Option<&str> {
        self.job_title.as_ref().map(|c| c.value.as_str())
    }

    pub fn is_enriched(&self) -> bool {
        !self.enrichment.sources.is_empty()
    }

    /// A source other than a provider hint set a field the full score reads.
    pub fn has_scored_enrichment(&self) -> bool {
        let from_source = |source: EnrichmentSource| source != EnrichmentSource::ProviderHint;
        [&self.company, &self.job_title, &self.seniority, &self.industry]
            .into_iter()
            .flatten()
            .any(|field| from_source(field.source))
            || self.social_profiles.values().any(|p| from_source(p.source))
    }

    pub fn has_ai_sentiment(&self) -> bool {
        self.interactions.iter().any(|i| {
            i.sentiment
                .as_ref()
                .is_some_and(|s| s.origin == SentimentOrigin::Ai)
        })
    }

    /// Frequency, two-way balance and meeting signal. Excludes recency so the
    /// value is stable for a given input.
    pub fn interaction_strength(&self) -> f64 {
        let c = &self.counters;
        if c.frequency == 0 {
            return 0.0;
        }
        let base = (c.frequency as f64 / 25.0).min(0.4);
        let bidirectional = c.balance() * 0.3;
        let meetings = (c.meetings.saturating_add(c.calls) as f64 / 10.0).min(0.1);
        base + bidirectional + meetings
    }
}

// ============ Scores ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    InteractionFrequency,
    ResponseRate,
    Recency,
    Sentiment,
    CompanyImportance,
    TitleSeniority,
    SocialInfluence,
    NetworkQuality,
    ContentEngagement,
    MeetingEngagement,
}

impl ScoreFactor {
    pub const ALL: [ScoreFactor; 10] = [
        ScoreFactor::InteractionFrequency,
        ScoreFactor::ResponseRate,
        ScoreFactor::Recency,
        ScoreFactor::Sentiment,
        ScoreFactor::CompanyImportance,
        ScoreFactor::TitleSeniority,
        ScoreFactor::SocialInfluence,
        ScoreFactor::NetworkQuality,
        ScoreFactor::ContentEngagement,
        ScoreFactor::MeetingEngagement,
    ];

    /// Factors used when no AI or enrichment signal is available.
    pub const FALLBACK: [ScoreFactor; 5] = [
        ScoreFactor::InteractionFrequency,
        ScoreFactor::ResponseRate,
        ScoreFactor::Recency,
        ScoreFactor::CompanyImportance,
        ScoreFactor::TitleSeniority,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreFactor::InteractionFrequency => "interaction_frequency",
            ScoreFactor::ResponseRate => "response_rate",
            ScoreFactor::Recency => "recency",
            ScoreFactor::Sentiment => "sentiment",
            ScoreFactor::CompanyImportance => "company_importance",
            ScoreFactor::TitleSeniority => "title_seniority",
            ScoreFactor::SocialInfluence => "social_influence",
            ScoreFactor::NetworkQuality => "network_quality",
            ScoreFactor::ContentEngagement => "content_engagement",
            ScoreFactor::MeetingEngagement => "meeting_engagement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    Full,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentTrend {
    Improving,
    Declining,
    Stable,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactWindow {
    Morning,
    Afternoon,
    Evening,
    OffHours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Meetings,
    Calls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationPatterns {
    pub average_sentiment: f64,
    pub sentiment_trend: SentimentTrend,
    pub average_response_hours: Option<f64>,
    pub best_contact_time: Option<ContactWindow>,
    pub preferred_channel: Channel,
}

impl Default for CommunicationPatterns {
    fn default() -> Self {
        Self {
            average_sentiment: 0.0,
            sentiment_trend: SentimentTrend::Neutral,
            average_response_hours: None,
            best_contact_time: None,
            preferred_channel: Channel::Email,
        }
    }
}

/// Scoring output for one contact. Always replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactScore {
    pub overall: f64,
    pub factors: BTreeMap<ScoreFactor, f64>,
    pub engagement: f64,
    pub influence: f64,
    pub deal_potential: f64,
    pub response_likelihood: f64,
    pub relationship_strength: f64,
    pub importance: f64,
    pub mode: ScoringMode,
    pub patterns: CommunicationPatterns,
    pub calculated_at: DateTime<Utc>,
}

impl ContactScore {
    pub fn factor(&self, factor: ScoreFactor) -> f64 {
        self.factors.get(&factor).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(company: &str) -> EnrichmentData {
        EnrichmentData {
            company: Some(company.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_contact_domain_from_email() {
        let contact = Contact::new("alice@acme.com");
        assert_eq!(contact.domain, "acme.com");
    }

    #[test]
    fn test_field_only_replaced_by_higher_confidence() {
        let mut contact = Contact::new("a@b.com");

        assert_eq!(contact.apply_enrichment(&data("Low"), 0.3, EnrichmentSource::DomainInference), 1);
        assert_eq!(contact.apply_enrichment(&data("Same"), 0.3, EnrichmentSource::MockData), 0);
        assert_eq!(contact.company_name(), Some("Low"));

        assert_eq!(contact.apply_enrichment(&data("High"), 0.9, EnrichmentSource::Clearbit), 1);
        assert_eq!(contact.company_name(), Some("High"));
        assert_eq!(contact.apply_enrichment(&data("Lower"), 0.5, EnrichmentSource::MockData), 0);
        assert_eq!(contact.company_name(), Some("High"));
        assert_eq!(contact.confidence, 0.9);
        assert!(!contact.enrichment.sources.contains(&EnrichmentSource::MockData));
    }

    #[test]
    fn test_extras_are_bounded() {
        let mut contact = Contact::new("a@b.com");
        let mut payload = EnrichmentData::default();
        for i in 0..(MAX_EXTRAS + 10) {
            payload.extras.insert(format!("k{:03}", i), serde_json::json!(i));
        }
        contact.apply_enrichment(&payload, 0.5, EnrichmentSource::Clearbit);
        assert_eq!(contact.extras.len(), MAX_EXTRAS);
    }

    #[test]
    fn test_longest_name_wins() {
        let mut contact = Contact::new("a@b.com");
        contact.offer_name("Al");
        contact.offer_name("Alice Smith");
        contact.offer_name("Bob Jones!!");
        assert_eq!(contact.name, "Alice Smith");
        contact.offer_name("   ");
        assert_eq!(contact.name, "Alice Smith");
    }

    #[test]
    fn test_excerpt_truncated() {
        let long = "é".repeat(400);
        let interaction = Interaction::new(Direction::Received, Utc::now(), "hi", &long);
        assert_eq!(interaction.excerpt.chars().count(), MAX_EXCERPT_CHARS);
    }

    #[test]
    fn test_raw_frequency_defaults_to_typed_total() {
        let raw = RawContact {
            sent: 2,
            received: 3,
            meetings: 1,
            ..Default::default()
        };
        assert_eq!(raw.counters().frequency, 6);

        let raw = RawContact {
            sent: 2,
            frequency: Some(10),
            ..Default::default()
        };
        assert_eq!(raw.counters().frequency, 10);
    }

    #[test]
    fn test_source_serializes_as_wire_name() {
        assert_eq!(
            serde_json::to_string(&EnrichmentSource::DomainInference).unwrap(),
            "\"domain_inference\""
        );
    }
}
