//! Multi-factor contact scoring.
//!
//! Every factor yields a sub-score in `[0, 1]`. The overall score is the
//! weighted sum of the factors for the contact's [`ScoringMode`]. In fallback
//! mode (no AI sentiment, no enrichment) only interaction frequency, response
//! rate, recency, company and title are used, with their weights rescaled to
//! sum to 1.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::AppError;
use crate::models::{
    Channel, CommunicationPatterns, Contact, ContactScore, ContactWindow, Direction, Interaction,
    ScoreFactor, ScoringMode, SentimentLabel, SentimentTrend,
};
use crate::sentiment;
use crate::sources::heuristics::{has_any_term, has_term};
use crate::validation::is_free_mail_domain;

/// Score for a company that matches no tier, or one only known from a
/// business domain.
const DEFAULT_COMPANY_SCORE: f64 = 0.5;
const PERSONAL_DOMAIN_COMPANY_SCORE: f64 = 0.3;
const UNKNOWN_TITLE_SCORE: f64 = 0.4;

const COMPANY_TIERS: &[(&str, f64)] = &[
    ("google", 0.95),
    ("apple", 0.95),
    ("microsoft", 0.95),
    ("amazon", 0.95),
    ("meta", 0.95),
    ("netflix", 0.90),
    ("tesla", 0.90),
    ("nvidia", 0.90),
    ("salesforce", 0.85),
    ("goldman sachs", 0.90),
    ("jp morgan", 0.90),
    ("blackrock", 0.85),
    ("visa", 0.85),
    ("mckinsey", 0.90),
    ("bain", 0.85),
    ("bcg", 0.85),
    ("deloitte", 0.80),
    ("coca cola", 0.80),
    ("walmart", 0.75),
    ("exxon", 0.75),
    ("uber", 0.80),
    ("airbnb", 0.80),
    ("stripe", 0.85),
    ("spacex", 0.90),
];

/// Ordered longest keyword first so "senior manager" wins over "manager".
const TITLE_TIERS: &[(&str, f64)] = &[
    ("principal engineer", 0.70),
    ("vice president", 0.85),
    ("senior manager", 0.65),
    ("coordinator", 0.40),
    ("co-founder", 0.95),
    ("specialist", 0.45),
    ("president", 0.95),
    ("principal", 0.70),
    ("director", 0.75),
    ("engineer", 0.45),
    ("founder", 1.0),
    ("manager", 0.60),
    ("analyst", 0.45),
    ("head of", 0.75),
    ("senior", 0.55),
    ("chief", 0.90),
    ("staff", 0.60),
    ("lead", 0.65),
    ("ceo", 1.0),
    ("cto", 0.95),
    ("cfo", 0.95),
    ("coo", 0.90),
    ("svp", 0.90),
    ("evp", 0.90),
    ("vp", 0.85),
    ("sr", 0.55),
];

const HIGH_VALUE_INDUSTRIES: &[&str] = &["technology", "financ", "consulting", "healthcare", "energy"];

/// Factor weights. Non-negative, expected to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub interaction_frequency: f64,
    pub response_rate: f64,
    pub recency: f64,
    pub sentiment: f64,
    pub company_importance: f64,
    pub title_seniority: f64,
    pub social_influence: f64,
    pub network_quality: f64,
    pub content_engagement: f64,
    pub meeting_engagement: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            interaction_frequency: 0.20,
            response_rate: 0.15,
            recency: 0.15,
            sentiment: 0.10,
            company_importance: 0.10,
            title_seniority: 0.10,
            social_influence: 0.05,
            network_quality: 0.05,
            content_engagement: 0.05,
            meeting_engagement: 0.05,
        }
    }
}

impl ScoringWeights {
    pub fn weight(&self, factor: ScoreFactor) -> f64 {
        match factor {
            ScoreFactor::InteractionFrequency => self.interaction_frequency,
            ScoreFactor::ResponseRate => self.response_rate,
            ScoreFactor::Recency => self.recency,
            ScoreFactor::Sentiment => self.sentiment,
            ScoreFactor::CompanyImportance => self.company_importance,
            ScoreFactor::TitleSeniority => self.title_seniority,
            ScoreFactor::SocialInfluence => self.social_influence,
            ScoreFactor::NetworkQuality => self.network_quality,
            ScoreFactor::ContentEngagement => self.content_engagement,
            ScoreFactor::MeetingEngagement => self.meeting_engagement,
        }
    }

    pub fn total(&self) -> f64 {
        ScoreFactor::ALL.iter().map(|f| self.weight(*f)).sum()
    }

    /// Weights for `factors`, rescaled to sum to 1. Equal weights when the
    /// configured ones are all zero.
    pub fn renormalized(&self, factors: &[ScoreFactor]) -> BTreeMap<ScoreFactor, f64> {
        let sum: f64 = factors.iter().map(|f| self.weight(*f)).sum();
        factors
            .iter()
            .map(|f| {
                let w = if sum > 0.0 {
                    self.weight(*f) / sum
                } else {
                    1.0 / factors.len() as f64
                };
                (*f, w)
            })
            .collect()
    }
}

/// Which score to order contacts by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankKey {
    #[default]
    Overall,
    Importance,
    Engagement,
    ResponseLikelihood,
    DealPotential,
    Influence,
    RelationshipStrength,
}

impl RankKey {
    pub fn value(&self, score: &ContactScore) -> f64 {
        match self {
            RankKey::Overall => score.overall,
            RankKey::Importance => score.importance,
            RankKey::Engagement => score.engagement,
            RankKey::ResponseLikelihood => score.response_likelihood,
            RankKey::DealPotential => score.deal_potential,
            RankKey::Influence => score.influence,
            RankKey::RelationshipStrength => score.relationship_strength,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreDistribution {
    /// overall >= 0.8
    pub high: usize,
    /// 0.5 <= overall < 0.8
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyScore {
    pub company: String,
    pub average_score: f64,
    pub contacts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringInsights {
    pub total_contacts: usize,
    pub average_score: f64,
    pub distribution: ScoreDistribution,
    pub top_companies: Vec<CompanyScore>,
    pub average_response_rate: f64,
    pub fallback_contacts: usize,
    pub weights: ScoringWeights,
}

#[derive(Debug, Clone, Serialize)]
pub struct FactorContribution {
    pub factor: ScoreFactor,
    pub score: f64,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreExplanation {
    pub email: String,
    pub overall: f64,
    pub mode: ScoringMode,
    pub components: Vec<FactorContribution>,
    pub key_insights: Vec<String>,
}

type FactorResult = Result<f64, AppError>;

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: ScoringWeights,
    ai_enabled: bool,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights, ai_enabled: bool) -> Self {
        let total = weights.total();
        if (total - 1.0).abs() > 0.01 {
            tracing::warn!("Scoring weights sum to {:.3}, expected 1.0", total);
        }
        Self {
            weights,
            ai_enabled,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Full only when the contact carries evidence the extra factors can use:
    /// real enrichment, or AI sentiment while AI sentiment is switched on.
    pub fn mode_for(&self, contact: &Contact) -> ScoringMode {
        if contact.has_scored_enrichment() || (self.ai_enabled && contact.has_ai_sentiment()) {
            ScoringMode::Full
        } else {
            ScoringMode::Fallback
        }
    }

    pub fn score(&self, contact: &Contact) -> ContactScore {
        self.score_at(contact, Utc::now())
    }

    /// Scores against a fixed clock. Never fails.
    pub fn score_at(&self, contact: &Contact, now: DateTime<Utc>) -> ContactScore {
        let mode = self.mode_for(contact);
        let all: BTreeMap<ScoreFactor, f64> = ScoreFactor::ALL
            .iter()
            .map(|f| (*f, guarded(&contact.email, *f, || compute_factor(*f, contact, now))))
            .collect();
        let get = |f: ScoreFactor| all.get(&f).copied().unwrap_or(0.0);

        let (factors, overall) = match mode {
            ScoringMode::Full => {
                let overall = ScoreFactor::ALL
                    .iter()
                    .map(|f| get(*f) * self.weights.weight(*f))
                    .sum::<f64>();
                (all.clone(), overall)
            }
            ScoringMode::Fallback => {
                let weights = self.weights.renormalized(&ScoreFactor::FALLBACK);
                let overall = weights.iter().map(|(f, w)| get(*f) * w).sum::<f64>();
                let factors = ScoreFactor::FALLBACK
                    .iter()
                    .map(|f| (*f, get(*f)))
                    .collect();
                (factors, overall)
            }
        };

        let company = get(ScoreFactor::CompanyImportance);
        let title = get(ScoreFactor::TitleSeniority);
        let response_hours = average_response_hours(contact);

        ContactScore {
            overall: finite_unit(overall),
            factors,
            engagement: finite_unit(
                get(ScoreFactor::MeetingEngagement) * 0.5
                    + get(ScoreFactor::InteractionFrequency) * 0.25
                    + get(ScoreFactor::ContentEngagement) * 0.25,
            ),
            influence: finite_unit(
                company * 0.4
                    + title * 0.3
                    + get(ScoreFactor::NetworkQuality) * 0.2
                    + responsiveness(response_hours) * 0.1,
            ),
            deal_potential: finite_unit(deal_potential(contact, title)),
            response_likelihood: finite_unit(
                get(ScoreFactor::ResponseRate) * 0.7 + get(ScoreFactor::Recency) * 0.3,
            ),
            relationship_strength: finite_unit(relationship_strength(contact, now)),
            importance: company.max(title),
            mode,
            patterns: communication_patterns(contact, response_hours),
            calculated_at: now,
        }
    }

    /// Scores every contact in place.
    pub fn score_all(&self, contacts: &mut [Contact]) {
        let now = Utc::now();
        for contact in contacts.iter_mut() {
            contact.score = Some(self.score_at(contact, now));
        }
        tracing::debug!("Scored {} contacts", contacts.len());
    }

    /// Scores and orders contacts by `key` descending, ties by email.
    pub fn rank(&self, mut contacts: Vec<Contact>, key: RankKey) -> Vec<Contact> {
        self.score_all(&mut contacts);
        let value = |c: &Contact| c.score.as_ref().map(|s| key.value(s)).unwrap_or(0.0);
        contacts.sort_by(|a, b| {
            value(b)
                .total_cmp(&value(a))
                .then_with(|| a.email.cmp(&b.email))
        });
        contacts
    }

    pub fn insights(&self, contacts: &[Contact]) -> ScoringInsights {
        let scores: Vec<ContactScore> = contacts
            .iter()
            .map(|c| c.score.clone().unwrap_or_else(|| self.score(c)))
            .collect();
        let n = scores.len();

        let mut distribution = ScoreDistribution::default();
        for s in &scores {
            if s.overall >= 0.8 {
                distribution.high += 1;
            } else if s.overall >= 0.5 {
                distribution.medium += 1;
            } else {
                distribution.low += 1;
            }
        }

        let mut by_company: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for (contact, score) in contacts.iter().zip(&scores) {
            if let Some(company) = contact.company_name() {
                by_company.entry(company).or_default().push(score.overall);
            }
        }
        let mut top_companies: Vec<CompanyScore> = by_company
            .into_iter()
            .map(|(company, values)| CompanyScore {
                company: company.to_string(),
                average_score: mean(&values),
                contacts: values.len(),
            })
            .collect();
        top_companies.sort_by(|a, b| b.average_score.total_cmp(&a.average_score));
        top_companies.truncate(10);

        let response_rates: Vec<f64> = scores
            .iter()
            .filter_map(|s| s.factors.get(&ScoreFactor::ResponseRate).copied())
            .filter(|r| *r > 0.0)
            .collect();

        ScoringInsights {
            total_contacts: n,
            average_score: mean(&scores.iter().map(|s| s.overall).collect::<Vec<_>>()),
            distribution,
            top_companies,
            average_response_rate: mean(&response_rates),
            fallback_contacts: scores
                .iter()
                .filter(|s| s.mode == ScoringMode::Fallback)
                .count(),
            weights: self.weights.clone(),
        }
    }

    /// Per-factor breakdown with the weight each factor carried.
    pub fn explain(&self, contact: &Contact) -> ScoreExplanation {
        let now = Utc::now();
        let score = self.score_at(contact, now);
        let weights = match score.mode {
            ScoringMode::Full => ScoreFactor::ALL
                .iter()
                .map(|f| (*f, self.weights.weight(*f)))
                .collect(),
            ScoringMode::Fallback => self.weights.renormalized(&ScoreFactor::FALLBACK),
        };

        let components = score
            .factors
            .iter()
            .map(|(factor, value)| {
                let weight = weights.get(factor).copied().unwrap_or(0.0);
                FactorContribution {
                    factor: *factor,
                    score: *value,
                    weight,
                    contribution: value * weight,
                }
            })
            .collect();

        let mut key_insights = vec![format!(
            "Has {} total interactions",
            contact.counters.frequency
        )];
        if let Some(days) = days_since_last(contact, now) {
            key_insights.push(format!("Last contact {} days ago", days));
        }
        key_insights.push(format!(
            "Response rate: {:.1}%",
            score.factor(ScoreFactor::ResponseRate) * 100.0
        ));
        key_insights.push(format!(
            "Company importance: {:.2}",
            score.factor(ScoreFactor::CompanyImportance)
        ));
        key_insights.push(format!(
            "Title seniority: {:.2}",
            score.factor(ScoreFactor::TitleSeniority)
        ));
        if score.mode == ScoringMode::Fallback {
            key_insights.push("Scored with interaction data only".to_string());
        }

        ScoreExplanation {
            email: contact.email.clone(),
            overall: score.overall,
            mode: score.mode,
            components,
            key_insights,
        }
    }
}

/// Runs one factor, turning errors and non-finite values into 0.
fn guarded(email: &str, factor: ScoreFactor, compute: impl FnOnce() -> FactorResult) -> f64 {
    match compute() {
        Ok(value) if value.is_finite() => value.clamp(0.0, 1.0),
        Ok(value) => {
            tracing::warn!(
                "{} for {} is not finite ({}), counting as 0",
                factor.as_str(),
                email,
                value
            );
            0.0
        }
        Err(e) => {
            tracing::debug!("{} unavailable for {}: {}", factor.as_str(), email, e);
            0.0
        }
    }
}

fn finite_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn compute_factor(factor: ScoreFactor, contact: &Contact, now: DateTime<Utc>) -> FactorResult {
    match factor {
        ScoreFactor::InteractionFrequency => frequency_score(contact),
        ScoreFactor::ResponseRate => response_score(contact),
        ScoreFactor::Recency => recency_score(contact, now),
        ScoreFactor::Sentiment => sentiment_score(contact),
        ScoreFactor::CompanyImportance => company_score(contact),
        ScoreFactor::TitleSeniority => title_score(contact),
        ScoreFactor::SocialInfluence => social_influence_score(contact),
        ScoreFactor::NetworkQuality => network_quality_score(contact),
        ScoreFactor::ContentEngagement => content_engagement_score(contact),
        ScoreFactor::MeetingEngagement => meeting_engagement_score(contact, now),
    }
}

fn days_since_last(contact: &Contact, now: DateTime<Utc>) -> Option<i64> {
    contact
        .last_seen
        .map(|last| now.signed_duration_since(last).num_days().max(0))
}

fn frequency_score(contact: &Contact) -> FactorResult {
    let c = &contact.counters;
    if c.frequency == 0 {
        return Ok(0.0);
    }
    let base = ((c.frequency as f64 + 1.0).ln() / 26f64.ln()).min(1.0);

    let mut variety = 0.0;
    if c.meetings > 0 {
        variety += 0.05;
    }
    if c.calls > 0 {
        variety += 0.03;
    }
    if c.cc > 0 || c.bcc > 0 {
        variety += 0.02;
    }
    Ok((base + variety).min(1.0))
}

fn response_score(contact: &Contact) -> FactorResult {
    let c = &contact.counters;
    if c.sent == 0 {
        return Ok(0.5);
    }
    let mut rate = c.received as f64 / c.sent as f64 + c.balance() * 0.2;
    match average_response_hours(contact) {
        Some(hours) if hours < 4.0 => rate += 0.1,
        Some(hours) if hours < 24.0 => rate += 0.05,
        _ => {}
    }
    Ok(rate.min(1.0))
}

fn recency_score(contact: &Contact, now: DateTime<Utc>) -> FactorResult {
    let days = days_since_last(contact, now)
        .ok_or_else(|| AppError::Validation("no last-seen timestamp".to_string()))?;
    let base = match days {
        0..=1 => 1.0,
        2..=7 => 0.9,
        8..=30 => 0.7,
        31..=90 => 0.5,
        91..=180 => 0.3,
        _ => 0.1,
    };
    Ok((base + cadence_bonus(&contact.interactions)).min(1.0))
}

/// Small bonus for evenly spaced contact, from the coefficient of variation
/// of the gaps between interactions.
fn cadence_bonus(interactions: &[Interaction]) -> f64 {
    if interactions.len() < 3 {
        return 0.0;
    }
    let mut times: Vec<DateTime<Utc>> = interactions.iter().map(|i| i.timestamp).collect();
    times.sort();

    let gaps: Vec<f64> = times
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64 / 3600.0)
        .collect();
    let avg = mean(&gaps);
    if avg <= 0.0 {
        return 0.0;
    }
    let variance = gaps.iter().map(|g| (g - avg).powi(2)).sum::<f64>() / gaps.len() as f64;
    let cv = variance.sqrt() / avg;

    if cv < 0.5 {
        0.05
    } else if cv < 1.0 {
        0.025
    } else {
        0.0
    }
}

fn chronological(interactions: &[Interaction]) -> Vec<&Interaction> {
    let mut ordered: Vec<&Interaction> = interactions.iter().collect();
    ordered.sort_by_key(|i| i.timestamp);
    ordered
}

/// Later interactions weigh up to 1.5x the earliest.
fn sentiment_score(contact: &Contact) -> FactorResult {
    if contact.interactions.is_empty() {
        return Ok(0.5);
    }
    let ordered = chronological(&contact.interactions);
    let n = ordered.len() as f64;

    let (mut weighted, mut total) = (0.0, 0.0);
    for (i, interaction) in ordered.iter().enumerate() {
        let weight = 1.0 + (i as f64 / n) * 0.5;
        weighted += sentiment::polarity(interaction) * weight;
        total += weight;
    }
    Ok(((weighted / total + 1.0) / 2.0).clamp(0.0, 1.0))
}

fn leading_number(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn company_signal_bonus(contact: &Contact) -> f64 {
    let mut bonus = 0.0;
    if let Some(industry) = &contact.industry {
        let industry = industry.value.to_lowercase();
        if HIGH_VALUE_INDUSTRIES.iter().any(|i| industry.contains(i)) {
            bonus += 0.05;
        }
    }
    let large = contact
        .extras
        .get("company_size")
        .and_then(|v| v.as_str())
        .and_then(leading_number)
        .map(|size| size >= 1000)
        .unwrap_or(false);
    if large {
        bonus += 0.05;
    }
    bonus
}

fn company_score(contact: &Contact) -> FactorResult {
    let Some(company) = contact.company_name() else {
        let business_domain = !contact.domain.is_empty() && !is_free_mail_domain(&contact.domain);
        return Ok(if business_domain {
            DEFAULT_COMPANY_SCORE
        } else {
            PERSONAL_DOMAIN_COMPANY_SCORE
        });
    };

    let name = company.to_lowercase();
    let base = COMPANY_TIERS
        .iter()
        .find(|(keyword, _)| has_term(&name, keyword))
        .map(|(_, score)| *score)
        .unwrap_or_else(|| {
            if has_any_term(&name, &["bank", "capital", "ventures"]) {
                0.7
            } else if has_any_term(&name, &["consulting", "advisory"]) {
                0.75
            } else if has_any_term(&name, &["university", "college"]) || contact.domain.ends_with(".edu") {
                0.6
            } else {
                DEFAULT_COMPANY_SCORE
            }
        });

    Ok((base + company_signal_bonus(contact)).min(1.0))
}

fn title_score(contact: &Contact) -> FactorResult {
    let Some(title) = contact.job_title_str() else {
        return Ok(UNKNOWN_TITLE_SCORE);
    };
    let title = title.to_lowercase();

    let base = TITLE_TIERS
        .iter()
        .find(|(keyword, _)| has_term(&title, keyword))
        .map(|(_, score)| *score)
        .unwrap_or_else(|| {
            if has_any_term(&title, &["executive", "owner", "partner"]) {
                0.8
            } else if has_any_term(&title, &["management", "supervisor"]) {
                0.6
            } else if has_any_term(&title, &["developer", "architect"]) {
                0.5
            } else {
                UNKNOWN_TITLE_SCORE
            }
        });

    let bonus = match contact.seniority.as_ref().map(|s| s.value.as_str()) {
        Some("executive") => 0.05,
        Some("director") => 0.03,
        _ => 0.0,
    };
    Ok((base + bonus).min(1.0))
}

fn social_influence_score(contact: &Contact) -> FactorResult {
    if contact.social_profiles.is_empty() {
        return Ok(0.0);
    }
    let mut reach: f64 = 0.0;
    let mut connections: f64 = 0.0;
    let mut verified = false;
    for profile in contact.social_profiles.values().map(|p| &p.value) {
        if let Some(followers) = profile.followers {
            reach = reach.max((followers as f64 + 1.0).ln() / 100_001f64.ln());
        }
        if let Some(count) = profile.connections {
            connections = connections.max((count as f64 / 500.0).min(1.0));
        }
        verified |= profile.verified;
    }
    let verified_bonus = if verified { 0.1 } else { 0.0 };
    Ok((reach.min(1.0) * 0.6 + connections * 0.3 + verified_bonus).min(1.0))
}

fn network_quality_score(contact: &Contact) -> FactorResult {
    let mut score: f64 = 0.0;
    for (platform, profile) in &contact.social_profiles {
        let profile = &profile.value;
        score += match platform.as_str() {
            "linkedin" => 0.3,
            "twitter" | "x" => match profile.followers.unwrap_or(0) {
                f if f > 10_000 => 0.3,
                f if f > 1_000 => 0.2,
                _ => 0.1,
            },
            "github" => 0.2,
            _ => 0.1,
        };
        if profile.connections.unwrap_or(0) >= 500 {
            score += 0.2;
        }
    }
    Ok(score.min(1.0))
}

fn content_engagement_score(contact: &Contact) -> FactorResult {
    if contact.social_profiles.is_empty() {
        return Ok(0.0);
    }
    let profiles = contact.social_profiles.values().map(|p| &p.value);
    let (posts, verified) = profiles.fold((0u64, false), |(posts, verified), p| {
        (posts.saturating_add(p.posts.unwrap_or(0)), verified || p.verified)
    });
    let activity = ((posts as f64 + 1.0).ln() / 501f64.ln()).min(1.0);
    let verified_bonus = if verified { 0.2 } else { 0.0 };
    Ok((activity * 0.8 + verified_bonus).min(1.0))
}

fn meeting_engagement_score(contact: &Contact, now: DateTime<Utc>) -> FactorResult {
    let c = &contact.counters;
    let live = c.meetings.saturating_add(c.calls);
    if live == 0 {
        return Ok(0.0);
    }
    let base = if c.frequency > 0 {
        (live as f64 / c.frequency as f64 * 2.0).min(1.0)
    } else {
        (live as f64 / 5.0).min(1.0)
    };

    let mut bonus = 0.0;
    if c.frequency > 10 {
        bonus += 0.05;
    }
    if days_since_last(contact, now).is_some_and(|d| d <= 30) {
        bonus += 0.05;
    }
    Ok((base + bonus).min(1.0))
}

/// Mean hours to an answer. Uses reported latencies when present, otherwise
/// pairs each sent message with the next received one.
pub fn average_response_hours(contact: &Contact) -> Option<f64> {
    let reported: Vec<f64> = contact
        .interactions
        .iter()
        .filter_map(|i| i.response_time_hours)
        .filter(|h| h.is_finite() && *h >= 0.0)
        .collect();
    if !reported.is_empty() {
        return Some(mean(&reported));
    }

    let ordered = chronological(&contact.interactions);
    let derived: Vec<f64> = ordered
        .windows(2)
        .filter(|w| {
            w[0].direction == Direction::Sent
                && w[1].direction == Direction::Received
                && w[1].timestamp > w[0].timestamp
        })
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds() as f64 / 3600.0)
        .collect();
    if derived.is_empty() {
        None
    } else {
        Some(mean(&derived))
    }
}

fn responsiveness(hours: Option<f64>) -> f64 {
    match hours {
        None => 0.0,
        Some(h) if h < 2.0 => 0.8,
        Some(h) if h < 24.0 => 0.6,
        Some(h) if h < 72.0 => 0.4,
        Some(_) => 0.2,
    }
}

fn deal_potential(contact: &Contact, title: f64) -> f64 {
    let industry = match &contact.industry {
        Some(i) if HIGH_VALUE_INDUSTRIES
            .iter()
            .any(|h| i.value.to_lowercase().contains(h)) =>
        {
            0.8
        }
        _ => 0.5,
    };

    let size = match contact.company_name().map(str::to_lowercase) {
        Some(name) if has_any_term(&name, &["microsoft", "google", "amazon", "apple"]) => 0.9,
        Some(name) if has_any_term(&name, &["startup", "solutions", "technologies"]) => 0.7,
        Some(name) if has_any_term(&name, &["consulting", "services", "group"]) => 0.6,
        _ => 0.5,
    };

    let history = match contact.counters.frequency {
        f if f > 10 => 0.8,
        f if f > 5 => 0.6,
        f if f > 1 => 0.4,
        _ => 0.2,
    };

    (industry + size + title + history) / 4.0
}

fn relationship_strength(contact: &Contact, now: DateTime<Utc>) -> f64 {
    if contact.counters.frequency == 0 {
        return 0.0;
    }
    let recency_bonus = match days_since_last(contact, now) {
        Some(d) if d <= 7 => 0.2,
        Some(d) if d <= 30 => 0.15,
        Some(d) if d <= 90 => 0.1,
        _ => 0.05,
    };
    contact.interaction_strength() + recency_bonus
}

fn communication_patterns(contact: &Contact, response_hours: Option<f64>) -> CommunicationPatterns {
    let mut patterns = CommunicationPatterns {
        average_response_hours: response_hours,
        ..Default::default()
    };
    if contact.interactions.is_empty() {
        return patterns;
    }

    let ordered = chronological(&contact.interactions);
    let polarities: Vec<f64> = ordered
        .iter()
        .filter_map(|i| {
            let annotation = i
                .sentiment
                .clone()
                .unwrap_or_else(|| sentiment::keyword_sentiment(&i.subject, &i.excerpt));
            (annotation.label != SentimentLabel::Neutral).then(|| annotation.polarity())
        })
        .collect();

    if !polarities.is_empty() {
        patterns.average_sentiment = mean(&polarities);
        if polarities.len() >= 4 {
            let split = polarities.len() - 2;
            let recent = mean(&polarities[split..]);
            let older = mean(&polarities[..split]);
            patterns.sentiment_trend = if recent > older + 0.1 {
                SentimentTrend::Improving
            } else if recent < older - 0.1 {
                SentimentTrend::Declining
            } else {
                SentimentTrend::Stable
            };
        }
    }

    let mut hours = [0usize; 24];
    for interaction in &contact.interactions {
        hours[interaction.timestamp.hour() as usize] += 1;
    }
    // Earliest hour wins a tie.
    let best = (0..24).fold(0usize, |best, h| if hours[h] > hours[best] { h } else { best });
    patterns.best_contact_time = Some(match best {
        6..=11 => ContactWindow::Morning,
        12..=16 => ContactWindow::Afternoon,
        17..=19 => ContactWindow::Evening,
        _ => ContactWindow::OffHours,
    });

    let c = &contact.counters;
    let frequency = c.frequency as f64;
    patterns.preferred_channel = if c.meetings as f64 > frequency * 0.3 {
        Channel::Meetings
    } else if c.calls as f64 > frequency * 0.2 {
        Channel::Calls
    } else {
        Channel::Email
    };

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        EnrichmentData, EnrichmentSource, SentimentAnnotation, SentimentOrigin, SocialProfile,
    };
    use chrono::Duration;

    fn contact(email: &str, sent: u64, received: u64, frequency: u64) -> Contact {
        let mut c = Contact::new(email);
        c.counters.sent = sent;
        c.counters.received = received;
        c.counters.frequency = frequency;
        c.last_seen = Some(Utc::now());
        c
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(ScoringWeights::default(), false)
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((ScoringWeights::default().total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let c = contact("dana@example.org", 5, 5, 10);
        let now = Utc::now();
        let a = engine().score_at(&c, now);
        let b = engine().score_at(&c, now);

        assert_eq!(a.mode, ScoringMode::Fallback);
        assert_eq!(a, b);
        assert_eq!(a.factors.len(), ScoreFactor::FALLBACK.len());
    }

    #[test]
    fn test_fallback_weights_renormalized() {
        let w = ScoringWeights::default().renormalized(&ScoreFactor::FALLBACK);
        let sum: f64 = w.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        // 0.20 / 0.70
        assert!((w[&ScoreFactor::InteractionFrequency] - 0.2 / 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights_fall_back_to_equal_shares() {
        let zero = ScoringWeights {
            interaction_frequency: 0.0,
            response_rate: 0.0,
            recency: 0.0,
            sentiment: 0.0,
            company_importance: 0.0,
            title_seniority: 0.0,
            social_influence: 0.0,
            network_quality: 0.0,
            content_engagement: 0.0,
            meeting_engagement: 0.0,
        };
        let w = zero.renormalized(&ScoreFactor::FALLBACK);
        assert!(w.values().all(|v| (v - 0.2).abs() < 1e-9));
    }

    #[test]
    fn test_company_default_pattern_for_business_domain() {
        let c = contact("alice@acme.com", 3, 4, 7);
        let score = engine().score(&c);
        assert!((score.factor(ScoreFactor::CompanyImportance) - 0.5).abs() < 1e-9);

        let personal = contact("someone@gmail.com", 1, 1, 2);
        let score = engine().score(&personal);
        assert!((score.factor(ScoreFactor::CompanyImportance) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_company_tiers_and_bonus() {
        let mut c = contact("x@google.com", 1, 1, 2);
        c.apply_enrichment(
            &EnrichmentData {
                company: Some("Google".into()),
                ..Default::default()
            },
            0.9,
            EnrichmentSource::Clearbit,
        );
        assert_eq!(company_score(&c).unwrap(), 0.95);

        let mut c = contact("x@acme.io", 1, 1, 2);
        c.apply_enrichment(
            &EnrichmentData {
                company: Some("Acme".into()),
                industry: Some("Technology".into()),
                ..Default::default()
            },
            0.9,
            EnrichmentSource::Clearbit,
        );
        c.extras.insert("company_size".into(), serde_json::json!("1001-5000"));
        assert!((company_score(&c).unwrap() - 0.6).abs() < 1e-9);

        // "meta" must not match inside another word
        let mut c = contact("x@metadata.io", 1, 1, 2);
        c.apply_enrichment(
            &EnrichmentData {
                company: Some("Metadata Labs".into()),
                ..Default::default()
            },
            0.9,
            EnrichmentSource::Clearbit,
        );
        assert_eq!(company_score(&c).unwrap(), DEFAULT_COMPANY_SCORE);
    }

    #[test]
    fn test_title_longest_keyword_first() {
        let with_title = |title: &str| {
            let mut c = contact("x@acme.com", 1, 1, 2);
            c.apply_enrichment(
                &EnrichmentData {
                    job_title: Some(title.into()),
                    ..Default::default()
                },
                0.9,
                EnrichmentSource::Clearbit,
            );
            title_score(&c).unwrap()
        };

        assert_eq!(with_title("Senior Manager, Sales"), 0.65);
        assert_eq!(with_title("Co-Founder"), 0.95);
        assert_eq!(with_title("Director of Product"), 0.75);
        assert_eq!(with_title("Barista"), UNKNOWN_TITLE_SCORE);
        assert_eq!(title_score(&contact("x@acme.com", 0, 0, 0)).unwrap(), UNKNOWN_TITLE_SCORE);
    }

    #[test]
    fn test_recency_steps() {
        let now = Utc::now();
        let mut c = contact("x@acme.com", 1, 1, 2);
        for (days, expected) in [(0, 1.0), (5, 0.9), (20, 0.7), (60, 0.5), (120, 0.3), (400, 0.1)] {
            c.last_seen = Some(now - Duration::days(days));
            assert_eq!(recency_score(&c, now).unwrap(), expected, "{} days", days);
        }
    }

    #[test]
    fn test_missing_last_seen_counts_as_zero() {
        let mut c = contact("x@acme.com", 1, 1, 2);
        c.last_seen = None;
        let score = engine().score(&c);
        assert_eq!(score.factor(ScoreFactor::Recency), 0.0);
    }

    #[test]
    fn test_guard_zeroes_non_finite() {
        assert_eq!(guarded("x", ScoreFactor::Sentiment, || Ok(f64::NAN)), 0.0);
        assert_eq!(
            guarded("x", ScoreFactor::Sentiment, || Err(AppError::Internal("boom".into()))),
            0.0
        );
        assert_eq!(guarded("x", ScoreFactor::Sentiment, || Ok(1.7)), 1.0);
    }

    #[test]
    fn test_response_rate_neutral_without_outbound() {
        let c = contact("x@acme.com", 0, 4, 4);
        assert_eq!(response_score(&c).unwrap(), 0.5);
    }

    #[test]
    fn test_social_factors_zero_without_profiles() {
        let c = contact("x@acme.com", 1, 1, 2);
        assert_eq!(social_influence_score(&c).unwrap(), 0.0);
        assert_eq!(network_quality_score(&c).unwrap(), 0.0);
        assert_eq!(content_engagement_score(&c).unwrap(), 0.0);
    }

    #[test]
    fn test_enriched_contact_uses_full_mode() {
        let mut c = contact("x@acme.com", 4, 4, 8);
        let mut linkedin = SocialProfile::new("LinkedIn");
        linkedin.connections = Some(800);
        c.apply_enrichment(
            &EnrichmentData {
                social_profiles: vec![linkedin],
                ..Default::default()
            },
            0.85,
            EnrichmentSource::PeopleDataLabs,
        );

        let score = engine().score(&c);
        assert_eq!(score.mode, ScoringMode::Full);
        assert_eq!(score.factors.len(), ScoreFactor::ALL.len());
        assert!((score.factor(ScoreFactor::NetworkQuality) - 0.5).abs() < 1e-9);
        assert!(score.factor(ScoreFactor::SocialInfluence) > 0.0);
    }

    fn ai_annotated(mut c: Contact) -> Contact {
        let mut interaction =
            Interaction::new(Direction::Received, Utc::now(), "Re: offer", "Sounds good");
        interaction.sentiment = Some(SentimentAnnotation {
            label: SentimentLabel::Positive,
            score: 0.9,
            origin: SentimentOrigin::Ai,
        });
        c.interactions.push(interaction);
        c
    }

    #[test]
    fn test_ai_switch_alone_keeps_fallback() {
        let c = contact("x@acme.com", 3, 3, 6);
        let ai = ScoringEngine::new(ScoringWeights::default(), true);
        assert_eq!(ai.mode_for(&c), ScoringMode::Fallback);
        assert_eq!(ai.score(&c).factors.len(), ScoreFactor::FALLBACK.len());
    }

    #[test]
    fn test_ai_sentiment_selects_full_mode_when_enabled() {
        let c = ai_annotated(contact("x@acme.com", 3, 3, 6));
        let ai = ScoringEngine::new(ScoringWeights::default(), true);
        assert_eq!(ai.mode_for(&c), ScoringMode::Full);
        assert_eq!(engine().mode_for(&c), ScoringMode::Fallback);
    }

    #[test]
    fn test_provider_hints_alone_keep_fallback() {
        let mut c = contact("x@acme.com", 3, 3, 6);
        c.apply_enrichment(
            &EnrichmentData {
                company: Some("Acme".into()),
                job_title: Some("CTO".into()),
                ..Default::default()
            },
            0.4,
            EnrichmentSource::ProviderHint,
        );
        assert!(c.is_enriched());
        assert_eq!(engine().mode_for(&c), ScoringMode::Fallback);
    }

    #[test]
    fn test_free_mail_marker_keeps_fallback() {
        let mut c = contact("x@gmail.com", 3, 3, 6);
        let mut data = EnrichmentData::default();
        data.extras.insert("email_type".into(), serde_json::json!("personal"));
        c.apply_enrichment(&data, 0.3, EnrichmentSource::DomainInference);
        assert!(c.is_enriched());
        assert_eq!(engine().mode_for(&c), ScoringMode::Fallback);
    }

    #[test]
    fn test_company_from_paid_source_selects_full_mode() {
        let mut c = contact("x@acme.com", 3, 3, 6);
        c.apply_enrichment(
            &EnrichmentData {
                company: Some("Acme".into()),
                ..Default::default()
            },
            0.9,
            EnrichmentSource::Clearbit,
        );
        assert_eq!(engine().mode_for(&c), ScoringMode::Full);
    }

    #[test]
    fn test_rank_orders_by_overall_then_email() {
        let strong = contact("b@acme.com", 10, 10, 25);
        let twin = contact("a@acme.com", 10, 10, 25);
        let weak = contact("c@acme.com", 1, 0, 1);

        let ranked = engine().rank(vec![weak, strong, twin], RankKey::Overall);
        let order: Vec<&str> = ranked.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(order, vec!["a@acme.com", "b@acme.com", "c@acme.com"]);
        assert!(ranked.iter().all(|c| c.score.is_some()));
    }

    #[test]
    fn test_insights_distribution() {
        let mut contacts = vec![
            contact("a@acme.com", 10, 10, 25),
            contact("b@gmail.com", 1, 0, 1),
        ];
        engine().score_all(&mut contacts);
        let insights = engine().insights(&contacts);
        assert_eq!(insights.total_contacts, 2);
        assert_eq!(
            insights.distribution.high + insights.distribution.medium + insights.distribution.low,
            2
        );
        assert_eq!(insights.fallback_contacts, 2);
    }

    #[test]
    fn test_best_contact_time_and_channel() {
        let mut c = contact("x@acme.com", 2, 2, 4);
        c.counters.meetings = 3;
        let base = Utc::now()
            .date_naive()
            .and_hms_opt(9, 30, 0)
            .map(|t| t.and_utc())
            .unwrap();
        for i in 0..3 {
            c.interactions.push(Interaction::new(
                Direction::Received,
                base - Duration::days(i),
                "Thanks",
                "great",
            ));
        }
        let patterns = communication_patterns(&c, None);
        assert_eq!(patterns.best_contact_time, Some(ContactWindow::Morning));
        assert_eq!(patterns.preferred_channel, Channel::Meetings);
        assert!(patterns.average_sentiment > 0.0);
    }

    #[test]
    fn test_derived_response_hours() {
        let mut c = contact("x@acme.com", 1, 1, 2);
        let t0 = Utc::now() - Duration::hours(10);
        c.interactions.push(Interaction::new(Direction::Sent, t0, "Q", ""));
        c.interactions
            .push(Interaction::new(Direction::Received, t0 + Duration::hours(3), "A", ""));
        assert_eq!(average_response_hours(&c), Some(3.0));
        assert_eq!(responsiveness(Some(3.0)), 0.6);
    }
}
