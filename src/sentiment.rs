//! Keyword sentiment for interactions that carry no AI annotation.

use crate::models::{Interaction, SentimentAnnotation, SentimentLabel, SentimentOrigin};
use crate::sources::heuristics::has_term;

const POSITIVE_TERMS: &[&str] = &[
    "thanks",
    "thank you",
    "great",
    "excellent",
    "appreciate",
    "happy",
    "pleased",
    "love",
    "awesome",
    "congrats",
    "congratulations",
    "perfect",
    "glad",
    "excited",
    "wonderful",
    "looking forward",
];

const NEGATIVE_TERMS: &[&str] = &[
    "unfortunately",
    "problem",
    "issue",
    "disappointed",
    "sorry",
    "delay",
    "cancel",
    "complaint",
    "frustrated",
    "urgent",
    "concern",
    "failed",
    "refund",
    "not happy",
    "unacceptable",
];

/// Scores subject and excerpt by keyword hits. Neutral when nothing matches
/// or both sides tie.
pub fn keyword_sentiment(subject: &str, excerpt: &str) -> SentimentAnnotation {
    let text = format!("{} {}", subject, excerpt).to_lowercase();
    let positive = POSITIVE_TERMS.iter().filter(|t| has_term(&text, t)).count();
    let negative = NEGATIVE_TERMS.iter().filter(|t| has_term(&text, t)).count();

    let (label, hits, other) = match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => (SentimentLabel::Positive, positive, negative),
        std::cmp::Ordering::Less => (SentimentLabel::Negative, negative, positive),
        std::cmp::Ordering::Equal => {
            return SentimentAnnotation {
                label: SentimentLabel::Neutral,
                score: 0.0,
                origin: SentimentOrigin::Keyword,
            }
        }
    };

    // One net hit is a weak signal; three or more saturate.
    let net = (hits - other) as f64;
    SentimentAnnotation {
        label,
        score: (0.4 + 0.2 * (net - 1.0)).min(0.8),
        origin: SentimentOrigin::Keyword,
    }
}

/// Signed polarity of an interaction, using its annotation when present.
pub fn polarity(interaction: &Interaction) -> f64 {
    match &interaction.sentiment {
        Some(annotation) => annotation.polarity(),
        None => keyword_sentiment(&interaction.subject, &interaction.excerpt).polarity(),
    }
}

/// Fills in keyword annotations where none exist. Returns how many were added.
pub fn annotate_missing(interactions: &mut [Interaction]) -> usize {
    let mut added = 0;
    for interaction in interactions.iter_mut().filter(|i| i.sentiment.is_none()) {
        let annotation = keyword_sentiment(&interaction.subject, &interaction.excerpt);
        interaction.annotate(annotation);
        added += 1;
    }
    added
}
