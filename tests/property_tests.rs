/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use chrono::{Duration, TimeZone, Utc};
use contact_intel::merge::merge;
use contact_intel::models::{Contact, RawContact, ScoreFactor};
use contact_intel::scoring::{ScoringEngine, ScoringWeights};
use contact_intel::validation::{is_valid_email, normalize_email, normalize_phone};
use proptest::prelude::*;
use std::collections::BTreeMap;

// Property: validation should never panic
proptest! {
    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = normalize_email(&email).map(|e| is_valid_email(&e));
    }

    #[test]
    fn phone_normalization_never_panics(phone in "\\PC*") {
        let _ = normalize_phone(&phone);
    }

    #[test]
    fn normalized_phones_are_e164(number in 2002000000u64..=9899999999u64) {
        if let Some(normalized) = normalize_phone(&number.to_string()) {
            prop_assert!(normalized.starts_with('+'));
            prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }
}

fn raw_record() -> impl Strategy<Value = RawContact> {
    (
        prop::sample::select(vec!["ann", "ben", "cy", "dee"]),
        prop::sample::select(vec!["acme.com", "initech.com"]),
        prop::bool::ANY,
        0u64..50,
        0u64..50,
        0u64..10,
        0u64..10,
    )
        .prop_map(|(local, domain, upper, sent, received, cc, meetings)| {
            let email = format!("{}@{}", local, domain);
            RawContact {
                email: Some(if upper { email.to_uppercase() } else { email }),
                sent,
                received,
                cc,
                meetings,
                ..Default::default()
            }
        })
}

// Property: merged counters are the sum of what the providers reported
proptest! {
    #[test]
    fn merged_counters_are_additive(
        a in prop::collection::vec(raw_record(), 0..8),
        b in prop::collection::vec(raw_record(), 0..8),
    ) {
        let input = BTreeMap::from([("a".to_string(), a), ("b".to_string(), b)]);
        let report = merge(&input);

        let mut expected: BTreeMap<String, (u64, u64, u64)> = BTreeMap::new();
        for raw in input.values().flatten() {
            let email = normalize_email(raw.email.as_deref().unwrap_or_default()).unwrap();
            let entry = expected.entry(email).or_default();
            entry.0 += raw.sent;
            entry.1 += raw.received;
            entry.2 += raw.counters().frequency;
        }

        prop_assert_eq!(report.contacts.len(), expected.len());
        for contact in &report.contacts {
            let (sent, received, frequency) = expected[&contact.email];
            prop_assert_eq!(contact.counters.sent, sent);
            prop_assert_eq!(contact.counters.received, received);
            prop_assert_eq!(contact.counters.frequency, frequency);
        }
    }

    #[test]
    fn merge_is_idempotent(records in prop::collection::vec(raw_record(), 0..12)) {
        let input = BTreeMap::from([("gmail".to_string(), records)]);
        let first = merge(&input);
        let second = merge(&input);

        let emails = |r: &contact_intel::merge::MergeReport| {
            r.contacts.iter().map(|c| (c.email.clone(), c.counters)).collect::<Vec<_>>()
        };
        prop_assert_eq!(emails(&first), emails(&second));
    }
}

fn weights() -> impl Strategy<Value = ScoringWeights> {
    prop::collection::vec(0.0f64..1.0, 10).prop_map(|w| ScoringWeights {
        interaction_frequency: w[0],
        response_rate: w[1],
        recency: w[2],
        sentiment: w[3],
        company_importance: w[4],
        title_seniority: w[5],
        social_influence: w[6],
        network_quality: w[7],
        content_engagement: w[8],
        meeting_engagement: w[9],
    })
}

// Property: every score stays within [0, 1]
proptest! {
    #[test]
    fn scores_are_bounded(
        weights in weights(),
        ai in prop::bool::ANY,
        sent in 0u64..10_000,
        received in 0u64..10_000,
        meetings in 0u64..500,
        calls in 0u64..500,
        days_ago in 0i64..2000,
    ) {
        let mut contact = Contact::new("pat@globex.com");
        contact.counters.sent = sent;
        contact.counters.received = received;
        contact.counters.meetings = meetings;
        contact.counters.calls = calls;
        contact.counters.frequency = sent + received + meetings + calls;
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        contact.last_seen = Some(now - Duration::days(days_ago));

        let score = ScoringEngine::new(weights, ai).score_at(&contact, now);

        prop_assert!((0.0..=1.0).contains(&score.overall));
        for factor in ScoreFactor::ALL {
            prop_assert!((0.0..=1.0).contains(&score.factor(factor)));
        }
        for value in [
            score.engagement,
            score.influence,
            score.deal_potential,
            score.response_likelihood,
            score.relationship_strength,
            score.importance,
        ] {
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }
}

// Property: counters near the top of the range never overflow
proptest! {
    #[test]
    fn counters_saturate_near_u64_max(
        sent in (u64::MAX - 1000)..=u64::MAX,
        cc in (u64::MAX - 1000)..=u64::MAX,
        meetings in (u64::MAX - 1000)..=u64::MAX,
        calls in (u64::MAX - 1000)..=u64::MAX,
    ) {
        let record = RawContact {
            email: Some("max@acme.com".to_string()),
            sent,
            cc,
            meetings,
            calls,
            ..Default::default()
        };
        prop_assert_eq!(record.counters().frequency, u64::MAX);

        let input = BTreeMap::from([
            ("a".to_string(), vec![record.clone()]),
            ("b".to_string(), vec![record]),
        ]);
        let report = merge(&input);
        let contact = &report.contacts[0];
        prop_assert_eq!(contact.counters.sent, u64::MAX);
        prop_assert_eq!(contact.counters.calls, u64::MAX);

        let score = ScoringEngine::new(ScoringWeights::default(), false).score(contact);
        prop_assert!((0.0..=1.0).contains(&score.overall));
    }
}
