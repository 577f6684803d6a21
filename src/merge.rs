//! Cross-provider contact merge.
//!
//! Reduces per-provider contact lists into one canonical [`Contact`] per
//! normalized email. Counters are summed because providers observe disjoint
//! interaction sets.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Contact, EnrichmentSource, RawContact};
use crate::validation::{is_valid_email, normalize_email};

/// Confidence assumed for provider hints that do not state one.
const DEFAULT_HINT_CONFIDENCE: f64 = 0.2;

/// Tallies of what the merge saw and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeDiagnostics {
    pub providers: usize,
    pub records_seen: usize,
    pub missing_email: usize,
    pub invalid_email: usize,
    pub duplicates_folded: usize,
    pub contacts: usize,
}

impl MergeDiagnostics {
    pub fn dropped(&self) -> usize {
        self.missing_email + self.invalid_email
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub contacts: Vec<Contact>,
    pub diagnostics: MergeDiagnostics,
}

/// Merges provider contact lists into canonical contacts.
///
/// Providers are visited in key order so that "first seen" tie-breaks are
/// deterministic. Records with a missing or malformed email are dropped and
/// counted; nothing here fails the whole merge.
pub fn merge(provider_contacts: &BTreeMap<String, Vec<RawContact>>) -> MergeReport {
    let mut diagnostics = MergeDiagnostics {
        providers: provider_contacts.len(),
        ..Default::default()
    };
    let mut canonical: BTreeMap<String, Contact> = BTreeMap::new();

    for (provider, records) in provider_contacts {
        for raw in records {
            diagnostics.records_seen += 1;

            let Some(email) = raw.email.as_deref().and_then(normalize_email) else {
                diagnostics.missing_email += 1;
                continue;
            };
            if !is_valid_email(&email) {
                tracing::debug!("Dropping record from {} with malformed email", provider);
                diagnostics.invalid_email += 1;
                continue;
            }

            if canonical.contains_key(&email) {
                diagnostics.duplicates_folded += 1;
            }
            let contact = canonical
                .entry(email.clone())
                .or_insert_with(|| Contact::new(email));

            fold_raw(contact, provider, raw);
        }
    }

    let mut contacts: Vec<Contact> = canonical
        .into_values()
        .map(|mut c| {
            c.interactions.sort_by_key(|i| i.timestamp);
            c
        })
        .collect();
    sort_by_strength(&mut contacts);

    diagnostics.contacts = contacts.len();
    tracing::info!(
        "Merged {} records from {} providers into {} contacts ({} dropped, {} duplicates folded)",
        diagnostics.records_seen,
        diagnostics.providers,
        diagnostics.contacts,
        diagnostics.dropped(),
        diagnostics.duplicates_folded
    );

    MergeReport {
        contacts,
        diagnostics,
    }
}

fn fold_raw(contact: &mut Contact, provider: &str, raw: &RawContact) {
    let counters = raw.counters();
    contact.counters.add(&counters);
    contact.accounts.insert(provider.to_string());
    contact
        .account_stats
        .entry(provider.to_string())
        .or_default()
        .add(&counters);

    if let Some(name) = raw.name.as_deref() {
        contact.offer_name(name);
    }

    let observed = raw
        .interactions
        .iter()
        .map(|i| i.timestamp)
        .chain(raw.first_seen)
        .chain(raw.last_seen);
    for ts in observed {
        contact.first_seen = Some(contact.first_seen.map_or(ts, |cur| cur.min(ts)));
        contact.last_seen = Some(contact.last_seen.map_or(ts, |cur| cur.max(ts)));
    }

    contact.interactions.extend(raw.interactions.iter().cloned().map(|mut i| {
        if i.account.is_none() {
            i.account = Some(provider.to_string());
        }
        i
    }));

    if let Some(hints) = &raw.hints {
        let confidence = raw
            .hint_confidence
            .unwrap_or(DEFAULT_HINT_CONFIDENCE)
            .clamp(0.0, 1.0);
        contact.apply_enrichment(hints, confidence, EnrichmentSource::ProviderHint);
    }
}

/// Strongest relationships first; equal strength falls back to email order.
pub fn sort_by_strength(contacts: &mut [Contact]) {
    contacts.sort_by(|a, b| {
        b.interaction_strength()
            .total_cmp(&a.interaction_strength())
            .then_with(|| a.email.cmp(&b.email))
    });
}
