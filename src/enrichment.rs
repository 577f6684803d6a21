/// Enrichment orchestration
///
/// Walks every canonical contact through the enrichment waterfall:
/// 1. Check the cache for each registered source (first hit wins)
/// 2. On a miss, call enabled adapters in priority order
/// 3. Skip paid adapters that would break the run budget or the per-contact cap
/// 4. Stop at the first adapter that returns data, cache it and bill it
///
/// Contacts are processed in fixed-size cooperative batches.
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::{CachedEnrichment, EnrichmentCache};
use crate::circuit_breaker::SourceBreakers;
use crate::config::OrchestratorSettings;
use crate::models::{Contact, EnrichmentSource};
use crate::sources::{EnrichmentTarget, SourceAdapter};

/// Tolerance for floating point drift in cost sums.
const COST_EPSILON: f64 = 1e-9;

/// Per-source counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceStats {
    pub attempts: u64,
    pub successes: u64,
    pub no_data: u64,
    pub rate_limited: u64,
    pub auth_failures: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub skipped_budget: u64,
    pub skipped_rate: u64,
    pub skipped_circuit: u64,
    pub cache_hits: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentSummary {
    pub run_id: Uuid,
    pub contacts: usize,
    pub enriched: usize,
    pub unenriched: usize,
    pub cache_hits: u64,
    pub api_calls: u64,
    pub total_cost: f64,
    pub budget: f64,
    pub budget_remaining: f64,
    pub elapsed_ms: u64,
    pub sources: BTreeMap<EnrichmentSource, SourceStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentOutcome {
    pub contacts: Vec<Contact>,
    pub summary: EnrichmentSummary,
}

/// Money committed for the run. A paid call reserves its cost before it is
/// made and either settles or refunds it afterwards, so `spent + reserved`
/// never passes `budget`.
#[derive(Debug)]
struct BudgetLedger {
    budget: f64,
    spent: f64,
    reserved: f64,
}

impl BudgetLedger {
    fn new(budget: f64) -> Self {
        Self {
            budget,
            spent: 0.0,
            reserved: 0.0,
        }
    }

    fn reserve(&mut self, cost: f64) -> bool {
        if self.spent + self.reserved + cost > self.budget + COST_EPSILON {
            return false;
        }
        self.reserved += cost;
        true
    }

    fn settle(&mut self, cost: f64) {
        self.reserved = (self.reserved - cost).max(0.0);
        self.spent += cost;
    }

    fn refund(&mut self, cost: f64) {
        self.reserved = (self.reserved - cost).max(0.0);
    }
}

/// Shared state for one `enrich_all` call.
struct RunState {
    ledger: Mutex<BudgetLedger>,
    stats: Mutex<BTreeMap<EnrichmentSource, SourceStats>>,
    disabled: Mutex<HashSet<EnrichmentSource>>,
}

impl RunState {
    fn new(budget: f64) -> Self {
        Self {
            ledger: Mutex::new(BudgetLedger::new(budget)),
            stats: Mutex::new(BTreeMap::new()),
            disabled: Mutex::new(HashSet::new()),
        }
    }

    async fn record(&self, source: EnrichmentSource, update: impl FnOnce(&mut SourceStats)) {
        let mut stats = self.stats.lock().await;
        update(stats.entry(source).or_default());
    }

    async fn is_disabled(&self, source: EnrichmentSource) -> bool {
        self.disabled.lock().await.contains(&source)
    }

    /// Returns true only for the call that actually disabled the source.
    async fn disable(&self, source: EnrichmentSource) -> bool {
        self.disabled.lock().await.insert(source)
    }

    async fn release(&self, cost: f64, paid: bool) {
        if paid {
            self.ledger.lock().await.refund(cost);
        }
    }

    async fn settle(&self, cost: f64, paid: bool) {
        if paid {
            self.ledger.lock().await.settle(cost);
        }
    }
}

/// What happened to a single contact.
struct ContactOutcome {
    contact: Contact,
    enriched: bool,
    api_calls: u64,
}

#[derive(Clone)]
pub struct EnrichmentOrchestrator {
    registry: Vec<Arc<dyn SourceAdapter>>,
    cache: EnrichmentCache,
    settings: OrchestratorSettings,
    breakers: SourceBreakers,
}

impl EnrichmentOrchestrator {
    pub fn new(
        registry: Vec<Arc<dyn SourceAdapter>>,
        cache: EnrichmentCache,
        settings: OrchestratorSettings,
    ) -> Self {
        let breakers = SourceBreakers::new(registry.iter().map(|a| a.source()));
        Self {
            registry,
            cache,
            settings,
            breakers,
        }
    }

    pub fn cache(&self) -> &EnrichmentCache {
        &self.cache
    }

    pub fn registry(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.registry
    }

    /// Enriches every contact. Never fails: per-contact and per-adapter
    /// problems are logged and counted in the summary.
    pub async fn enrich_all(&self, contacts: Vec<Contact>) -> EnrichmentOutcome {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("enrichment_run", run_id = %run_id);
        self.run(run_id, contacts).instrument(span).await
    }

    async fn run(&self, run_id: Uuid, contacts: Vec<Contact>) -> EnrichmentOutcome {
        let start = Instant::now();
        let total = contacts.len();
        let batch_size = self.settings.max_concurrent_enrichments.max(1);
        let run = RunState::new(self.settings.daily_budget);

        tracing::info!(
            "Starting enrichment of {} contacts (batch size {}, budget ${:.2})",
            total,
            batch_size,
            self.settings.daily_budget
        );

        let mut done: Vec<ContactOutcome> = Vec::with_capacity(total);
        let mut pending = contacts.into_iter();
        let mut batch_no = 0;
        loop {
            let batch: Vec<Contact> = pending.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            batch_no += 1;
            tracing::debug!("Batch {}: {} contacts", batch_no, batch.len());

            let results = join_all(batch.into_iter().map(|c| self.enrich_one(c, &run))).await;
            done.extend(results);

            if pending.len() > 0 && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        let sources = run.stats.into_inner();
        let ledger = run.ledger.into_inner();
        let enriched = done.iter().filter(|o| o.enriched).count();
        let api_calls = done.iter().map(|o| o.api_calls).sum();
        let cache_hits = sources.values().map(|s| s.cache_hits).sum();

        let summary = EnrichmentSummary {
            run_id,
            contacts: total,
            enriched,
            unenriched: total - enriched,
            cache_hits,
            api_calls,
            total_cost: ledger.spent,
            budget: ledger.budget,
            budget_remaining: (ledger.budget - ledger.spent).max(0.0),
            elapsed_ms: start.elapsed().as_millis() as u64,
            sources,
        };

        tracing::info!(
            "Enrichment finished: {}/{} enriched, {} cache hits, {} API calls, ${:.2} spent in {}ms",
            summary.enriched,
            summary.contacts,
            summary.cache_hits,
            summary.api_calls,
            summary.total_cost,
            summary.elapsed_ms
        );

        EnrichmentOutcome {
            contacts: done.into_iter().map(|o| o.contact).collect(),
            summary,
        }
    }

    async fn enrich_one(&self, mut contact: Contact, run: &RunState) -> ContactOutcome {
        if self.apply_cached(&mut contact, run).await {
            return ContactOutcome {
                contact,
                enriched: true,
                api_calls: 0,
            };
        }

        let target = EnrichmentTarget::from_contact(&contact);
        let mut contact_cost = 0.0;
        let mut api_calls = 0u64;
        let mut enriched = false;

        for adapter in &self.registry {
            let source = adapter.source();
            if !adapter.is_enabled() || run.is_disabled(source).await {
                continue;
            }
            if !self.breakers.permits(source) {
                tracing::debug!("{}: circuit open for {}, skipping", contact.email, source);
                run.record(source, |s| s.skipped_circuit += 1).await;
                continue;
            }

            let cost = adapter.cost_per_request();
            let paid = adapter.is_paid();
            if paid {
                if contact_cost + cost > self.settings.max_cost_per_contact + COST_EPSILON {
                    tracing::debug!(
                        "{}: {} would exceed the per-contact cap (${:.2})",
                        contact.email,
                        source,
                        self.settings.max_cost_per_contact
                    );
                    run.record(source, |s| s.skipped_budget += 1).await;
                    continue;
                }
                if !run.ledger.lock().await.reserve(cost) {
                    tracing::debug!("{}: budget exhausted, skipping {}", contact.email, source);
                    run.record(source, |s| s.skipped_budget += 1).await;
                    continue;
                }
            }

            if let Err(e) = adapter.try_acquire() {
                run.release(cost, paid).await;
                tracing::debug!("{}: {} skipped: {}", contact.email, source, e);
                run.record(source, |s| s.skipped_rate += 1).await;
                continue;
            }

            run.record(source, |s| s.attempts += 1).await;
            tracing::debug!("{}: trying {}", contact.email, source);
            adapter.pace().await;

            match tokio::time::timeout(adapter.timeout(), adapter.enrich(&target)).await {
                Ok(Ok(result)) => {
                    run.settle(cost, paid).await;
                    self.breakers.record_success(source);

                    let billed = if paid { cost } else { 0.0 };
                    contact_cost += billed;
                    api_calls += u64::from(result.api_calls_used);
                    contact.enrichment.total_cost += billed;
                    contact.enrichment.api_calls += result.api_calls_used;
                    run.record(source, |s| s.cost += billed).await;

                    if result.success && !result.data.is_empty() {
                        contact.apply_enrichment(&result.data, result.confidence, source);
                        contact.enrichment.sources.insert(source);
                        contact.enrichment.last_enriched = Some(Utc::now());
                        self.cache
                            .set(
                                &contact.email,
                                source,
                                CachedEnrichment {
                                    data: result.data,
                                    confidence: result.confidence,
                                },
                            )
                            .await;
                        run.record(source, |s| s.successes += 1).await;
                        tracing::debug!("✓ {} enriched via {}", contact.email, source);
                        enriched = true;
                        break;
                    }

                    run.record(source, |s| s.no_data += 1).await;
                }
                Ok(Err(e)) if e.is_rate_limited() => {
                    run.release(cost, paid).await;
                    tracing::warn!("{} rate limited upstream: {}", source, e);
                    run.record(source, |s| s.rate_limited += 1).await;
                }
                Ok(Err(e)) if e.is_authentication() => {
                    run.release(cost, paid).await;
                    run.record(source, |s| s.auth_failures += 1).await;
                    if run.disable(source).await {
                        tracing::error!(
                            "✗ {} authentication failed, disabled for the rest of this run: {}",
                            source,
                            e
                        );
                    }
                }
                Ok(Err(e)) if e.is_timeout() => {
                    run.release(cost, paid).await;
                    self.breakers.record_failure(source);
                    tracing::warn!("{} timed out for {}: {}", source, contact.email, e);
                    run.record(source, |s| s.timeouts += 1).await;
                }
                Ok(Err(e)) => {
                    run.release(cost, paid).await;
                    self.breakers.record_failure(source);
                    tracing::warn!("{} failed for {}: {}", source, contact.email, e);
                    run.record(source, |s| s.errors += 1).await;
                }
                Err(_) => {
                    run.release(cost, paid).await;
                    self.breakers.record_failure(source);
                    tracing::warn!(
                        "{} timed out after {:?} for {}",
                        source,
                        adapter.timeout(),
                        contact.email
                    );
                    run.record(source, |s| s.timeouts += 1).await;
                }
            }
        }

        if !enriched {
            tracing::debug!("{}: no source returned data", contact.email);
        }

        ContactOutcome {
            contact,
            enriched,
            api_calls,
        }
    }

    /// First cached payload across registered sources, in priority order.
    async fn apply_cached(&self, contact: &mut Contact, run: &RunState) -> bool {
        for adapter in &self.registry {
            let source = adapter.source();
            let Some(hit) = self.cache.get(&contact.email, source).await else {
                continue;
            };

            contact.apply_enrichment(&hit.data, hit.confidence, source);
            contact.enrichment.sources.insert(source);
            contact.enrichment.from_cache = true;
            contact.enrichment.last_enriched = Some(Utc::now());
            run.record(source, |s| s.cache_hits += 1).await;
            tracing::debug!("{}: cache hit for {}", contact.email, source);
            return true;
        }
        false
    }
}
