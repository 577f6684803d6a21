use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::enrichment::{EnrichmentOrchestrator, EnrichmentSummary};
use crate::merge::{merge, MergeDiagnostics};
use crate::models::{Contact, RawContact};
use crate::scoring::{RankKey, ScoringEngine, ScoringInsights};
use crate::sentiment;

/// Per-request knobs for a pipeline run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineOptions {
    /// Merge and score only.
    #[serde(default)]
    pub skip_enrichment: bool,
    #[serde(default)]
    pub rank_by: RankKey,
    /// Truncate the ranked list.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub merge: MergeDiagnostics,
    pub enrichment: Option<EnrichmentSummary>,
    pub insights: ScoringInsights,
    pub contacts: Vec<Contact>,
    pub elapsed_ms: u64,
}

/// Raw provider lists in, ranked canonical contacts out.
#[derive(Clone)]
pub struct Pipeline {
    orchestrator: EnrichmentOrchestrator,
    engine: ScoringEngine,
}

impl Pipeline {
    pub fn new(orchestrator: EnrichmentOrchestrator, engine: ScoringEngine) -> Self {
        Self {
            orchestrator,
            engine,
        }
    }

    pub fn orchestrator(&self) -> &EnrichmentOrchestrator {
        &self.orchestrator
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub async fn run(
        &self,
        providers: &BTreeMap<String, Vec<RawContact>>,
        options: &PipelineOptions,
    ) -> PipelineReport {
        let start = Instant::now();

        tracing::info!("Step 1: Merging contacts from {} providers", providers.len());
        let merged = merge(providers);

        let (mut contacts, enrichment) = if options.skip_enrichment {
            tracing::info!("Step 2: Enrichment skipped by request");
            (merged.contacts, None)
        } else {
            tracing::info!("Step 2: Enriching {} contacts", merged.contacts.len());
            let outcome = self.orchestrator.enrich_all(merged.contacts).await;
            (outcome.contacts, Some(outcome.summary))
        };

        let annotated: usize = contacts
            .iter_mut()
            .map(|c| sentiment::annotate_missing(&mut c.interactions))
            .sum();
        if annotated > 0 {
            tracing::debug!("Added keyword sentiment to {} interactions", annotated);
        }

        tracing::info!("Step 3: Scoring and ranking by {:?}", options.rank_by);
        let ranked = self.engine.rank(contacts, options.rank_by);
        let insights = self.engine.insights(&ranked);

        let contacts = match options.limit {
            Some(limit) => ranked.into_iter().take(limit).collect(),
            None => ranked,
        };

        let report = PipelineReport {
            merge: merged.diagnostics,
            enrichment,
            insights,
            contacts,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Pipeline finished: {} contacts ranked in {}ms",
            report.contacts.len(),
            report.elapsed_ms
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EnrichmentCache;
    use crate::config::{OrchestratorSettings, SourceSettings};
    use crate::scoring::ScoringWeights;
    use crate::sources::{domain_inference::DomainInferenceAdapter, SourceAdapter};
    use std::sync::Arc;
    use std::time::Duration;

    fn pipeline() -> Pipeline {
        let registry: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(DomainInferenceAdapter::new(
            SourceSettings::domain_inference(),
        ))];
        let settings = OrchestratorSettings {
            batch_delay: Duration::ZERO,
            ..Default::default()
        };
        let cache = EnrichmentCache::new(settings.cache_ttl, 100);
        Pipeline::new(
            EnrichmentOrchestrator::new(registry, cache, settings),
            ScoringEngine::new(ScoringWeights::default(), false),
        )
    }

    fn raw(email: &str, sent: u64) -> RawContact {
        RawContact {
            email: Some(email.to_string()),
            sent,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_merges_enriches_and_ranks() {
        let mut providers = BTreeMap::new();
        providers.insert("gmail".to_string(), vec![raw("a@acme.com", 2), raw("b@globex.com", 40)]);
        providers.insert("outlook".to_string(), vec![raw("A@Acme.com", 1), raw("not-an-email", 5)]);

        let report = pipeline().run(&providers, &PipelineOptions::default()).await;

        assert_eq!(report.contacts.len(), 2);
        assert_eq!(report.merge.dropped(), 1);
        let summary = report.enrichment.expect("enrichment ran");
        assert_eq!(summary.contacts, 2);
        assert_eq!(summary.total_cost, 0.0);
        assert!(report.contacts.iter().all(|c| c.score.is_some()));
        assert_eq!(report.insights.total_contacts, 2);

        let scores: Vec<f64> = report
            .contacts
            .iter()
            .filter_map(|c| c.score.as_ref().map(|s| s.overall))
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_skip_enrichment_and_limit() {
        let mut providers = BTreeMap::new();
        providers.insert(
            "gmail".to_string(),
            vec![raw("a@acme.com", 1), raw("b@acme.com", 2), raw("c@acme.com", 3)],
        );
        let options = PipelineOptions {
            skip_enrichment: true,
            limit: Some(2),
            ..Default::default()
        };

        let report = pipeline().run(&providers, &options).await;

        assert!(report.enrichment.is_none());
        assert_eq!(report.contacts.len(), 2);
        assert_eq!(report.insights.total_contacts, 3);
        assert!(report.contacts.iter().all(|c| !c.is_enriched()));
    }
}
