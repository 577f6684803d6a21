use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::collections::HashMap;
use std::time::Duration;

use crate::models::EnrichmentSource;

/// Circuit breaker guarding one upstream enrichment API.
pub type SourceBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

const TRIP_AFTER: u32 = 5;
const MIN_OPEN: Duration = Duration::from_secs(10);
const MAX_OPEN: Duration = Duration::from_secs(60);

/// Trips after five consecutive provider errors or timeouts, then waits
/// 10s doubling up to 60s before letting a trial call through. "No data"
/// answers count as successes.
pub fn create_source_breaker() -> SourceBreaker {
    let open_for = backoff::exponential(MIN_OPEN, MAX_OPEN);
    Config::new()
        .failure_policy(failure_policy::consecutive_failures(TRIP_AFTER, open_for))
        .build()
}

/// One breaker per registered source.
#[derive(Clone, Default)]
pub struct SourceBreakers {
    breakers: HashMap<EnrichmentSource, SourceBreaker>,
}

impl SourceBreakers {
    pub fn new(sources: impl IntoIterator<Item = EnrichmentSource>) -> Self {
        Self {
            breakers: sources
                .into_iter()
                .map(|s| (s, create_source_breaker()))
                .collect(),
        }
    }

    /// Unknown sources are always permitted.
    pub fn permits(&self, source: EnrichmentSource) -> bool {
        self.breakers
            .get(&source)
            .map(|b| b.is_call_permitted())
            .unwrap_or(true)
    }

    pub fn record_success(&self, source: EnrichmentSource) {
        if let Some(b) = self.breakers.get(&source) {
            b.on_success();
        }
    }

    pub fn record_failure(&self, source: EnrichmentSource) {
        if let Some(b) = self.breakers.get(&source) {
            b.on_error();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::{CircuitBreaker, Error};

    #[test]
    fn test_breaker_rejects_after_consecutive_errors() {
        let cb = create_source_breaker();

        for _ in 0..TRIP_AFTER {
            let failed: Result<(), Error<&str>> = cb.call(|| Err("upstream 503"));
            assert!(failed.is_err());
        }

        let trial: Result<(), Error<&str>> = cb.call(|| Ok(()));
        assert!(matches!(trial, Err(Error::Rejected)));
    }

    #[test]
    fn test_breakers_are_per_source() {
        let breakers = SourceBreakers::new([EnrichmentSource::Clearbit, EnrichmentSource::PeopleDataLabs]);

        for _ in 0..TRIP_AFTER {
            breakers.record_failure(EnrichmentSource::Clearbit);
        }

        assert!(!breakers.permits(EnrichmentSource::Clearbit));
        assert!(breakers.permits(EnrichmentSource::PeopleDataLabs));
        assert!(breakers.permits(EnrichmentSource::MockData));
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let breakers = SourceBreakers::new([EnrichmentSource::Clearbit]);

        for _ in 0..4 {
            breakers.record_failure(EnrichmentSource::Clearbit);
        }
        breakers.record_success(EnrichmentSource::Clearbit);
        for _ in 0..4 {
            breakers.record_failure(EnrichmentSource::Clearbit);
        }

        assert!(breakers.permits(EnrichmentSource::Clearbit));
    }
}
