//! Expiring enrichment cache keyed by `(email, source)`.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache_validator::SnapshotEnvelope;
use crate::errors::{AppError, ResultExt};
use crate::models::{EnrichmentData, EnrichmentSource};

/// What a cache hit hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEnrichment {
    pub data: EnrichmentData,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: CachedEnrichment,
    created_at: DateTime<Utc>,
}

/// On-disk shape of one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub ttl_hours: f64,
    pub payload: CachedEnrichment,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: u64,
    pub ttl_hours: f64,
    pub max_entries: u64,
}

/// Concurrent writers to one key race; last writer wins.
#[derive(Clone)]
pub struct EnrichmentCache {
    inner: Cache<String, CacheEntry>,
    ttl: Duration,
    max_entries: u64,
}

impl EnrichmentCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let inner = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_entries)
            .build();
        Self {
            inner,
            ttl,
            max_entries,
        }
    }

    pub fn key(email: &str, source: EnrichmentSource) -> String {
        format!("{}::{}", email, source)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_stale(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(created_at);
        age.to_std().map(|age| age > self.ttl).unwrap_or(false)
    }

    /// Returns the payload if present and younger than the TTL. A stale
    /// entry is evicted on the miss.
    pub async fn get(&self, email: &str, source: EnrichmentSource) -> Option<CachedEnrichment> {
        let key = Self::key(email, source);
        let entry = self.inner.get(&key).await?;

        if self.is_stale(entry.created_at, Utc::now()) {
            tracing::debug!("Cache entry {} expired, evicting", key);
            self.inner.invalidate(&key).await;
            return None;
        }

        Some(entry.payload)
    }

    pub async fn set(&self, email: &str, source: EnrichmentSource, payload: CachedEnrichment) {
        self.insert_at(Self::key(email, source), payload, Utc::now())
            .await;
    }

    async fn insert_at(&self, key: String, payload: CachedEnrichment, created_at: DateTime<Utc>) {
        self.inner
            .insert(
                key,
                CacheEntry {
                    payload,
                    created_at,
                },
            )
            .await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        CacheStats {
            entries: self.inner.entry_count(),
            ttl_hours: self.ttl.as_secs_f64() / 3600.0,
            max_entries: self.max_entries,
        }
    }

    /// Live entries in their persisted shape.
    pub fn export(&self) -> Vec<PersistedEntry> {
        let now = Utc::now();
        let ttl_hours = self.ttl.as_secs_f64() / 3600.0;
        let mut entries: Vec<PersistedEntry> = self
            .inner
            .iter()
            .filter(|(_, entry)| !self.is_stale(entry.created_at, now))
            .map(|(key, entry)| PersistedEntry {
                key: key.as_ref().clone(),
                created_at: entry.created_at,
                ttl_hours,
                payload: entry.payload,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Loads persisted entries, skipping those already past the TTL.
    pub async fn import(&self, entries: Vec<PersistedEntry>) -> usize {
        let now = Utc::now();
        let mut loaded = 0;
        for entry in entries {
            if self.is_stale(entry.created_at, now) {
                continue;
            }
            self.insert_at(entry.key, entry.payload, entry.created_at)
                .await;
            loaded += 1;
        }
        loaded
    }

    pub async fn save_snapshot(&self, path: &Path) -> Result<usize, AppError> {
        let entries = self.export();
        let body = serde_json::to_string(&entries)
            .map_err(|e| AppError::Internal(format!("Failed to encode cache entries: {}", e)))?;
        let envelope = SnapshotEnvelope::seal(body).to_json()?;

        tokio::fs::write(path, envelope)
            .await
            .with_context(|| format!("writing cache snapshot to {}", path.display()))?;

        tracing::info!("Saved {} cache entries to {}", entries.len(), path.display());
        Ok(entries.len())
    }

    /// A missing file is an empty snapshot. A corrupt one is an error the
    /// caller may choose to ignore.
    pub async fn load_snapshot(&self, path: &Path) -> Result<usize, AppError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e).with_context(|| format!("reading cache snapshot {}", path.display()))
            }
        };

        let body = SnapshotEnvelope::open(&raw)?;
        let entries: Vec<PersistedEntry> = serde_json::from_str(&body)
            .map_err(|e| AppError::Validation(format!("Malformed cache snapshot: {}", e)))?;

        let loaded = self.import(entries).await;
        tracing::info!("Loaded {} cache entries from {}", loaded, path.display());
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(company: &str) -> CachedEnrichment {
        CachedEnrichment {
            data: EnrichmentData {
                company: Some(company.to_string()),
                ..Default::default()
            },
            confidence: 0.3,
        }
    }

    fn hours(h: u64) -> Duration {
        Duration::from_secs(h * 3600)
    }

    #[tokio::test]
    async fn test_get_after_set() {
        let cache = EnrichmentCache::new(hours(24), 100);
        cache
            .set("bob@example.com", EnrichmentSource::DomainInference, payload("Example"))
            .await;

        let hit = cache
            .get("bob@example.com", EnrichmentSource::DomainInference)
            .await;
        assert_eq!(hit, Some(payload("Example")));

        // Keyed per source
        assert!(cache
            .get("bob@example.com", EnrichmentSource::Clearbit)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = EnrichmentCache::new(hours(24), 100);
        cache.set("a@b.com", EnrichmentSource::MockData, payload("First")).await;
        cache.set("a@b.com", EnrichmentSource::MockData, payload("Second")).await;

        let hit = cache.get("a@b.com", EnrichmentSource::MockData).await;
        assert_eq!(hit, Some(payload("Second")));
    }

    #[tokio::test]
    async fn test_stale_entry_evicted_on_miss() {
        let cache = EnrichmentCache::new(hours(1), 100);
        let key = EnrichmentCache::key("old@example.com", EnrichmentSource::Clearbit);
        cache
            .insert_at(key, payload("Old"), Utc::now() - chrono::Duration::hours(2))
            .await;

        assert!(cache
            .get("old@example.com", EnrichmentSource::Clearbit)
            .await
            .is_none());
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_import_skips_stale_entries() {
        let cache = EnrichmentCache::new(hours(24), 100);
        let fresh = PersistedEntry {
            key: EnrichmentCache::key("a@b.com", EnrichmentSource::Clearbit),
            created_at: Utc::now() - chrono::Duration::hours(1),
            ttl_hours: 24.0,
            payload: payload("Fresh"),
        };
        let stale = PersistedEntry {
            key: EnrichmentCache::key("c@d.com", EnrichmentSource::Clearbit),
            created_at: Utc::now() - chrono::Duration::hours(48),
            ttl_hours: 24.0,
            payload: payload("Stale"),
        };

        assert_eq!(cache.import(vec![fresh, stale]).await, 1);
        assert!(cache.get("a@b.com", EnrichmentSource::Clearbit).await.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let path = std::env::temp_dir().join(format!("cache-{}.json", uuid::Uuid::new_v4()));

        let cache = EnrichmentCache::new(hours(24), 100);
        cache.set("a@b.com", EnrichmentSource::PeopleDataLabs, payload("Acme")).await;
        assert_eq!(cache.save_snapshot(&path).await.unwrap(), 1);

        let restored = EnrichmentCache::new(hours(24), 100);
        assert_eq!(restored.load_snapshot(&path).await.unwrap(), 1);
        assert_eq!(
            restored.get("a@b.com", EnrichmentSource::PeopleDataLabs).await,
            Some(payload("Acme"))
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, raw.replace("Acme", "Evil")).unwrap();
        assert!(EnrichmentCache::new(hours(24), 100)
            .load_snapshot(&path)
            .await
            .is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_empty() {
        let cache = EnrichmentCache::new(hours(24), 100);
        let path = std::env::temp_dir().join(format!("absent-{}.json", uuid::Uuid::new_v4()));
        assert_eq!(cache.load_snapshot(&path).await.unwrap(), 0);
    }
}
