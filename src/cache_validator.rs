use sha2::{Digest, Sha256};

use crate::errors::AppError;

/// Checksummed wrapper for cache snapshots written to disk.
///
/// A snapshot is trusted only if the SHA-256 of its body matches the stored
/// checksum. Anything else is treated as corrupt and ignored by the caller.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SnapshotEnvelope {
    /// Serialized cache entries (JSON string).
    pub data: String,
    /// SHA-256 checksum of `data`, hex encoded.
    pub checksum: String,
    pub written_at: chrono::DateTime<chrono::Utc>,
}

impl SnapshotEnvelope {
    pub fn seal(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self {
            data,
            checksum,
            written_at: chrono::Utc::now(),
        }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self)
            .map_err(|e| AppError::Internal(format!("Failed to encode snapshot: {}", e)))
    }

    /// Parses a serialized envelope and returns its body if the checksum holds.
    pub fn open(serialized: &str) -> Result<String, AppError> {
        let envelope: SnapshotEnvelope = serde_json::from_str(serialized)
            .map_err(|e| AppError::Validation(format!("Unreadable cache snapshot: {}", e)))?;

        if !envelope.is_valid() {
            tracing::warn!(
                "Cache snapshot checksum mismatch. Expected: {}, Data length: {}",
                envelope.checksum,
                envelope.data.len()
            );
            return Err(AppError::Validation(
                "Cache snapshot checksum mismatch".to_string(),
            ));
        }

        Ok(envelope.data)
    }
}
