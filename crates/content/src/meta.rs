//! Sidecar metadata records for content blobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Per-blob metadata, persisted as `<id>.meta.json` next to the blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMeta {
    /// When the blob was first written.
    pub created: DateTime<Utc>,

    /// When the blob was last updated.
    pub modified: DateTime<Utc>,

    /// Character count of the stored content.
    pub char_count: usize,

    /// Whitespace-separated word count.
    pub word_count: usize,

    /// SHA-256 checksum of the stored content, lowercase hex.
    pub checksum: String,
}

impl BlobMeta {
    /// Metadata for a freshly written blob.
    pub fn new(content: &str) -> Self {
        let now = Utc::now();
        Self {
            created: now,
            modified: now,
            char_count: content.chars().count(),
            word_count: content.split_whitespace().count(),
            checksum: checksum(content),
        }
    }

    /// Metadata for an updated blob, preserving the original creation time.
    pub fn refreshed(&self, content: &str) -> Self {
        Self {
            created: self.created,
            modified: Utc::now(),
            char_count: content.chars().count(),
            word_count: content.split_whitespace().count(),
            checksum: checksum(content),
        }
    }
}

/// SHA-256 of `content` as lowercase hex.
pub fn checksum(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hex = String::with_capacity(64);
    for b in digest {
        hex.push_str(&format!("{b:02x}"));
    }
    hex
}
