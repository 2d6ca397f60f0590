// Trait definitions for external collaborators
//
// These are INFRASTRUCTURE traits only - no business logic. The storage
// backend and the media converter are opaque systems the domain flows call
// out to; their internals (object store drivers, ffmpeg) live elsewhere.
//
// Naming convention: Base* for trait names (e.g. BaseStorage, BaseMultimedia)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// =============================================================================
// Storage Trait (Infrastructure - byte persistence)
// =============================================================================

/// Upload request: raw bytes plus free-form metadata the driver may record.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: Vec<u8>,
    pub metadata: serde_json::Value,
}

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    pub bucket: String,
    pub identifier: String,
    pub driver: String,
}

/// A signed upload url with its reserved storage slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub identifier: String,
    pub driver: String,
    pub bucket: String,
}

#[async_trait]
pub trait BaseStorage: Send + Sync {
    /// Persist bytes; returns the storage location.
    async fn upload(&self, request: UploadRequest) -> Result<StorageLocation>;

    /// Fetch bytes by identifier. Absent is `Ok(None)`, not an error.
    async fn download(&self, identifier: &str) -> Result<Option<Vec<u8>>>;

    /// Whether bytes exist for this identifier.
    async fn check(&self, identifier: &str) -> Result<bool>;

    /// Reserve a slot and hand out a signed upload url for it.
    async fn get_signed_url(&self) -> Result<SignedUrl>;
}

// =============================================================================
// Multimedia Trait (Infrastructure - media conversion)
// =============================================================================

/// Conversion input.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: String,
}

/// Conversion output: normalized bytes plus the measured duration in seconds.
#[derive(Debug, Clone)]
pub struct ConvertedMedia {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub duration: f64,
}

#[async_trait]
pub trait BaseMultimedia: Send + Sync {
    /// Convert uploaded media into the canonical delivery format.
    async fn convert(&self, request: ConvertRequest) -> Result<ConvertedMedia>;
}
