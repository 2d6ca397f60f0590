// TestDependencies - mock implementations for testing
//
// Provides mock collaborators that can be injected into ClassroomDeps for
// tests. Responses are queued with `with_*` builders; every call is captured
// for assertions.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::kernel::deps::ClassroomDeps;
use crate::kernel::traits::{
    BaseMultimedia, BaseStorage, ConvertRequest, ConvertedMedia, SignedUrl, StorageLocation,
    UploadRequest,
};
use crate::repository::memory_repository;

// =============================================================================
// Mock Storage
// =============================================================================

/// In-memory storage double: holds uploaded/seeded blobs by identifier and
/// hands out deterministic signed urls.
pub struct MockStorage {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    upload_calls: Arc<Mutex<Vec<UploadRequest>>>,
    download_calls: Arc<Mutex<Vec<String>>>,
    signed_url_count: Arc<Mutex<u32>>,
    fail_uploads: bool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
            upload_calls: Arc::new(Mutex::new(Vec::new())),
            download_calls: Arc::new(Mutex::new(Vec::new())),
            signed_url_count: Arc::new(Mutex::new(0)),
            fail_uploads: false,
        }
    }

    /// Seed bytes as if the client had uploaded them through a signed url.
    pub fn with_blob(self, identifier: &str, bytes: &[u8]) -> Self {
        self.blobs
            .lock()
            .unwrap()
            .insert(identifier.to_string(), bytes.to_vec());
        self
    }

    /// Make `upload` fail with an infrastructure error.
    pub fn with_failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    /// Seed bytes after construction (the client uploading through a signed
    /// url it was handed earlier).
    pub fn seed_blob(&self, identifier: &str, bytes: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(identifier.to_string(), bytes.to_vec());
    }

    pub fn upload_calls(&self) -> Vec<UploadRequest> {
        self.upload_calls.lock().unwrap().clone()
    }

    pub fn download_calls(&self) -> Vec<String> {
        self.download_calls.lock().unwrap().clone()
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseStorage for MockStorage {
    async fn upload(&self, request: UploadRequest) -> Result<StorageLocation> {
        self.upload_calls.lock().unwrap().push(request.clone());
        if self.fail_uploads {
            anyhow::bail!("mock storage: upload failed");
        }
        let identifier = format!("blob-{}", self.blobs.lock().unwrap().len() + 1);
        self.blobs
            .lock()
            .unwrap()
            .insert(identifier.clone(), request.source);
        Ok(StorageLocation {
            bucket: "test-bucket".to_string(),
            identifier,
            driver: "mock".to_string(),
        })
    }

    async fn download(&self, identifier: &str) -> Result<Option<Vec<u8>>> {
        self.download_calls
            .lock()
            .unwrap()
            .push(identifier.to_string());
        Ok(self.blobs.lock().unwrap().get(identifier).cloned())
    }

    async fn check(&self, identifier: &str) -> Result<bool> {
        Ok(self.blobs.lock().unwrap().contains_key(identifier))
    }

    async fn get_signed_url(&self) -> Result<SignedUrl> {
        let mut count = self.signed_url_count.lock().unwrap();
        *count += 1;
        let identifier = format!("presign-{}", *count);
        Ok(SignedUrl {
            url: format!("https://signed.test/{identifier}"),
            expires_at: Utc::now() + Duration::minutes(15),
            identifier,
            driver: "mock".to_string(),
            bucket: "test-bucket".to_string(),
        })
    }
}

// =============================================================================
// Mock Multimedia
// =============================================================================

/// Conversion double: echoes bytes back as `audio/mpeg` with a configurable
/// duration, or fails on demand.
pub struct MockMultimedia {
    duration: f64,
    fail: bool,
    convert_calls: Arc<Mutex<Vec<ConvertRequest>>>,
}

impl MockMultimedia {
    pub fn new() -> Self {
        Self {
            duration: 120.0,
            fail: false,
            convert_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Make `convert` fail with an infrastructure error.
    pub fn with_failing_conversion(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn convert_calls(&self) -> Vec<ConvertRequest> {
        self.convert_calls.lock().unwrap().clone()
    }
}

impl Default for MockMultimedia {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseMultimedia for MockMultimedia {
    async fn convert(&self, request: ConvertRequest) -> Result<ConvertedMedia> {
        self.convert_calls.lock().unwrap().push(request.clone());
        if self.fail {
            anyhow::bail!("mock multimedia: conversion failed");
        }
        Ok(ConvertedMedia {
            bytes: request.bytes,
            mime: "audio/mpeg".to_string(),
            duration: self.duration,
        })
    }
}

// =============================================================================
// Bundles
// =============================================================================

/// Deps wired entirely to in-memory doubles.
pub fn test_deps() -> ClassroomDeps {
    ClassroomDeps::new(
        memory_repository(),
        Arc::new(MockStorage::new()),
        Arc::new(MockMultimedia::new()),
    )
}

/// Deps with explicit doubles (keep the `Arc`s to assert on captured calls).
pub fn test_deps_with(storage: Arc<MockStorage>, multimedia: Arc<MockMultimedia>) -> ClassroomDeps {
    ClassroomDeps::new(memory_repository(), storage, multimedia)
}
