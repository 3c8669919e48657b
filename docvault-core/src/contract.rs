//! # contract: object-store interface
//!
//! This module defines the [`ObjectStore`] trait and the plain data types that
//! flow through it. Implementations live in [`crate::memory_store`] (in-process,
//! used by tests and local runs) and in the `docvault` crate (S3).
//!
//! ## Guarantees every implementation upholds
//! - Every upload creates a new object version; nothing is overwritten in place.
//! - Objects are written with server-side encryption and are never public.
//! - Signed URLs expire no later than the requested TTL. A TTL of zero or above
//!   [`MAX_SIGNED_URL_TTL`] is rejected with [`StorageError::InvalidArgument`]
//!   before the backing store is contacted (see [`validate_ttl`]).
//! - Transport or auth failures surface as [`StorageError::Unavailable`]. There
//!   is no internal retry.
//!
//! ## Existence checks
//! Not every store can tell whether a key exists when presigning. Stores report
//! this through [`ObjectStore::supports_existence_check`]; only those returning
//! `true` ever produce [`StorageError::NotFound`] from
//! [`ObjectStore::signed_download_url`].
//!
//! ## Mocking
//! The trait is annotated for `mockall`, so `MockObjectStore` is available in
//! tests and, with the `test-export-mocks` feature, to dependent crates.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::Serialize;

use crate::error::StorageError;

pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(86_400);
pub const MAX_SIGNED_URL_TTL: Duration = Duration::from_secs(7 * 86_400);

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Flat string metadata stored alongside an object. Opaque to the store.
pub type UploadMetadata = BTreeMap<String, String>;

/// Everything needed to store one object version.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Object key; validated by the store (see [`crate::keys::StorageKey::parse`]).
    pub key: &'a str,
    pub body: &'a [u8],
    pub content_type: &'a str,
    pub metadata: &'a UploadMetadata,
}

/// What the store reports back after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub key: String,
    /// Version created by this upload, when the store exposes versions.
    pub version_id: Option<String>,
    pub e_tag: Option<String>,
    pub size: usize,
}

/// A time-bounded download URL for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Reject TTLs the contract does not allow. Call before any network activity.
pub fn validate_ttl(ttl: Duration) -> Result<(), StorageError> {
    if ttl.is_zero() {
        return Err(StorageError::InvalidArgument(
            "signed URL TTL must be at least one second".into(),
        ));
    }
    if ttl > MAX_SIGNED_URL_TTL {
        return Err(StorageError::InvalidArgument(format!(
            "signed URL TTL of {}s exceeds the maximum of {}s",
            ttl.as_secs(),
            MAX_SIGNED_URL_TTL.as_secs()
        )));
    }
    Ok(())
}

/// Versioned, access-controlled object storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `req.body` under `req.key` as a new version.
    async fn upload<'a>(&self, req: UploadRequest<'a>) -> Result<UploadReceipt, StorageError>;

    /// Issue a download URL valid for at most `ttl`.
    async fn signed_download_url(&self, key: &str, ttl: Duration)
        -> Result<SignedUrl, StorageError>;

    /// Whether [`ObjectStore::signed_download_url`] verifies that the key exists.
    fn supports_existence_check(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_bounds() {
        assert!(validate_ttl(DEFAULT_SIGNED_URL_TTL).is_ok());
        assert!(validate_ttl(MAX_SIGNED_URL_TTL).is_ok());
        assert!(matches!(
            validate_ttl(MAX_SIGNED_URL_TTL + Duration::from_secs(1)),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_ttl(Duration::ZERO),
            Err(StorageError::InvalidArgument(_))
        ));
    }
}
