//! In-process [`ObjectStore`] with versioning and HMAC-signed URLs.
//!
//! Every upload appends a version; nothing is ever removed. Signed URLs have
//! the form `memory://<bucket>/<key>?versionId=..&expires=..&signature=..` and
//! can be resolved with [`MemoryObjectStore::fetch`], which checks the
//! signature and expiry the same way a real store would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::contract::{validate_ttl, ObjectStore, SignedUrl, UploadMetadata, UploadReceipt, UploadRequest};
use crate::error::StorageError;
use crate::keys::StorageKey;

type HmacSha256 = Hmac<Sha256>;

pub const SERVER_SIDE_ENCRYPTION: &str = "AES256";

/// One stored version of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub version_id: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: UploadMetadata,
    pub server_side_encryption: &'static str,
    pub created_at: DateTime<Utc>,
}

pub struct MemoryObjectStore {
    bucket: String,
    signing_key: Vec<u8>,
    objects: Mutex<HashMap<String, Vec<StoredObject>>>,
    unavailable: AtomicBool,
}

impl MemoryObjectStore {
    /// Store with a random signing key.
    pub fn new(bucket: impl Into<String>) -> Self {
        let mut signing_key = uuid::Uuid::new_v4().as_bytes().to_vec();
        signing_key.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        Self::with_signing_key(bucket, signing_key)
    }

    pub fn with_signing_key(bucket: impl Into<String>, signing_key: impl Into<Vec<u8>>) -> Self {
        Self {
            bucket: bucket.into(),
            signing_key: signing_key.into(),
            objects: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Simulate an outage: every call fails with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// All versions of `key`, oldest first.
    pub fn versions(&self, key: &str) -> Vec<StoredObject> {
        self.lock().get(key).cloned().unwrap_or_default()
    }

    pub fn latest(&self, key: &str) -> Option<StoredObject> {
        self.lock().get(key).and_then(|v| v.last().cloned())
    }

    /// Resolve a URL issued by this store as of `now`.
    pub fn fetch(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<u8>, StorageError> {
        self.ensure_available()?;
        let prefix = format!("memory://{}/", self.bucket);
        let rest = url.strip_prefix(&prefix).ok_or_else(|| {
            StorageError::InvalidArgument(format!("URL was not issued by bucket '{}'", self.bucket))
        })?;
        let (path, query) = rest
            .split_once('?')
            .ok_or_else(|| StorageError::AccessDenied("URL carries no signature".into()))?;

        let key = path
            .split('/')
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|s| s.into_owned())
                    .map_err(|e| StorageError::InvalidKey(format!("undecodable key segment: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?
            .join("/");

        let mut version_id = None;
        let mut expires = None;
        let mut signature = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("versionId", v)) => version_id = Some(v),
                Some(("expires", v)) => expires = v.parse::<i64>().ok(),
                Some(("signature", v)) => signature = hex::decode(v).ok(),
                _ => {}
            }
        }
        let (Some(version_id), Some(expires), Some(signature)) = (version_id, expires, signature)
        else {
            return Err(StorageError::AccessDenied("URL is missing signing parameters".into()));
        };

        let mut mac = self.mac()?;
        mac.update(string_to_sign(&key, version_id, expires).as_bytes());
        if mac.verify_slice(&signature).is_err() {
            error!(key = %key, "Rejected signed URL with bad signature");
            return Err(StorageError::AccessDenied("signature mismatch".into()));
        }
        if now.timestamp() >= expires {
            debug!(key = %key, expires, "Rejected expired signed URL");
            return Err(StorageError::AccessDenied("signed URL has expired".into()));
        }

        self.lock()
            .get(&key)
            .and_then(|versions| versions.iter().find(|v| v.version_id == version_id))
            .map(|v| v.body.clone())
            .ok_or(StorageError::NotFound(key))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<StoredObject>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!(
                "bucket '{}' is unreachable",
                self.bucket
            )));
        }
        Ok(())
    }

    fn mac(&self) -> Result<HmacSha256, StorageError> {
        HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| StorageError::InvalidArgument(format!("signing key rejected: {e}")))
    }
}

fn string_to_sign(key: &str, version_id: &str, expires: i64) -> String {
    format!("GET\n{key}\n{version_id}\n{expires}")
}

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload<'a>(&self, req: UploadRequest<'a>) -> Result<UploadReceipt, StorageError> {
        self.ensure_available()?;
        let key = StorageKey::parse(req.key)?;
        let version_id = uuid::Uuid::new_v4().simple().to_string();
        let e_tag = hex::encode(Sha256::digest(req.body));

        let stored = StoredObject {
            version_id: version_id.clone(),
            body: req.body.to_vec(),
            content_type: req.content_type.to_string(),
            metadata: req.metadata.clone(),
            server_side_encryption: SERVER_SIDE_ENCRYPTION,
            created_at: Utc::now(),
        };
        let versions = {
            let mut objects = self.lock();
            let entry = objects.entry(key.as_str().to_string()).or_default();
            entry.push(stored);
            entry.len()
        };

        info!(
            bucket = %self.bucket,
            key = %key,
            version_id = %version_id,
            size = req.body.len(),
            versions,
            "Stored object version"
        );
        Ok(UploadReceipt {
            key: key.into_string(),
            version_id: Some(version_id),
            e_tag: Some(e_tag),
            size: req.body.len(),
        })
    }

    async fn signed_download_url(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StorageError> {
        validate_ttl(ttl)?;
        self.ensure_available()?;
        let key = StorageKey::parse(key)?;
        let version_id = self
            .latest(key.as_str())
            .map(|v| v.version_id)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|e| StorageError::InvalidArgument(format!("TTL out of range: {e}")))?;
        let expires = Utc::now().timestamp() + ttl_secs;
        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .ok_or_else(|| StorageError::InvalidArgument("expiry out of range".into()))?;

        let mut mac = self.mac()?;
        mac.update(string_to_sign(key.as_str(), &version_id, expires).as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        info!(key = %key, ttl_secs, "Issued signed URL");
        Ok(SignedUrl {
            url: format!(
                "memory://{}/{}?versionId={version_id}&expires={expires}&signature={signature}",
                self.bucket,
                encode_key(key.as_str())
            ),
            expires_at,
        })
    }

    fn supports_existence_check(&self) -> bool {
        true
    }
}
