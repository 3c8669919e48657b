//! [`ObjectStore`] backed by Amazon S3 or any S3-compatible service.
//!
//! Objects are written with `AES256` server-side encryption and no ACL, so the
//! bucket policy decides access and nothing is public. Downloads go through
//! presigned `GetObject` URLs.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use docvault_core::contract::{
    validate_ttl, ObjectStore, SignedUrl, UploadReceipt, UploadRequest, DEFAULT_SIGNED_URL_TTL,
};
use docvault_core::error::StorageError;
use docvault_core::keys::StorageKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

/// `storage` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Falls back to the AWS provider chain when unset.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores; enables path-style addressing.
    pub endpoint: Option<String>,
    /// Run `HeadObject` before presigning so missing keys fail with `NotFound`.
    pub verify_existence: bool,
    pub default_ttl_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            verify_existence: true,
            default_ttl_secs: DEFAULT_SIGNED_URL_TTL.as_secs(),
        }
    }
}

impl StorageSettings {
    pub fn trace_loaded(&self) {
        info!(
            region = self.region.as_deref().unwrap_or("<provider chain>"),
            endpoint = self.endpoint.as_deref().unwrap_or("<aws>"),
            verify_existence = self.verify_existence,
            default_ttl_secs = self.default_ttl_secs,
            "Loaded StorageSettings"
        );
    }
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    verify_existence: bool,
}

impl S3ObjectStore {
    /// Build a client from the default AWS configuration chain, overridden by `settings`.
    pub async fn from_settings(bucket: impl Into<String>, settings: &StorageSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::with_client(Client::from_conf(builder.build()), bucket, settings.verify_existence)
    }

    /// Create with a preconfigured client (for testing and custom setups).
    pub fn with_client(client: Client, bucket: impl Into<String>, verify_existence: bool) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            verify_existence,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn ensure_exists(&self, key: &StorageKey) -> Result<(), StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                debug!(bucket = %self.bucket, key = %key, "HeadObject reports key absent");
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(map_sdk_error("HeadObject", key.as_str(), e)),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, req), fields(bucket = %self.bucket, key = %req.key))]
    async fn upload<'a>(&self, req: UploadRequest<'a>) -> Result<UploadReceipt, StorageError> {
        let key = StorageKey::parse(req.key)?;
        let metadata: HashMap<String, String> = req
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(ByteStream::from(req.body.to_vec()))
            .content_type(req.content_type)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| map_sdk_error("PutObject", key.as_str(), e))?;

        info!(
            size = req.body.len(),
            version_id = output.version_id().unwrap_or("<unversioned>"),
            "PutObject succeeded"
        );
        Ok(UploadReceipt {
            key: key.into_string(),
            version_id: output.version_id().map(str::to_owned),
            e_tag: output.e_tag().map(str::to_owned),
            size: req.body.len(),
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn signed_download_url(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StorageError> {
        validate_ttl(ttl)?;
        let key = StorageKey::parse(key)?;
        if self.verify_existence {
            self.ensure_exists(&key).await?;
        }

        // One instant for both the signature and the reported expiry.
        let signed_at = SystemTime::now();
        let presigning = PresigningConfig::builder()
            .start_time(signed_at)
            .expires_in(ttl)
            .build()
            .map_err(|e| StorageError::InvalidArgument(format!("presigning config: {e}")))?;
        let expires_at = DateTime::<Utc>::from(signed_at + ttl);
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .presigned(presigning)
            .await
            .map_err(|e| map_sdk_error("GetObject presign", key.as_str(), e))?;

        info!(key = %key, ttl_secs = ttl.as_secs(), "Issued presigned GetObject URL");
        Ok(SignedUrl {
            url: presigned.uri().to_string(),
            expires_at,
        })
    }

    fn supports_existence_check(&self) -> bool {
        self.verify_existence
    }
}

/// Translate an SDK failure into the store-neutral error taxonomy.
fn map_sdk_error<E, R>(operation: &str, key: &str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let detail = format!("{operation} {key}: {}", DisplayErrorContext(&err));
    error!(operation, key, error = %detail, "S3 request failed");
    match &err {
        SdkError::ServiceError(service) => match service.err().code() {
            Some("AccessDenied") | Some("AllAccessDisabled") => StorageError::AccessDenied(detail),
            Some("NoSuchKey") | Some("NotFound") => StorageError::NotFound(key.to_string()),
            _ => StorageError::Unavailable(detail),
        },
        // Transport, timeout and credential resolution failures.
        _ => StorageError::Unavailable(detail),
    }
}
