//! Publish pipeline: render → key → upload → signed URL.
//!
//! This is the optional downstream step that callers of the handler use to
//! persist a document and hand out a link to it. It is fail-fast: the first
//! storage error is returned unmodified inside [`PublishError::Storage`], and
//! nothing is retried.
//!
//! A rendering fallback is not an error here either; the error document is
//! stored like any other and flagged in its metadata (`render-status`).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::contract::{
    validate_ttl, ObjectStore, SignedUrl, UploadMetadata, UploadRequest, DEFAULT_SIGNED_URL_TTL,
    PDF_CONTENT_TYPE,
};
use crate::error::PublishError;
use crate::keys::generate_key;
use crate::render::{PdfEncoder, Renderer};

pub const META_CLIENT_ID: &str = "client-id";
pub const META_DOCUMENT_TYPE: &str = "document-type";
pub const META_RENDER_STATUS: &str = "render-status";
pub const META_DIAGNOSTIC: &str = "diagnostic";

/// One document to publish.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub client_id: &'a str,
    pub document_type: &'a str,
    pub filename: &'a str,
    pub markdown: &'a str,
    /// Fixes the key's timestamp; callers needing idempotent keys must set it.
    pub timestamp: Option<DateTime<Utc>>,
    /// Caller metadata, e.g. a document number. Pipeline keys take precedence.
    pub metadata: UploadMetadata,
    pub ttl: Duration,
}

impl<'a> PublishRequest<'a> {
    pub fn new(
        client_id: &'a str,
        document_type: &'a str,
        filename: &'a str,
        markdown: &'a str,
    ) -> Self {
        Self {
            client_id,
            document_type,
            filename,
            markdown,
            timestamp: None,
            metadata: UploadMetadata::new(),
            ttl: DEFAULT_SIGNED_URL_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishReport {
    pub key: String,
    pub version_id: Option<String>,
    pub size: usize,
    pub page_count: usize,
    pub is_fallback: bool,
    pub diagnostic: Option<String>,
    pub signed_url: SignedUrl,
}

pub async fn publish<S, E>(
    renderer: &Renderer<E>,
    store: &S,
    req: PublishRequest<'_>,
) -> Result<PublishReport, PublishError>
where
    S: ObjectStore + ?Sized,
    E: PdfEncoder,
{
    info!(
        client_id = req.client_id,
        document_type = req.document_type,
        "[PUBLISH] Starting publish pipeline"
    );

    // Argument checks first so a bad request never leaves an orphaned upload.
    validate_ttl(req.ttl)?;
    let key = generate_key(req.client_id, req.document_type, req.filename, req.timestamp)?;

    let rendered = renderer.render_markdown(req.markdown).map_err(|e| {
        error!(error = %e, "[PUBLISH][ERROR] Markdown rejected");
        e
    })?;
    if rendered.is_fallback {
        warn!(
            key = %key,
            diagnostic = rendered.diagnostic.as_deref().unwrap_or_default(),
            "[PUBLISH] Storing fallback document"
        );
    }

    let mut metadata = req.metadata.clone();
    metadata.insert(META_CLIENT_ID.into(), req.client_id.into());
    metadata.insert(META_DOCUMENT_TYPE.into(), req.document_type.into());
    metadata.insert(
        META_RENDER_STATUS.into(),
        (if rendered.is_fallback { "fallback" } else { "ok" }).into(),
    );
    if let Some(diagnostic) = &rendered.diagnostic {
        metadata.insert(META_DIAGNOSTIC.into(), diagnostic.clone());
    }

    let receipt = store
        .upload(UploadRequest {
            key: key.as_str(),
            body: &rendered.buffer,
            content_type: PDF_CONTENT_TYPE,
            metadata: &metadata,
        })
        .await
        .map_err(|e| {
            error!(key = %key, error = ?e, "[PUBLISH][ERROR] Upload failed");
            e
        })?;
    info!(key = %receipt.key, size = receipt.size, "[PUBLISH] Upload succeeded");

    let signed_url = store
        .signed_download_url(&receipt.key, req.ttl)
        .await
        .map_err(|e| {
            error!(key = %receipt.key, error = ?e, "[PUBLISH][ERROR] Signing failed");
            e
        })?;
    info!(key = %receipt.key, expires_at = %signed_url.expires_at, "[PUBLISH] Signed URL issued");

    Ok(PublishReport {
        key: receipt.key,
        version_id: receipt.version_id,
        size: receipt.size,
        page_count: rendered.page_count,
        is_fallback: rendered.is_fallback,
        diagnostic: rendered.diagnostic,
        signed_url,
    })
}
