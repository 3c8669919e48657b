use std::time::Duration;

use chrono::{TimeZone, Utc};
use docvault_core::contract::{MockObjectStore, ObjectStore, MAX_SIGNED_URL_TTL};
use docvault_core::error::{PublishError, RenderFailure, StorageError};
use docvault_core::config::RenderConfig;
use docvault_core::memory_store::{MemoryObjectStore, SERVER_SIDE_ENCRYPTION};
use docvault_core::publish::{
    publish, PublishRequest, META_CLIENT_ID, META_DIAGNOSTIC, META_DOCUMENT_TYPE,
    META_RENDER_STATUS,
};
use docvault_core::render::{MockPdfEncoder, Renderer};

const INVOICE: &str = "# Invoice 0042\n## Items\nDesign work\nTotal: 400 EUR";

#[tokio::test]
async fn test_publish_round_trips_through_signed_url() {
    let renderer = Renderer::default();
    let store = MemoryObjectStore::new("documents");
    let mut req = PublishRequest::new("acme", "invoice", "Invoice 0042.pdf", INVOICE);
    req.timestamp = Some(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap());
    req.metadata.insert("document-number".into(), "0042".into());

    let report = publish(&renderer, &store, req).await.expect("publish should succeed");

    assert!(report.key.starts_with("acme/2024/03/invoice/"));
    assert!(report.key.ends_with("-Invoice_0042.pdf"));
    assert!(!report.is_fallback);
    assert!(report.version_id.is_some());

    let stored = store.latest(&report.key).expect("object stored");
    assert_eq!(stored.content_type, "application/pdf");
    assert_eq!(stored.server_side_encryption, SERVER_SIDE_ENCRYPTION);
    assert_eq!(stored.metadata[META_CLIENT_ID], "acme");
    assert_eq!(stored.metadata[META_DOCUMENT_TYPE], "invoice");
    assert_eq!(stored.metadata[META_RENDER_STATUS], "ok");
    assert_eq!(stored.metadata["document-number"], "0042");
    assert!(!stored.metadata.contains_key(META_DIAGNOSTIC));

    let fetched = store
        .fetch(&report.signed_url.url, Utc::now())
        .expect("fresh URL should resolve");
    assert_eq!(fetched, stored.body);
    assert_eq!(fetched.len(), report.size);
    assert_eq!(&fetched[0..4], b"%PDF");
}

#[tokio::test]
async fn test_republishing_same_key_creates_new_version() {
    let renderer = Renderer::default();
    let store = MemoryObjectStore::new("documents");
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

    let mut first = PublishRequest::new("acme", "quote", "q.pdf", "# Quote v1");
    first.timestamp = Some(at);
    let mut second = PublishRequest::new("acme", "quote", "q.pdf", "# Quote v2");
    second.timestamp = Some(at);

    let a = publish(&renderer, &store, first).await.unwrap();
    let b = publish(&renderer, &store, second).await.unwrap();

    assert_eq!(a.key, b.key);
    assert_ne!(a.version_id, b.version_id);
    assert_eq!(store.versions(&a.key).len(), 2);
    // The older URL still resolves to the older version.
    let old = store.fetch(&a.signed_url.url, Utc::now()).unwrap();
    assert_eq!(old, store.versions(&a.key)[0].body);
}

#[tokio::test]
async fn test_fallback_document_is_stored_and_flagged() {
    let mut encoder = MockPdfEncoder::new();
    encoder
        .expect_encode()
        .returning(|_| Err(RenderFailure::Encoder("font table missing".into())));
    let renderer = Renderer::with_encoder(encoder, RenderConfig::default());
    let store = MemoryObjectStore::new("documents");

    let report = publish(&renderer, &store, PublishRequest::new("acme", "invoice", "x.pdf", INVOICE))
        .await
        .expect("fallback still publishes");

    assert!(report.is_fallback);
    let stored = store.latest(&report.key).unwrap();
    assert_eq!(stored.metadata[META_RENDER_STATUS], "fallback");
    assert_eq!(Some(&stored.metadata[META_DIAGNOSTIC]), report.diagnostic.as_ref());
}

#[tokio::test]
async fn test_invalid_ttl_never_reaches_the_store() {
    let mut store = MockObjectStore::new();
    store.expect_upload().times(0);
    store.expect_signed_download_url().times(0);

    let mut req = PublishRequest::new("acme", "invoice", "x.pdf", INVOICE);
    req.ttl = MAX_SIGNED_URL_TTL + Duration::from_secs(1);
    let err = publish(&Renderer::default(), &store, req).await.unwrap_err();
    assert!(matches!(err, PublishError::Storage(StorageError::InvalidArgument(_))));

    let mut req = PublishRequest::new("acme", "invoice", "x.pdf", INVOICE);
    req.ttl = Duration::ZERO;
    let err = publish(&Renderer::default(), &store, req).await.unwrap_err();
    assert!(matches!(err, PublishError::Storage(StorageError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_empty_markdown_is_an_input_error() {
    let mut store = MockObjectStore::new();
    store.expect_upload().times(0);

    let req = PublishRequest::new("acme", "invoice", "x.pdf", "");
    let err = publish(&Renderer::default(), &store, req).await.unwrap_err();
    assert!(matches!(err, PublishError::Input(_)));
}

#[tokio::test]
async fn test_storage_errors_propagate_unmodified() {
    let mut store = MockObjectStore::new();
    store
        .expect_upload()
        .times(1)
        .returning(|_| Err(StorageError::AccessDenied("bucket policy denies PutObject".into())));
    store.expect_signed_download_url().times(0);

    let req = PublishRequest::new("acme", "invoice", "x.pdf", INVOICE);
    let err = publish(&Renderer::default(), &store, req).await.unwrap_err();
    match err {
        PublishError::Storage(StorageError::AccessDenied(msg)) => {
            assert_eq!(msg, "bucket policy denies PutObject")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_outage_surfaces_as_unavailable() {
    let store = MemoryObjectStore::new("documents");
    store.set_unavailable(true);
    let err = publish(
        &Renderer::default(),
        &store,
        PublishRequest::new("acme", "invoice", "x.pdf", INVOICE),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PublishError::Storage(StorageError::Unavailable(_))));
    assert!(store.supports_existence_check());
}
