//! Offline checks for the S3 store: nothing listens on the endpoint, so only
//! argument validation, presigning and transport-failure mapping are exercised.

use std::collections::BTreeMap;
use std::time::Duration;

use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::Client;
use docvault::s3::S3ObjectStore;
use docvault_core::contract::{ObjectStore, UploadRequest, MAX_SIGNED_URL_TTL};
use docvault_core::error::StorageError;

const UNREACHABLE_ENDPOINT: &str = "http://127.0.0.1:9";

fn offline_store(verify_existence: bool) -> S3ObjectStore {
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("eu-west-1"))
        .credentials_provider(Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
            None,
            None,
            "static",
        ))
        .endpoint_url(UNREACHABLE_ENDPOINT)
        .force_path_style(true)
        .retry_config(RetryConfig::disabled())
        .build();
    S3ObjectStore::with_client(Client::from_conf(config), "client-documents", verify_existence)
}

#[tokio::test]
async fn presigns_without_contacting_the_store() {
    let store = offline_store(false);
    assert!(!store.supports_existence_check());

    let signed = store
        .signed_download_url("acme/2024/03/invoice/1709985600000-a.pdf", Duration::from_secs(900))
        .await
        .expect("presigning is local");

    assert!(signed
        .url
        .starts_with("http://127.0.0.1:9/client-documents/acme/2024/03/invoice/1709985600000-a.pdf?"));
    assert!(signed.url.contains("X-Amz-Expires=900"));
    assert!(signed.url.contains("X-Amz-Signature="));
    assert!(signed.expires_at > chrono::Utc::now());
}

#[tokio::test]
async fn reported_expiry_matches_the_signed_window() {
    let store = offline_store(false);
    let ttl = Duration::from_secs(900);
    let signed = store
        .signed_download_url("acme/2024/03/invoice/1709985600000-a.pdf", ttl)
        .await
        .unwrap();

    let amz_date = signed
        .url
        .split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("X-Amz-Date="))
        .expect("presigned URL carries its signing time");
    let signed_at = signed.expires_at - chrono::Duration::seconds(900);
    assert_eq!(amz_date, signed_at.format("%Y%m%dT%H%M%SZ").to_string());
}

#[tokio::test]
async fn ttl_is_validated_before_any_request() {
    let store = offline_store(true);
    for ttl in [Duration::ZERO, MAX_SIGNED_URL_TTL + Duration::from_secs(1)] {
        let err = store
            .signed_download_url("acme/a.pdf", ttl)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn malformed_keys_are_rejected_locally() {
    let store = offline_store(true);
    let metadata = BTreeMap::new();
    let err = store
        .upload(UploadRequest {
            key: "",
            body: b"%PDF-1.4",
            content_type: "application/pdf",
            metadata: &metadata,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey(_)));

    let err = store
        .signed_download_url("/leading/slash.pdf", Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey(_)));
}

#[tokio::test]
async fn unreachable_store_is_unavailable() {
    let store = offline_store(true);
    let metadata = BTreeMap::from([("client-id".to_string(), "acme".to_string())]);
    let err = store
        .upload(UploadRequest {
            key: "acme/2024/03/invoice/1-a.pdf",
            body: b"%PDF-1.4",
            content_type: "application/pdf",
            metadata: &metadata,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)), "got {err:?}");

    // Existence check runs first and hits the same dead endpoint.
    let err = store
        .signed_download_url("acme/2024/03/invoice/1-a.pdf", Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)), "got {err:?}");
}
