//! Storage key generation.
//!
//! Keys have the shape `<clientId>/<year>/<month>/<documentType>/<epochMillis>-<filename>`.
//! Year and month are taken from the timestamp in UTC. Given an explicit
//! timestamp the key is fully deterministic; omitting it uses the current time.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::StorageError;

/// Longest key S3-compatible stores accept, in bytes.
pub const MAX_KEY_LEN: usize = 1024;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex"));

/// A validated, hierarchical object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Validate an externally supplied key.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        if raw.is_empty() {
            return Err(StorageError::InvalidKey("key is empty".into()));
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(StorageError::InvalidKey(format!(
                "key is {} bytes, limit is {MAX_KEY_LEN}",
                raw.len()
            )));
        }
        if raw.starts_with('/') {
            return Err(StorageError::InvalidKey(format!(
                "key '{raw}' must not start with '/'"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(StorageError::InvalidKey(
                "key contains control characters".into(),
            ));
        }
        for segment in raw.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StorageError::InvalidKey(format!(
                    "key '{raw}' has an empty or relative path segment"
                )));
            }
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the key for one upload.
pub fn generate_key(
    client_id: &str,
    document_type: &str,
    filename: &str,
    timestamp: Option<DateTime<Utc>>,
) -> Result<StorageKey, StorageError> {
    validate_segment("client id", client_id)?;
    validate_segment("document type", document_type)?;
    if filename.trim().is_empty() {
        return Err(StorageError::InvalidKey("filename is empty".into()));
    }

    let at = timestamp.unwrap_or_else(Utc::now);
    let key = format!(
        "{client_id}/{:04}/{:02}/{document_type}/{}-{}",
        at.year(),
        at.month(),
        at.timestamp_millis(),
        sanitize_filename(filename)
    );
    StorageKey::parse(&key)
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(filename, "_").into_owned()
}

fn validate_segment(what: &str, value: &str) -> Result<(), StorageError> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidKey(format!("{what} is empty")));
    }
    if value.contains('/') {
        return Err(StorageError::InvalidKey(format!(
            "{what} '{value}' must not contain '/'"
        )));
    }
    if value == "." || value == ".." || value.chars().any(char::is_control) {
        return Err(StorageError::InvalidKey(format!(
            "{what} '{value}' is not a safe path segment"
        )));
    }
    Ok(())
}
