/// `load_config` module: reads the static YAML config and merges in the
/// environment-provided bucket.
///
/// The YAML file never holds secrets. AWS credentials come from the default
/// AWS provider chain and the bucket name from `DOCVAULT_BUCKET`, so the same
/// file can be shared between environments.
///
/// ```yaml
/// render:
///   max_pages: 50
/// storage:
///   region: eu-west-1
///   endpoint: http://localhost:9000   # optional, S3-compatible stores
///   verify_existence: true
///   default_ttl_secs: 86400
/// ```
///
/// All errors are `anyhow::Error` with context and surface at the CLI boundary.
use anyhow::{anyhow, Context, Result};
use docvault_core::config::RenderConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::s3::StorageSettings;

pub const BUCKET_ENV: &str = "DOCVAULT_BUCKET";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub render: RenderConfig,
    pub storage: StorageSettings,
    /// Injected from [`BUCKET_ENV`], never read from the file.
    #[serde(skip)]
    pub bucket: Option<String>,
}

impl CliConfig {
    /// Defaults plus whatever the environment provides.
    pub fn from_env() -> Self {
        Self {
            bucket: bucket_from_env(),
            ..Self::default()
        }
    }

    pub fn bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| anyhow!("{BUCKET_ENV} must be set to the target bucket name"))
    }

    /// TTL for signed URLs when the command line does not give one.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.storage.default_ttl_secs)
    }
}

/// Loads a static YAML config file and injects the bucket from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let mut config: CliConfig = if config_content.trim().is_empty() {
        CliConfig::default()
    } else {
        serde_yaml::from_str(&config_content)
            .map_err(|e| {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                e
            })
            .with_context(|| format!("Failed to parse config YAML {:?}", path_ref))?
    };
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    config.bucket = bucket_from_env();
    config.render.trace_loaded();
    config.storage.trace_loaded();
    Ok(config)
}

/// [`load_config`] when a path is given, [`CliConfig::from_env`] otherwise.
pub fn load_optional<P: AsRef<Path>>(path: Option<P>) -> Result<CliConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            info!("No config file given, using defaults");
            Ok(CliConfig::from_env())
        }
    }
}

fn bucket_from_env() -> Option<String> {
    std::env::var(BUCKET_ENV)
        .ok()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
}
