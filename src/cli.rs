///
/// This module implements the CLI interface for docvault: command parsing,
/// argument validation and the async entrypoint used by `main` and the tests.
///
/// All document logic (classification, layout, rendering, keys, publishing)
/// lives in the [`docvault-core`] crate. This module only wires files, stdin
/// and stdout to it and picks the object store.
///
/// ## Commands
/// - `render`: markdown file → PDF file.
/// - `invoke`: JSON request body (file or stdin) → response envelope on stdout.
/// - `publish`: markdown file → versioned upload + signed download URL.
/// - `sign`: existing key → signed download URL.
/// - `fetch`: signed URL → local file.
///
/// [`docvault-core`]: ../../docvault-core/
use crate::load_config::{load_optional, CliConfig};
use crate::s3::S3ObjectStore;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use docvault_core::contract::{ObjectStore, UploadMetadata};
use docvault_core::handler::InvocationHandler;
use docvault_core::publish::{publish, PublishRequest};
use docvault_core::render::Renderer;
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI for docvault: render markdown to PDF and publish it behind signed links.
#[derive(Parser)]
#[clap(
    name = "docvault",
    version,
    about = "Render markdown documents to PDF, store them and issue time-limited download links"
)]
pub struct Cli {
    /// Emit logs as JSON lines instead of human-readable text
    #[clap(long, global = true)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a markdown file to a PDF file
    Render {
        /// Markdown source file
        #[clap(long)]
        input: PathBuf,
        /// Destination PDF file
        #[clap(long)]
        output: PathBuf,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Handle one request body and print the response envelope as JSON
    Invoke {
        /// File holding the JSON request body; reads stdin when omitted
        #[clap(long)]
        body: Option<PathBuf>,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Render a markdown file, upload it and print a signed download URL
    Publish {
        #[clap(long)]
        input: PathBuf,
        #[clap(long)]
        client_id: String,
        #[clap(long)]
        document_type: String,
        /// Name used in the storage key; defaults to the input file name
        #[clap(long)]
        filename: Option<String>,
        /// Extra object metadata as KEY=VALUE, repeatable
        #[clap(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
        /// Validity of the signed URL in seconds
        #[clap(long)]
        ttl_secs: Option<u64>,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Issue a signed download URL for an existing key
    Sign {
        #[clap(long)]
        key: String,
        #[clap(long)]
        ttl_secs: Option<u64>,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Download a signed URL to a local file
    Fetch {
        #[clap(long)]
        url: String,
        #[clap(long)]
        output: PathBuf,
    },
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Render {
            input,
            output,
            config,
        } => {
            let config = load_optional(config)?;
            let markdown = read_text(&input)?;
            let renderer = Renderer::new(config.render);
            let result = renderer
                .render_markdown(&markdown)
                .with_context(|| format!("Cannot render {:?}", input))?;
            std::fs::write(&output, &result.buffer)
                .with_context(|| format!("Failed to write PDF to {:?}", output))?;

            tracing::info!(
                command = "render",
                pages = result.page_count,
                size = result.buffer.len(),
                is_fallback = result.is_fallback,
                "Render complete"
            );
            if let Some(diagnostic) = &result.diagnostic {
                eprintln!("Rendering failed, wrote fallback document (diagnostic {diagnostic})");
            }
            println!(
                "Wrote {} page(s), {} bytes to {}",
                result.page_count,
                result.buffer.len(),
                output.display()
            );
            Ok(())
        }
        Commands::Invoke { body, config } => {
            let config = load_optional(config)?;
            let body = match body {
                Some(path) => read_text(&path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read request body from stdin")?;
                    buf
                }
            };
            let handler = InvocationHandler::new(Renderer::new(config.render));
            let envelope = handler.handle(&body);
            println!("{}", serde_json::to_string(&envelope)?);
            if !envelope.is_success() {
                bail!("Request rejected with status {}", envelope.status_code());
            }
            Ok(())
        }
        Commands::Publish {
            input,
            client_id,
            document_type,
            filename,
            metadata,
            ttl_secs,
            config,
        } => {
            let config = load_optional(config)?;
            let markdown = read_text(&input)?;
            let filename = match filename {
                Some(name) => name,
                None => default_filename(&input)?,
            };
            let store = s3_store(&config).await?;
            let renderer = Renderer::new(config.render.clone());

            let mut req = PublishRequest::new(&client_id, &document_type, &filename, &markdown);
            req.metadata = metadata.into_iter().collect::<UploadMetadata>();
            req.ttl = ttl_or_default(ttl_secs, &config);

            tracing::info!(command = "publish", client_id = %client_id, "Starting publish");
            match publish(&renderer, &store, req).await {
                Ok(report) => {
                    tracing::info!(command = "publish", key = %report.key, "Publish complete");
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "publish", error = %e, "Publish failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Sign {
            key,
            ttl_secs,
            config,
        } => {
            let config = load_optional(config)?;
            let store = s3_store(&config).await?;
            let ttl = ttl_or_default(ttl_secs, &config);
            let signed = store
                .signed_download_url(&key, ttl)
                .await
                .map_err(|e| anyhow!("Cannot sign {key}: {e}"))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "key": key,
                    "url": signed.url,
                    "expiresAt": signed.expires_at,
                }))?
            );
            Ok(())
        }
        Commands::Fetch { url, output } => {
            tracing::info!(command = "fetch", "Downloading signed URL");
            let response = reqwest::get(&url)
                .await
                .context("Download request failed")?
                .error_for_status()
                .context("Store refused the download")?;
            let bytes = response.bytes().await.context("Failed to read body")?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write {:?}", output))?;
            tracing::info!(command = "fetch", size = bytes.len(), "Download complete");
            println!("Wrote {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
    }
}

async fn s3_store(config: &CliConfig) -> Result<S3ObjectStore> {
    let bucket = config.bucket()?;
    Ok(S3ObjectStore::from_settings(bucket, &config.storage).await)
}

fn ttl_or_default(ttl_secs: Option<u64>, config: &CliConfig) -> Duration {
    ttl_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.default_ttl())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

fn default_filename(input: &Path) -> Result<String> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Cannot derive a filename from {:?}", input))?;
    Ok(format!("{stem}.pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metadata_pairs() {
        assert_eq!(
            parse_key_value("document-number=0042").unwrap(),
            ("document-number".to_string(), "0042".to_string())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn default_filename_uses_stem() {
        assert_eq!(
            default_filename(Path::new("/tmp/Invoice 7.md")).unwrap(),
            "Invoice 7.pdf"
        );
    }

    #[test]
    fn cli_parses_publish() {
        let cli = Cli::parse_from([
            "docvault",
            "publish",
            "--input",
            "doc.md",
            "--client-id",
            "acme",
            "--document-type",
            "invoice",
            "--meta",
            "document-number=1",
            "--ttl-secs",
            "600",
        ]);
        match cli.command {
            Commands::Publish {
                metadata, ttl_secs, ..
            } => {
                assert_eq!(metadata.len(), 1);
                assert_eq!(ttl_secs, Some(600));
            }
            _ => panic!("expected publish"),
        }
    }
}
