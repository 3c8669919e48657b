//! Invocation handler: one request in, one uniform response envelope out.
//!
//! A request body is a JSON object with an optional `markdown` string. Missing,
//! empty or non-string `markdown` renders [`DEFAULT_MARKDOWN`] instead, so the
//! endpoint succeeds for any well-formed JSON body. A render that fell back to
//! the error document is still a transport-level success with `isError: true`.
//! Only a body that is not JSON at all yields a failure envelope.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::metrics::{InvocationMetrics, MemoryProbe, MetricsRecorder, ProcStatusProbe};
use crate::render::{render_fallback, PdfEncoder, PrintPdfEncoder, RenderResult, Renderer};

pub const DEFAULT_MARKDOWN: &str = "# Sample Document\n\
\n\
This document was generated from the default template because the request did not include any markdown.\n\
\n\
## Next steps\n\
\n\
Send a JSON body with a markdown field to render your own content.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessEnvelope {
    pub success: bool,
    pub pdf_size: usize,
    pub pdf_base64: String,
    pub is_error: bool,
    pub metrics: InvocationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEnvelope {
    pub success: bool,
    pub error: String,
    #[serde(skip)]
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success(SuccessEnvelope),
    Failure(FailureEnvelope),
}

impl ResponseEnvelope {
    fn failure(status: u16, error: impl Into<String>) -> Self {
        ResponseEnvelope::Failure(FailureEnvelope {
            success: false,
            error: error.into(),
            status,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success(_))
    }

    /// HTTP-equivalent status of the envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            ResponseEnvelope::Success(_) => 200,
            ResponseEnvelope::Failure(f) => f.status,
        }
    }
}

pub struct InvocationHandler<E = PrintPdfEncoder> {
    renderer: Renderer<E>,
    probe: Box<dyn MemoryProbe>,
}

impl Default for InvocationHandler<PrintPdfEncoder> {
    fn default() -> Self {
        Self::new(Renderer::default())
    }
}

impl<E: PdfEncoder> InvocationHandler<E> {
    pub fn new(renderer: Renderer<E>) -> Self {
        Self {
            renderer,
            probe: Box::new(ProcStatusProbe),
        }
    }

    pub fn with_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn handle(&self, body: &str) -> ResponseEnvelope {
        let recorder = MetricsRecorder::start(self.probe.as_ref());

        let markdown = match extract_markdown(body) {
            Ok(markdown) => markdown,
            Err(e) => {
                error!(error = %e, "Request body is not valid JSON");
                return ResponseEnvelope::failure(400, format!("Invalid request body: {e}"));
            }
        };

        let result = self.render_or_default(&markdown);
        let metrics = recorder.finish();
        info!(
            pdf_size = result.buffer.len(),
            is_error = result.is_fallback,
            processing_time_ms = metrics.processing_time_ms,
            "Invocation completed"
        );

        ResponseEnvelope::Success(SuccessEnvelope {
            success: true,
            pdf_size: result.buffer.len(),
            pdf_base64: STANDARD.encode(&result.buffer),
            is_error: result.is_fallback,
            metrics,
        })
    }

    fn render_or_default(&self, markdown: &str) -> RenderResult {
        match self.renderer.render_markdown(markdown) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Markdown rejected, rendering default document");
                self.renderer
                    .render_markdown(DEFAULT_MARKDOWN)
                    .unwrap_or_else(|_| render_fallback())
            }
        }
    }
}

/// Handle one request with the default renderer and memory probe.
pub fn handle(body: &str) -> ResponseEnvelope {
    InvocationHandler::default().handle(body)
}

/// Markdown to render for `body`; the default text when none is usable.
pub fn extract_markdown(body: &str) -> Result<String, serde_json::Error> {
    if body.trim().is_empty() {
        debug!("Empty request body, using default markdown");
        return Ok(DEFAULT_MARKDOWN.to_string());
    }
    let value: Value = serde_json::from_str(body)?;
    match value.get("markdown").and_then(Value::as_str) {
        Some(markdown) if !markdown.trim().is_empty() => Ok(markdown.to_string()),
        _ => {
            debug!("Request has no usable markdown field, using default markdown");
            Ok(DEFAULT_MARKDOWN.to_string())
        }
    }
}
