//! Renderer: document model → PDF bytes, with a guaranteed fallback.
//!
//! Rendering is a two-path state machine. [`Renderer::attempt`] either yields
//! the primary document or a [`RenderFailure`]; [`Renderer::render_outcome`]
//! maps every failure onto the fallback document. The public entrypoint,
//! [`Renderer::render`], therefore returns a plain [`RenderResult`] and never
//! an error.
//!
//! The PDF backend sits behind the [`PdfEncoder`] trait so tests can force
//! library-level faults. Panics raised by an encoder are caught here.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use printpdf::{BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, Point, Pt, TextItem};
use tracing::{debug, error, info, warn};

use crate::config::RenderConfig;
use crate::document::{build, DocumentModel, FontFamily, FontWeight};
use crate::error::{ClassifyError, RenderFailure};
use crate::fallback::{diagnostic_token, fallback_lines, fallback_model, minimal_pdf};
use crate::layout::{lay_out, LaidOutDocument, PlacedLine};
use crate::markdown::classify;

const UNTITLED: &str = "Document";

/// Backend that serialises a laid-out document into PDF bytes.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait PdfEncoder: Send + Sync {
    fn encode(&self, document: &LaidOutDocument) -> Result<Vec<u8>, RenderFailure>;
}

/// [`PdfEncoder`] backed by `printpdf` with the builtin (non-embedded) fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintPdfEncoder;

impl PdfEncoder for PrintPdfEncoder {
    fn encode(&self, document: &LaidOutDocument) -> Result<Vec<u8>, RenderFailure> {
        let layout = document.page;
        let pages = document
            .pages
            .iter()
            .map(|page| {
                let ops = page
                    .lines
                    .iter()
                    .flat_map(|line| text_ops(line, layout.font))
                    .collect();
                PdfPage::new(Mm(layout.width_mm), Mm(layout.height_mm), ops)
            })
            .collect();

        let mut doc = PdfDocument::new(&document.title);
        let mut warnings = Vec::new();
        let bytes = doc
            .with_pages(pages)
            .save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings while saving");
        }
        Ok(bytes)
    }
}

fn builtin_font(family: FontFamily, weight: FontWeight) -> BuiltinFont {
    match (family, weight) {
        (FontFamily::Helvetica, FontWeight::Regular) => BuiltinFont::Helvetica,
        (FontFamily::Helvetica, FontWeight::Bold) => BuiltinFont::HelveticaBold,
        (FontFamily::Times, FontWeight::Regular) => BuiltinFont::TimesRoman,
        (FontFamily::Times, FontWeight::Bold) => BuiltinFont::TimesBold,
        (FontFamily::Courier, FontWeight::Regular) => BuiltinFont::Courier,
        (FontFamily::Courier, FontWeight::Bold) => BuiltinFont::CourierBold,
    }
}

fn text_ops(line: &PlacedLine, family: FontFamily) -> Vec<Op> {
    let font = builtin_font(family, line.weight);
    vec![
        Op::StartTextSection,
        Op::SetTextCursor {
            pos: Point {
                x: Pt(line.x_pt),
                y: Pt(line.y_pt),
            },
        },
        Op::SetFontSizeBuiltinFont {
            size: Pt(line.font_size),
            font,
        },
        Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(line.text.clone())],
            font,
        },
        Op::EndTextSection,
    ]
}

/// Encoded PDF plus its page count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Tagged result of one render: the primary document or the substituted fallback.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Primary(Rendered),
    Fallback {
        rendered: Rendered,
        diagnostic: String,
        cause: Option<RenderFailure>,
    },
}

/// What callers of the renderer see. `is_fallback` is true iff the primary
/// path failed and the error document was substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub buffer: Vec<u8>,
    pub is_fallback: bool,
    pub diagnostic: Option<String>,
    pub page_count: usize,
}

impl From<RenderOutcome> for RenderResult {
    fn from(outcome: RenderOutcome) -> Self {
        match outcome {
            RenderOutcome::Primary(rendered) => RenderResult {
                buffer: rendered.bytes,
                is_fallback: false,
                diagnostic: None,
                page_count: rendered.page_count,
            },
            RenderOutcome::Fallback {
                rendered,
                diagnostic,
                ..
            } => RenderResult {
                buffer: rendered.bytes,
                is_fallback: true,
                diagnostic: Some(diagnostic),
                page_count: rendered.page_count,
            },
        }
    }
}

pub struct Renderer<E = PrintPdfEncoder> {
    encoder: E,
    config: RenderConfig,
}

impl Renderer<PrintPdfEncoder> {
    pub fn new(config: RenderConfig) -> Self {
        Self::with_encoder(PrintPdfEncoder, config)
    }
}

impl Default for Renderer<PrintPdfEncoder> {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl<E: PdfEncoder> Renderer<E> {
    pub fn with_encoder(encoder: E, config: RenderConfig) -> Self {
        Self { encoder, config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Classify `source` and build its document model.
    pub fn build_model(&self, source: &str) -> Result<DocumentModel, ClassifyError> {
        let lines = classify(source)?;
        Ok(build(&lines, &self.config.styles))
    }

    /// Classify, build and render in one step. Only classification can fail;
    /// rendering always produces a document.
    pub fn render_markdown(&self, source: &str) -> Result<RenderResult, ClassifyError> {
        let model = self.build_model(source)?;
        Ok(self.render(&model))
    }

    pub fn render(&self, model: &DocumentModel) -> RenderResult {
        self.render_outcome(model).into()
    }

    pub fn render_outcome(&self, model: &DocumentModel) -> RenderOutcome {
        match self.attempt(model) {
            Ok(rendered) => {
                info!(
                    pages = rendered.page_count,
                    size = rendered.bytes.len(),
                    "Rendered document"
                );
                RenderOutcome::Primary(rendered)
            }
            Err(cause) => fallback_outcome(Some(cause)),
        }
    }

    /// Primary path. Any fault is returned, never raised.
    pub fn attempt(&self, model: &DocumentModel) -> Result<Rendered, RenderFailure> {
        let title = model.title().unwrap_or(UNTITLED);
        let laid_out = lay_out(model, title, self.config.max_pages)?;
        let bytes = encode_guarded(&self.encoder, &laid_out)?;
        Ok(Rendered {
            bytes,
            page_count: laid_out.page_count(),
        })
    }
}

/// Recovery path. Depends only on the current time and always succeeds.
pub fn render_fallback() -> RenderResult {
    fallback_outcome(None).into()
}

fn fallback_outcome(cause: Option<RenderFailure>) -> RenderOutcome {
    let now = Utc::now();
    let diagnostic = diagnostic_token(now);
    match &cause {
        Some(failure) => {
            error!(error = ?failure, diagnostic = %diagnostic, "Primary render failed, substituting fallback document")
        }
        None => warn!(diagnostic = %diagnostic, "Rendering fallback document"),
    }

    let config = RenderConfig::default();
    let model = fallback_model(&diagnostic, now, &config.styles);
    let rendered = lay_out(&model, crate::fallback::FALLBACK_TITLE, 1)
        .and_then(|laid_out| {
            let bytes = encode_guarded(&PrintPdfEncoder, &laid_out)?;
            Ok(Rendered {
                bytes,
                page_count: laid_out.page_count(),
            })
        })
        .unwrap_or_else(|failure| {
            error!(error = ?failure, diagnostic = %diagnostic, "Fallback encoder failed, using minimal PDF");
            Rendered {
                bytes: minimal_pdf(&fallback_lines(&diagnostic, now)),
                page_count: 1,
            }
        });

    RenderOutcome::Fallback {
        rendered,
        diagnostic,
        cause,
    }
}

fn encode_guarded<E: PdfEncoder + ?Sized>(
    encoder: &E,
    document: &LaidOutDocument,
) -> Result<Vec<u8>, RenderFailure> {
    let bytes = panic::catch_unwind(AssertUnwindSafe(|| encoder.encode(document)))
        .map_err(|payload| RenderFailure::Panicked(panic_message(payload.as_ref())))??;
    if bytes.is_empty() {
        return Err(RenderFailure::MalformedOutput("empty buffer".into()));
    }
    if !bytes.starts_with(b"%PDF") {
        return Err(RenderFailure::MalformedOutput(
            "missing %PDF header".into(),
        ));
    }
    Ok(bytes)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
