//! Layout: word-wraps blocks and flows them onto fixed-size pages.
//!
//! Overflow policy: content that does not fit continues on a new page of the
//! same size. A document that would need more than `max_pages` pages is a
//! [`RenderFailure::PageLimit`]. Widths are estimated from an average glyph
//! advance per font family, so wrapping is approximate but deterministic.

use tracing::debug;

use crate::document::{DocumentModel, FontWeight, PageLayout};
use crate::error::RenderFailure;

pub const PT_PER_MM: f32 = 72.0 / 25.4;

/// Fraction of the font size between the top of a line box and its baseline.
const ASCENT: f32 = 0.8;

/// A single line of text at an absolute position (points, origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x_pt: f32,
    pub y_pt: f32,
    pub font_size: f32,
    pub weight: FontWeight,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageContent {
    pub lines: Vec<PlacedLine>,
}

/// Fully positioned document, ready for a [`crate::render::PdfEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutDocument {
    pub title: String,
    pub page: PageLayout,
    pub pages: Vec<PageContent>,
}

impl LaidOutDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Lay out `model` onto at most `max_pages` pages.
pub fn lay_out(
    model: &DocumentModel,
    title: &str,
    max_pages: usize,
) -> Result<LaidOutDocument, RenderFailure> {
    let page = *model.page();
    let max_pages = max_pages.max(1);
    let margin = page.margin_mm * PT_PER_MM;
    let top = page.height_mm * PT_PER_MM - margin;
    let bottom = margin;
    let content_width = page.width_mm * PT_PER_MM - 2.0 * margin;

    if content_width <= 0.0 || top <= bottom {
        return Err(RenderFailure::Layout(format!(
            "margins of {}mm leave no content area on a {}x{}mm page",
            page.margin_mm, page.width_mm, page.height_mm
        )));
    }

    let mut pages = vec![PageContent::default()];
    let mut cursor = top;

    for block in model.blocks() {
        let style = block.style;
        let advance = style.line_advance();
        if advance <= 0.0 || advance > top - bottom {
            return Err(RenderFailure::Layout(format!(
                "line height {advance}pt does not fit the content area"
            )));
        }
        let glyph = style.font_size * page.font.average_advance(style.weight);
        let max_chars = ((content_width / glyph).floor() as usize).max(1);

        let page_has_content = pages.last().is_some_and(|p| !p.lines.is_empty());
        if page_has_content {
            cursor -= style.space_before;
        }

        for text in wrap(&sanitize(&block.text), max_chars) {
            if cursor - advance < bottom {
                if pages.len() >= max_pages {
                    return Err(RenderFailure::PageLimit { max: max_pages });
                }
                pages.push(PageContent::default());
                cursor = top;
            }
            cursor -= advance;
            let line = PlacedLine {
                text,
                x_pt: margin,
                y_pt: cursor + advance - ASCENT * style.font_size,
                font_size: style.font_size,
                weight: style.weight,
            };
            if let Some(current) = pages.last_mut() {
                current.lines.push(line);
            }
        }
        cursor -= style.space_after;
    }

    debug!(pages = pages.len(), blocks = model.blocks().len(), "Laid out document");
    Ok(LaidOutDocument {
        title: title.to_string(),
        page,
        pages,
    })
}

/// Replace characters the builtin (WinAnsi) fonts cannot show.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            c if c.is_control() => None,
            c if (c as u32) > 0xFF => Some('?'),
            c => Some(c),
        })
        .collect()
}

/// Greedy word wrap at `max_chars`; words longer than a line are hard-broken.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for chunk in chars.chunks(max_chars) {
            let chunk_len = chunk.len();
            let needed = if current_len == 0 {
                chunk_len
            } else {
                current_len + 1 + chunk_len
            };
            if needed > max_chars && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(chunk);
            current_len += chunk_len;
        }
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}
