//! Document model: classified lines mapped onto fixed style presets.
//!
//! The builder is a pure function of `(lines, styles)`. Style and page presets
//! live in [`StyleConfig`], which is passed in explicitly instead of being read
//! from globals.

use serde::{Deserialize, Serialize};

use crate::markdown::{LineKind, LineRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Regular,
    Bold,
}

/// Builtin PDF font families. Only these are available without embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Average glyph advance as a fraction of the font size.
    pub fn average_advance(self, weight: FontWeight) -> f32 {
        let base = match self {
            FontFamily::Helvetica => 0.5,
            FontFamily::Times => 0.45,
            FontFamily::Courier => 0.6,
        };
        match (self, weight) {
            (FontFamily::Courier, _) => base,
            (_, FontWeight::Bold) => base + 0.05,
            (_, FontWeight::Regular) => base,
        }
    }
}

/// Typography for one block kind. Sizes and spacing are in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f32,
    pub weight: FontWeight,
    pub space_before: f32,
    pub space_after: f32,
    /// Line height as a multiple of `font_size`.
    pub line_height: f32,
}

impl TextStyle {
    pub fn line_advance(&self) -> f32 {
        self.font_size * self.line_height
    }
}

/// Page geometry in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
    pub font: FontFamily,
}

impl PageLayout {
    pub const A4: PageLayout = PageLayout {
        width_mm: 210.0,
        height_mm: 297.0,
        margin_mm: 20.0,
        font: FontFamily::Helvetica,
    };
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::A4
    }
}

/// Named presets for each line kind plus the page layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub title: TextStyle,
    pub heading: TextStyle,
    pub paragraph: TextStyle,
    pub page: PageLayout,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            title: TextStyle {
                font_size: 24.0,
                weight: FontWeight::Bold,
                space_before: 0.0,
                space_after: 10.0,
                line_height: 1.2,
            },
            heading: TextStyle {
                font_size: 18.0,
                weight: FontWeight::Bold,
                space_before: 15.0,
                space_after: 8.0,
                line_height: 1.2,
            },
            paragraph: TextStyle {
                font_size: 12.0,
                weight: FontWeight::Regular,
                space_before: 0.0,
                space_after: 8.0,
                line_height: 1.4,
            },
            page: PageLayout::A4,
        }
    }
}

impl StyleConfig {
    pub fn style_for(&self, kind: LineKind) -> TextStyle {
        match kind {
            LineKind::Title => self.title,
            LineKind::Heading => self.heading,
            LineKind::Paragraph => self.paragraph,
        }
    }
}

/// One styled run of text, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: LineKind,
    pub text: String,
    pub style: TextStyle,
    pub ordinal: usize,
}

/// Immutable, per-request document model.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModel {
    blocks: Vec<Block>,
    page: PageLayout,
}

impl DocumentModel {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn page(&self) -> &PageLayout {
        &self.page
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Text of the first title block, used as the PDF document title.
    pub fn title(&self) -> Option<&str> {
        self.blocks
            .iter()
            .find(|b| b.kind == LineKind::Title && !b.text.is_empty())
            .map(|b| b.text.as_str())
    }
}

/// Map classified lines onto style blocks. Never fails.
pub fn build(lines: &[LineRecord], styles: &StyleConfig) -> DocumentModel {
    let blocks = lines
        .iter()
        .map(|line| Block {
            kind: line.kind,
            text: line.content.clone(),
            style: styles.style_for(line.kind),
            ordinal: line.ordinal,
        })
        .collect();
    DocumentModel {
        blocks,
        page: styles.page,
    }
}
