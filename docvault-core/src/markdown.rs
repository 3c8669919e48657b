//! Line classifier: splits markdown source into typed line records.
//!
//! Only three kinds of lines are recognised. `# ` opens a title, `## ` opens a
//! heading and every other non-blank line is a paragraph. Blank lines produce no
//! record. The prefix must start at column zero. `\n`, `\r\n` and a bare `\r`
//! all end a line.

use serde::Serialize;
use tracing::debug;

use crate::error::ClassifyError;

/// Kind of a classified source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Title,
    Heading,
    Paragraph,
}

/// A classified line. `ordinal` is the zero-based index of the source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRecord {
    pub kind: LineKind,
    pub content: String,
    pub ordinal: usize,
}

impl LineRecord {
    pub fn new(kind: LineKind, content: impl Into<String>, ordinal: usize) -> Self {
        Self {
            kind,
            content: content.into(),
            ordinal,
        }
    }
}

const TITLE_PREFIX: &str = "# ";
const HEADING_PREFIX: &str = "## ";

/// Classify every line of `source`, preserving order.
///
/// Fails with [`ClassifyError::InvalidInput`] when `source` is empty. Input that
/// consists only of whitespace is valid and yields no records.
pub fn classify(source: &str) -> Result<Vec<LineRecord>, ClassifyError> {
    if source.is_empty() {
        return Err(ClassifyError::InvalidInput(
            "markdown source must be a non-empty string".into(),
        ));
    }

    let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
    let records: Vec<LineRecord> = normalized
        .split('\n')
        .enumerate()
        .filter_map(|(ordinal, raw)| classify_line(raw, ordinal))
        .collect();

    debug!(
        lines = normalized.split('\n').count(),
        records = records.len(),
        "Classified markdown source"
    );
    Ok(records)
}

fn classify_line(line: &str, ordinal: usize) -> Option<LineRecord> {
    if line.trim().is_empty() {
        return None;
    }
    let record = if let Some(rest) = line.strip_prefix(TITLE_PREFIX) {
        LineRecord::new(LineKind::Title, rest.trim(), ordinal)
    } else if let Some(rest) = line.strip_prefix(HEADING_PREFIX) {
        LineRecord::new(LineKind::Heading, rest.trim(), ordinal)
    } else {
        LineRecord::new(LineKind::Paragraph, line.trim(), ordinal)
    };
    Some(record)
}
