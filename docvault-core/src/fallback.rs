//! Fallback document: the always-constructible error artifact.
//!
//! The fallback carries a diagnostic token (`ERR-<epochMillis>-<8 hex>`) that is
//! also written to the logs, so a returned error document can be matched to
//! the failure that caused it.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::document::{build, DocumentModel, StyleConfig};
use crate::markdown::{LineKind, LineRecord};

pub const FALLBACK_TITLE: &str = "Document generation failed";

/// Token identifying one fallback render. Distinct per call.
pub fn diagnostic_token(now: DateTime<Utc>) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("ERR-{}-{}", now.timestamp_millis(), &nonce[..8])
}

/// Text lines of the fallback page, in order.
pub fn fallback_lines(token: &str, now: DateTime<Utc>) -> Vec<String> {
    vec![
        FALLBACK_TITLE.to_string(),
        "The requested document could not be rendered.".to_string(),
        format!("Reference: {token}"),
        format!(
            "Generated at {}",
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
    ]
}

/// Document model for the fallback page.
pub fn fallback_model(token: &str, now: DateTime<Utc>, styles: &StyleConfig) -> DocumentModel {
    let records: Vec<LineRecord> = fallback_lines(token, now)
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| {
            let kind = if ordinal == 0 {
                LineKind::Title
            } else {
                LineKind::Paragraph
            };
            LineRecord::new(kind, text, ordinal)
        })
        .collect();
    build(&records, styles)
}

/// Hand-assembled single-page PDF with Helvetica text. Used only when the
/// regular encoder cannot produce even the fallback page.
pub fn minimal_pdf(lines: &[String]) -> Vec<u8> {
    let mut content = String::from("BT\n/F1 12 Tf\n16 TL\n56 780 Td\n");
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", escape_literal(line)));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        tail.push_str(&format!("{offset:010} 00000 n \n"));
    }
    tail.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    out.extend_from_slice(tail.as_bytes());
    out
}

// ASCII only; anything else becomes '?'.
fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            ' '..='~' => escaped.push(c),
            _ => escaped.push('?'),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_distinct_even_within_one_millisecond() {
        let now = Utc::now();
        let a = diagnostic_token(now);
        let b = diagnostic_token(now);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("ERR-{}-", now.timestamp_millis())));
        assert_eq!(a.rsplit('-').next().map(str::len), Some(8));
    }

    #[test]
    fn fallback_model_mentions_token() {
        let now = Utc::now();
        let model = fallback_model("ERR-1-deadbeef", now, &StyleConfig::default());
        assert_eq!(model.title(), Some(FALLBACK_TITLE));
        assert!(model
            .blocks()
            .iter()
            .any(|b| b.text.contains("ERR-1-deadbeef")));
    }

    #[test]
    fn minimal_pdf_is_parseable_and_carries_text() {
        let bytes = minimal_pdf(&["Reference: ERR-5-0123abcd".to_string(), "(x) \u{2713}".to_string()]);
        assert!(bytes.starts_with(b"%PDF-1.4"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("ERR-5-0123abcd"));
        assert!(text.contains("\\(x\\) ?"));

        let doc = lopdf::Document::load_mem(&bytes).expect("minimal PDF should parse");
        assert_eq!(doc.get_pages().len(), 1);
    }
}
