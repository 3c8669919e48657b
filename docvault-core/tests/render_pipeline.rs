use docvault_core::config::RenderConfig;
use docvault_core::error::RenderFailure;
use docvault_core::markdown::{classify, LineKind};
use docvault_core::render::{render_fallback, MockPdfEncoder, Renderer};

fn page_text(pdf: &[u8]) -> String {
    lopdf::Document::load_mem(pdf)
        .expect("output should parse as PDF")
        .extract_text(&[1])
        .expect("first page text is extractable")
}

#[test]
fn test_markdown_renders_to_single_page_pdf() {
    let renderer = Renderer::default();
    let result = renderer
        .render_markdown("# Invoice 2024-001\n\n## Line items\n\nConsulting, 10 hours\nTotal: 1,200 EUR")
        .expect("non-empty markdown should classify");

    assert!(!result.is_fallback, "Primary render should succeed");
    assert!(result.buffer.len() > 100, "Content should be a non-empty PDF");
    assert_eq!(&result.buffer[0..4], b"%PDF", "PDF missing magic header");

    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), &result.buffer).unwrap();
    let doc = lopdf::Document::load(file.path()).expect("output should parse as PDF");
    assert_eq!(doc.get_pages().len(), 1);
}

#[test]
fn test_long_document_flows_onto_additional_pages() {
    let renderer = Renderer::default();
    let mut source = String::from("# Terms and conditions\n");
    for clause in 0..150 {
        source.push_str(&format!(
            "Clause {clause}: the supplier delivers the goods described in the order within the agreed period.\n"
        ));
    }
    let result = renderer.render_markdown(&source).unwrap();

    assert!(!result.is_fallback);
    assert!(result.page_count > 1, "Expected overflow onto extra pages");
    let doc = lopdf::Document::load_mem(&result.buffer).expect("output should parse as PDF");
    assert_eq!(doc.get_pages().len(), result.page_count);
}

#[test]
fn test_forced_encoder_fault_yields_distinct_fallbacks() {
    let mut encoder = MockPdfEncoder::new();
    encoder
        .expect_encode()
        .times(2)
        .returning(|_| Err(RenderFailure::Encoder("simulated library fault".into())));
    let renderer = Renderer::with_encoder(encoder, RenderConfig::default());
    let model = renderer.build_model("# Proposal\nScope of work").unwrap();

    let first = renderer.render(&model);
    let second = renderer.render(&model);

    for result in [&first, &second] {
        assert!(result.is_fallback);
        assert!(!result.buffer.is_empty());
        assert_eq!(&result.buffer[0..4], b"%PDF");
        let token = result.diagnostic.as_deref().expect("fallback carries a token");
        assert!(token.starts_with("ERR-"), "unexpected token {token}");
        let text = page_text(&result.buffer);
        assert!(text.contains(token), "token {token} missing from page text: {text}");
    }
    assert_ne!(first.diagnostic, second.diagnostic);
}

#[test]
fn test_render_fallback_is_a_valid_one_page_pdf() {
    let result = render_fallback();
    assert!(result.is_fallback);
    let doc = lopdf::Document::load_mem(&result.buffer).expect("fallback should parse as PDF");
    assert_eq!(doc.get_pages().len(), 1);

    let text = page_text(&result.buffer);
    assert!(text.contains("Document generation failed"));
    let token = result.diagnostic.expect("fallback carries a token");
    assert!(text.contains(&token), "token {token} missing from page text: {text}");
}

#[test]
fn test_classifier_contract() {
    let records = classify("# Title\n\nBody line").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, LineKind::Title);
    assert_eq!(records[0].content, "Title");
    assert_eq!(records[1].kind, LineKind::Paragraph);
    assert_eq!(records[1].content, "Body line");
    assert!(records[0].ordinal < records[1].ordinal);

    assert!(classify("").is_err());
}

#[test]
fn test_blank_markdown_renders_empty_page() {
    let renderer = Renderer::default();
    let result = renderer.render_markdown("\n   \n").unwrap();
    assert!(!result.is_fallback);
    assert_eq!(result.page_count, 1);
}
