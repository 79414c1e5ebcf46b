use canonical_engine::{
    decode_page, CanonicalExtractor, CanonicalSource, DecodeError, DecodeStrategy, Extractor,
};
use pretty_assertions::assert_eq;

fn extractor() -> CanonicalExtractor {
    CanonicalExtractor::new().expect("selectors compile")
}

#[test]
fn byte_order_mark_beats_a_wrong_header() {
    let mut page = vec![0xEF, 0xBB, 0xBF];
    page.extend_from_slice("<p>café</p>".as_bytes());

    let decoded = decode_page(&page, Some("iso-8859-1")).expect("decodes");

    assert_eq!(decoded.strategy, DecodeStrategy::ByteOrderMark);
    assert_eq!(decoded.text, "<p>café</p>");
}

#[test]
fn header_charset_is_tried_first() {
    let decoded = decode_page(b"<p>caf\xe9</p>", Some("ISO-8859-1")).expect("decodes");

    assert_eq!(decoded.strategy, DecodeStrategy::Declared);
    assert_eq!(decoded.text, "<p>café</p>");
}

#[test]
fn in_document_declaration_rescues_a_lying_header() {
    let page = b"<html><head><meta charset=\"windows-1252\"></head><body>caf\xe9</body></html>";

    let decoded = decode_page(page, Some("utf-8")).expect("decodes");

    assert_eq!(decoded.strategy, DecodeStrategy::InDocument);
    assert_eq!(decoded.encoding_label, "windows-1252");
    assert!(decoded.text.contains("café"));
}

#[test]
fn aliased_declaration_decodes_with_the_superset() {
    let page = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=win-1251\">\xcf\xf0\xe8\xe2\xe5\xf2";

    let decoded = decode_page(page, None).expect("decodes");

    assert_eq!(decoded.encoding_label, "windows-1251");
    assert!(decoded.text.ends_with("Привет"));
}

#[test]
fn undeclared_pages_fall_back_to_detection() {
    let mut page = b"<html><body><p>".to_vec();
    let (encoded, _, _) = encoding_rs::WINDOWS_1251
        .encode("Это обычная страница новостей без объявленной кодировки");
    page.extend_from_slice(&encoded);
    page.extend_from_slice(b"</p></body></html>");

    let decoded = decode_page(&page, None).expect("decodes");

    assert_eq!(decoded.strategy, DecodeStrategy::Detected);
    assert!(!decoded.text.is_empty());
}

#[test]
fn tiny_undeclared_text_is_not_guessed() {
    let page = b"<html><body>\xe9t\xe9</body></html>";

    assert_eq!(
        decode_page(page, None),
        Err(DecodeError::Undetectable { sample_len: 3 })
    );
}

#[test]
fn bad_headers_do_not_rescue_an_undetectable_page() {
    for header in [None, Some("no-such-charset"), Some("utf-8")] {
        let result = decode_page(b"<b>\xff\xfe\xfd</b>", header);
        assert!(result.is_err(), "header {header:?} produced {result:?}");
    }
}

#[test]
fn canonical_link_beats_open_graph() {
    let html = r#"<html><head>
        <meta property="og:url" content="http://example.com/og">
        <link rel="canonical" href="http://example.com/canonical">
    </head></html>"#;

    let found = extractor().extract(html).expect("canonical found");

    assert_eq!(found.url.as_str(), "http://example.com/canonical");
    assert_eq!(found.source, CanonicalSource::LinkRel);
}

#[test]
fn rel_tokens_match_case_insensitively() {
    let html = r#"<link rel="alternate" href="http://example.com/amp">
        <link rel="Canonical shortlink" href="http://Example.com/story#top">"#;

    let found = extractor().extract(html).expect("canonical found");

    assert_eq!(found.url.as_str(), "http://example.com/story");
}

#[test]
fn invalid_canonical_falls_through_to_open_graph() {
    let html = r#"<link rel="canonical" href="javascript:void(0)">
        <meta property="og:url" content=" https://example.com/og ">"#;

    let found = extractor().extract(html).expect("og found");

    assert_eq!(found.url.as_str(), "https://example.com/og");
    assert_eq!(found.source, CanonicalSource::OpenGraph);
}

#[test]
fn relative_or_missing_candidates_are_absent() {
    let ex = extractor();
    assert_eq!(ex.extract(r#"<link rel="canonical" href="/story">"#), None);
    assert_eq!(ex.extract(r#"<link rel="canonical" href="">"#), None);
    assert_eq!(ex.extract("<html><head><title>t</title></head></html>"), None);
    assert_eq!(ex.extract(""), None);
}

#[test]
fn self_check_passes() {
    assert_eq!(extractor().self_check(), Ok(()));
}
