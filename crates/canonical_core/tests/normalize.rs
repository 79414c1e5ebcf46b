use canonical_core::{normalize_url, normalize_url_bytes};
use pretty_assertions::assert_eq;

fn normalized(raw: &str) -> String {
    normalize_url(raw)
        .unwrap_or_else(|| panic!("expected {raw:?} to normalize"))
        .into_string()
}

#[test]
fn normalization_is_idempotent() {
    let inputs = [
        "http://example.com",
        "HTTP://Example.COM/a b?q=ü#frag",
        "http://bücher.de/straße?x=1&y=2",
        "https://news.example.com/article?utm=1#section",
        "https://example.com:8443/path/../other/",
        "http://user@example.com/%7Efoo",
    ];
    for raw in inputs {
        let once = normalized(raw);
        assert_eq!(normalized(&once), once, "not idempotent for {raw:?}");
    }
}

#[test]
fn host_is_lowercased_and_idna_encoded() {
    assert_eq!(normalized("http://Example.COM"), "http://example.com/");
    assert_eq!(
        normalized("http://bücher.de/straße"),
        "http://xn--bcher-kva.de/stra%C3%9Fe"
    );
}

#[test]
fn non_ascii_is_percent_encoded_and_fragment_dropped() {
    assert_eq!(
        normalized("HTTP://Example.COM/a b?q=ü#frag"),
        "http://example.com/a%20b?q=%C3%BC"
    );
}

#[test]
fn query_string_is_preserved_verbatim() {
    assert_eq!(
        normalized("http://news.example.com/article?utm=1&ref=tw#top"),
        "http://news.example.com/article?utm=1&ref=tw"
    );
}

#[test]
fn rejects_text_that_is_not_an_absolute_web_address() {
    assert_eq!(normalize_url("not a url"), None);
    assert_eq!(normalize_url(""), None);
    assert_eq!(normalize_url("/relative/path"), None);
    assert_eq!(normalize_url("//example.com/a"), None);
    assert_eq!(normalize_url("mailto:someone@example.com"), None);
    assert_eq!(normalize_url("ftp://example.com/file"), None);
    assert_eq!(normalize_url("http://exa mple.com/"), None);
}

#[test]
fn rejects_bytes_that_are_not_utf8() {
    assert_eq!(normalize_url_bytes(b"http://example.com/\xff\xfe"), None);
    assert_eq!(
        normalize_url_bytes(b"http://example.com/ok").map(|url| url.into_string()),
        Some("http://example.com/ok".to_string())
    );
}
