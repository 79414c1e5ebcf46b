use canonical_core::{normalize_url, NormalizedUrl};
use engine_logging::engine_debug;
use scraper::{Html, Selector};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("html backend unavailable: {0}")]
    Backend(String),
}

/// Where the canonical address was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalSource {
    LinkRel,
    OpenGraph,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCanonical {
    pub url: NormalizedUrl,
    pub source: CanonicalSource,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> Option<ExtractedCanonical>;
}

/// Reads the page's declared identity:
/// - the first `<link rel="canonical">` with an `href`
/// - otherwise the first `<meta property="og:url">` with a `content`.
///
/// A candidate that does not validate counts as absent.
#[derive(Debug)]
pub struct CanonicalExtractor {
    link_sel: Selector,
    og_sel: Selector,
}

const SELF_CHECK_PAGE: &str = r#"<html><head><link rel="canonical" href="http://example.com/"></head></html>"#;

impl CanonicalExtractor {
    pub fn new() -> Result<Self, ExtractError> {
        let link_sel =
            Selector::parse("link[rel][href]").map_err(|err| ExtractError::Backend(err.to_string()))?;
        let og_sel = Selector::parse(r#"meta[property="og:url"][content]"#)
            .map_err(|err| ExtractError::Backend(err.to_string()))?;
        Ok(Self { link_sel, og_sel })
    }

    /// Parses a known page; run once at startup so a broken backend is fatal there.
    pub fn self_check(&self) -> Result<(), ExtractError> {
        match self.extract(SELF_CHECK_PAGE) {
            Some(found) if found.url.as_str() == "http://example.com/" => Ok(()),
            other => Err(ExtractError::Backend(format!(
                "self-check page yielded {other:?}"
            ))),
        }
    }

    fn canonical_link(&self, doc: &Html) -> Option<NormalizedUrl> {
        let href = doc
            .select(&self.link_sel)
            .find(|link| link.value().attr("rel").is_some_and(is_canonical_rel))?
            .value()
            .attr("href")?;
        validated(href, "canonical link")
    }

    fn open_graph_url(&self, doc: &Html) -> Option<NormalizedUrl> {
        let content = doc.select(&self.og_sel).next()?.value().attr("content")?;
        validated(content, "og:url")
    }
}

impl Extractor for CanonicalExtractor {
    fn extract(&self, html: &str) -> Option<ExtractedCanonical> {
        let doc = Html::parse_document(html);
        if let Some(url) = self.canonical_link(&doc) {
            return Some(ExtractedCanonical {
                url,
                source: CanonicalSource::LinkRel,
            });
        }
        self.open_graph_url(&doc).map(|url| ExtractedCanonical {
            url,
            source: CanonicalSource::OpenGraph,
        })
    }
}

fn is_canonical_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| token.eq_ignore_ascii_case("canonical"))
}

fn validated(candidate: &str, origin: &str) -> Option<NormalizedUrl> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    let url = normalize_url(candidate);
    if url.is_none() {
        engine_debug!("bad {} url: {}", origin, candidate);
    }
    url
}
