use std::sync::LazyLock;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use engine_logging::{engine_debug, engine_trace};
use regex::bytes::Regex;

/// Below this many bytes of tag-free text, statistical detection is not attempted.
pub const MIN_DETECTION_SAMPLE: usize = 10;

/// Declared charsets replaced by the superset that actually decodes real pages.
const CHARSET_ALIASES: &[(&str, &str)] = &[
    ("ascii", "utf-8"),
    ("us-ascii", "utf-8"),
    ("big5", "big5-hkscs"),
    ("gb2312", "gb18030"),
    ("maccyrillic", "windows-1251"),
    ("win1251", "windows-1251"),
    ("win-1251", "windows-1251"),
    ("cp1251", "windows-1251"),
];

#[allow(clippy::expect_used)]
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    // Covers both `<meta charset=..>` and `<meta http-equiv .. content="..; charset=..">`.
    Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#)
        .expect("meta charset regex is valid")
});

#[allow(clippy::expect_used)]
static XML_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)\A\s*<\?xml[^>]*?encoding\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#)
        .expect("xml prolog regex is valid")
});

#[allow(clippy::expect_used)]
static TAG_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)(\s*</?[^>]*>)+\s*").expect("tag run regex is valid")
});

/// Which step of the cascade produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    ByteOrderMark,
    Declared,
    InDocument,
    Detected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPage {
    pub text: String,
    pub encoding_label: String,
    pub strategy: DecodeStrategy,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no declared charset decodes the page and {sample_len} bytes of text are too few to detect one")]
    Undetectable { sample_len: usize },
}

/// Decode fetched bytes into text.
///
/// Cascade, first success wins: byte-order mark, header charset (strict),
/// in-document `<meta>`/`<?xml?>` declarations in document order (strict),
/// then statistical detection on the tag-free text with replacement of
/// undecodable sequences.
pub fn decode_page(bytes: &[u8], declared_charset: Option<&str>) -> Result<DecodedPage, DecodeError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        if let Some(page) = decode_strict(&bytes[bom_len..], encoding, DecodeStrategy::ByteOrderMark) {
            return Ok(page);
        }
    }

    if let Some(label) = declared_charset {
        match encoding_for(label) {
            Some(encoding) => {
                if let Some(page) = decode_strict(bytes, encoding, DecodeStrategy::Declared) {
                    return Ok(page);
                }
                engine_debug!("header charset {} failed to decode", label);
            }
            None => engine_debug!("header charset {} is unknown", label),
        }
    }

    for label in declared_encodings(bytes) {
        if let Some(page) = encoding_for(&label)
            .and_then(|encoding| decode_strict(bytes, encoding, DecodeStrategy::InDocument))
        {
            return Ok(page);
        }
        engine_trace!("in-document charset {} failed to decode", label);
    }

    let sample = text_sample(bytes);
    if sample.len() < MIN_DETECTION_SAMPLE {
        return Err(DecodeError::Undetectable {
            sample_len: sample.len(),
        });
    }
    let mut detector = EncodingDetector::new();
    detector.feed(&sample, true);
    let encoding = detector.guess(None, true);
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        engine_debug!("detected {} decoded with replacements", encoding.name());
    }
    Ok(DecodedPage {
        text: text.into_owned(),
        encoding_label: encoding.name().to_string(),
        strategy: DecodeStrategy::Detected,
    })
}

/// Apply the alias table to a charset label.
pub fn normalize_charset(label: &str) -> String {
    let label = label.trim().trim_matches(['"', '\'']).trim().to_ascii_lowercase();
    CHARSET_ALIASES
        .iter()
        .find(|(alias, _)| *alias == label)
        .map(|(_, target)| target.to_string())
        .unwrap_or(label)
}

/// Charset declarations found in the markup, in document order, aliases applied.
pub fn declared_encodings(bytes: &[u8]) -> Vec<String> {
    let mut found: Vec<(usize, String)> = META_CHARSET
        .captures_iter(bytes)
        .chain(XML_ENCODING.captures_iter(bytes))
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| {
            std::str::from_utf8(m.as_bytes())
                .ok()
                .map(|label| (m.start(), normalize_charset(label)))
        })
        .collect();
    found.sort_by_key(|(position, _)| *position);

    let mut labels: Vec<String> = Vec::with_capacity(found.len());
    for (_, label) in found {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}

fn encoding_for(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(normalize_charset(label).as_bytes())
}

fn decode_strict(
    bytes: &[u8],
    encoding: &'static Encoding,
    strategy: DecodeStrategy,
) -> Option<DecodedPage> {
    let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    Some(DecodedPage {
        text: text.into_owned(),
        encoding_label: encoding.name().to_string(),
        strategy,
    })
}

fn text_sample(bytes: &[u8]) -> Vec<u8> {
    TAG_RUN.replace_all(bytes, &b" "[..]).trim_ascii().to_vec()
}
