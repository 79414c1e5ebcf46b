use std::fmt;

use serde::{Deserialize, Serialize};

use crate::NormalizedUrl;

/// How the reported URL was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Original,
    Redirect,
    Canonical,
}

/// Why the resolution stopped where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    #[serde(rename = "invalid url")]
    InvalidUrl,
    #[serde(rename = "not in lists")]
    NotInLists,
    #[serde(rename = "not in whitelist")]
    NotInWhitelist,
    #[serde(rename = "no content")]
    NoContent,
    #[serde(rename = "decode failed")]
    DecodeFailed,
    #[serde(rename = "no attributes")]
    NoAttributes,
    #[serde(rename = "canonical")]
    Canonical,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::InvalidUrl => "invalid url",
            Reason::NotInLists => "not in lists",
            Reason::NotInWhitelist => "not in whitelist",
            Reason::NoContent => "no content",
            Reason::DecodeFailed => "decode failed",
            Reason::NoAttributes => "no attributes",
            Reason::Canonical => "canonical",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal record for one submitted URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(rename = "url_original")]
    pub original: String,
    #[serde(rename = "url_retrieved")]
    pub retrieved: Option<String>,
    pub method: Method,
    pub reason: Reason,
    /// Fetcher-level cause behind a `no content` or `not in whitelist` outcome.
    #[serde(skip)]
    pub fetch_failure: Option<FetchFailure>,
}

impl Resolution {
    pub fn is_canonical(&self) -> bool {
        self.method == Method::Canonical
    }
}

/// Disjoint fetch failure causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    /// No request could be formed from the URL.
    InvalidUrl,
    Timeout,
    HttpStatus(u16),
    /// Response was not HTML; the body was never read.
    ContentType,
    /// Any other transport failure, including an exceeded redirect limit.
    Download,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::InvalidUrl => write!(f, "url"),
            FetchFailure::Timeout => write!(f, "timeout"),
            FetchFailure::HttpStatus(code) => write!(f, "{code}"),
            FetchFailure::ContentType => write!(f, "content-type"),
            FetchFailure::Download => write!(f, "download"),
        }
    }
}

/// Result of a single fetch attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub body: Option<Vec<u8>>,
    pub declared_charset: Option<String>,
    /// Post-redirect address, known even for most failed fetches.
    pub final_url: Option<NormalizedUrl>,
    pub content_type: Option<String>,
    pub failure: Option<FetchFailure>,
}

impl FetchOutcome {
    pub fn success(
        body: Vec<u8>,
        declared_charset: Option<String>,
        final_url: Option<NormalizedUrl>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            body: Some(body),
            declared_charset,
            final_url,
            content_type,
            failure: None,
        }
    }

    pub fn failed(failure: FetchFailure, final_url: Option<NormalizedUrl>) -> Self {
        Self {
            failure: Some(failure),
            final_url,
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }
}
