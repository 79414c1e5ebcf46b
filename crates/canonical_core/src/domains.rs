use std::collections::HashSet;

use publicsuffix::{List, Psl};
use thiserror::Error;
use url::Host;

use crate::NormalizedUrl;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SuffixError {
    #[error("invalid public suffix list: {0}")]
    Parse(String),
}

/// Lower-cased registered domains, read from a line-oriented list.
///
/// An empty set counts as unconfigured: every membership check against it passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    domains: HashSet<String>,
}

impl DomainSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse list text: one domain per line, `#` comments and blank lines skipped.
    pub fn parse(text: &str) -> Self {
        text.lines().collect()
    }

    pub fn is_configured(&self) -> bool {
        !self.domains.is_empty()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(&domain.to_lowercase())
    }

    /// Membership with the unconfigured-set rule applied.
    fn allows(&self, domain: Option<&str>) -> bool {
        if !self.is_configured() {
            return true;
        }
        domain.is_some_and(|domain| self.domains.contains(domain))
    }
}

impl<S: AsRef<str>> FromIterator<S> for DomainSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let domains = iter
            .into_iter()
            .map(|line| line.as_ref().trim().to_lowercase())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        Self { domains }
    }
}

/// Reduces hosts to their registered domain (public suffix plus one label).
///
/// Without a suffix table the last label is taken as the suffix, so
/// `news.example.co.uk` reduces to `co.uk`.
#[derive(Default)]
pub struct DomainExtractor {
    suffixes: Option<List>,
}

impl DomainExtractor {
    pub fn from_suffix_list(text: &str) -> Result<Self, SuffixError> {
        let list = text
            .parse::<List>()
            .map_err(|err| SuffixError::Parse(err.to_string()))?;
        Ok(Self {
            suffixes: Some(list),
        })
    }

    /// Extractor applying only the implicit `*` rule.
    pub fn last_label() -> Self {
        Self::default()
    }

    pub fn has_suffix_table(&self) -> bool {
        self.suffixes.is_some()
    }

    /// Registered domain of the URL's host. IP hosts map to their literal form.
    pub fn registered_domain(&self, url: &NormalizedUrl) -> Option<String> {
        match url.host()? {
            Host::Domain(name) => self.registered_name(&name),
            Host::Ipv4(addr) => Some(addr.to_string()),
            Host::Ipv6(addr) => Some(addr.to_string()),
        }
    }

    fn registered_name(&self, name: &str) -> Option<String> {
        let name = name.trim_end_matches('.').to_lowercase();
        match &self.suffixes {
            Some(list) => list
                .domain(name.as_bytes())
                .and_then(|domain| std::str::from_utf8(domain.as_bytes()).ok())
                .map(str::to_string),
            None => {
                let mut labels = name.rsplitn(3, '.');
                let suffix = labels.next().filter(|label| !label.is_empty())?;
                let root = labels.next().filter(|label| !label.is_empty())?;
                Some(format!("{root}.{suffix}"))
            }
        }
    }
}

impl std::fmt::Debug for DomainExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainExtractor")
            .field("suffix_table", &self.has_suffix_table())
            .finish()
    }
}

/// Trust lists and the extractor used to test URLs against them.
///
/// Built once at startup and shared read-only by every resolution.
#[derive(Debug, Default)]
pub struct DomainPolicy {
    pub whitelist: DomainSet,
    pub expandlist: DomainSet,
    pub extractor: DomainExtractor,
}

impl DomainPolicy {
    pub fn new(whitelist: DomainSet, expandlist: DomainSet, extractor: DomainExtractor) -> Self {
        Self {
            whitelist,
            expandlist,
            extractor,
        }
    }

    /// Pre-fetch admission: worth expanding, or trusted outright.
    pub fn admits(&self, url: &NormalizedUrl) -> bool {
        let domain = self.extractor.registered_domain(url);
        self.expandlist.allows(domain.as_deref()) || self.whitelist.allows(domain.as_deref())
    }

    /// Whitelist membership; passes when no whitelist is configured.
    pub fn trusts(&self, url: &NormalizedUrl) -> bool {
        let domain = self.extractor.registered_domain(url);
        self.whitelist.allows(domain.as_deref())
    }
}
