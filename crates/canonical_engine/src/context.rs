use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use canonical_core::{DomainExtractor, DomainPolicy, DomainSet, SuffixError};
use engine_logging::{engine_info, engine_warn};

use crate::extract::{CanonicalExtractor, ExtractError};

/// Startup inputs for [`ResolverContext::load`].
#[derive(Debug, Clone, Default)]
pub struct ContextSettings {
    pub whitelist: Option<PathBuf>,
    pub expandlist: Option<PathBuf>,
    pub suffix_cache: Option<PathBuf>,
    /// Unreadable lists or suffix cache abort startup instead of degrading.
    pub strict: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("cannot read {what} at {path:?}: {source}")]
    Unreadable {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("suffix cache {path:?}: {source}")]
    Suffix {
        path: PathBuf,
        #[source]
        source: SuffixError,
    },
    #[error(transparent)]
    Extractor(#[from] ExtractError),
}

/// Everything a resolution reads and nobody writes: trust lists, the
/// registered-domain extractor and the HTML extractor.
#[derive(Debug)]
pub struct ResolverContext {
    policy: DomainPolicy,
    extractor: CanonicalExtractor,
}

impl ResolverContext {
    pub fn new(policy: DomainPolicy, extractor: CanonicalExtractor) -> Self {
        Self { policy, extractor }
    }

    /// Context with no trust lists and the implicit suffix rule.
    pub fn permissive() -> Result<Self, ContextError> {
        let extractor = CanonicalExtractor::new()?;
        extractor.self_check()?;
        Ok(Self::new(DomainPolicy::default(), extractor))
    }

    pub fn load(settings: &ContextSettings) -> Result<Self, ContextError> {
        let extractor = CanonicalExtractor::new()?;
        extractor.self_check()?;

        let whitelist = load_optional_list(settings.whitelist.as_deref(), "whitelist", settings.strict)?;
        let expandlist =
            load_optional_list(settings.expandlist.as_deref(), "expandlist", settings.strict)?;
        let suffixes = load_suffixes(settings.suffix_cache.as_deref(), settings.strict)?;

        Ok(Self::new(
            DomainPolicy::new(whitelist, expandlist, suffixes),
            extractor,
        ))
    }

    pub fn policy(&self) -> &DomainPolicy {
        &self.policy
    }

    pub fn extractor(&self) -> &CanonicalExtractor {
        &self.extractor
    }
}

/// Read a domain list file.
pub fn load_domain_list(path: &Path) -> io::Result<DomainSet> {
    let text = fs::read_to_string(path)?;
    let set = DomainSet::parse(&text);
    engine_info!("Loaded domain list {:?} with {} domains", path, set.len());
    Ok(set)
}

fn load_optional_list(
    path: Option<&Path>,
    what: &'static str,
    strict: bool,
) -> Result<DomainSet, ContextError> {
    let Some(path) = path else {
        return Ok(DomainSet::empty());
    };
    match load_domain_list(path) {
        Ok(set) => Ok(set),
        Err(source) if strict => Err(ContextError::Unreadable {
            what,
            path: path.to_path_buf(),
            source,
        }),
        Err(err) => {
            engine_warn!("{} {:?} unavailable ({}); treating as unconfigured", what, path, err);
            Ok(DomainSet::empty())
        }
    }
}

fn load_suffixes(path: Option<&Path>, strict: bool) -> Result<DomainExtractor, ContextError> {
    let Some(path) = path else {
        return Ok(DomainExtractor::last_label());
    };
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(source) if strict => {
            return Err(ContextError::Unreadable {
                what: "suffix cache",
                path: path.to_path_buf(),
                source,
            })
        }
        Err(err) => {
            engine_warn!("suffix cache {:?} unavailable ({}); using last-label rule", path, err);
            return Ok(DomainExtractor::last_label());
        }
    };
    match DomainExtractor::from_suffix_list(&text) {
        Ok(extractor) => {
            engine_info!("Loaded suffix cache {:?}", path);
            Ok(extractor)
        }
        Err(source) if strict => Err(ContextError::Suffix {
            path: path.to_path_buf(),
            source,
        }),
        Err(err) => {
            engine_warn!("suffix cache {:?} rejected ({}); using last-label rule", path, err);
            Ok(DomainExtractor::last_label())
        }
    }
}
