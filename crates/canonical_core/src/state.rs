use crate::{FetchFailure, Method, NormalizedUrl, Reason, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Init,
    Validated,
    Filtered,
    Fetched,
    Decoded,
    Extracted,
    Resolved,
    Failed(Reason),
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Resolved | Stage::Failed(_))
    }
}

/// Per-request state. Lives for exactly one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionState {
    pub(crate) stage: Stage,
    pub(crate) original: String,
    pub(crate) current: Option<NormalizedUrl>,
    pub(crate) method: Method,
    pub(crate) fetch_failure: Option<FetchFailure>,
}

impl Default for ResolutionState {
    fn default() -> Self {
        Self {
            stage: Stage::Init,
            original: String::new(),
            current: None,
            method: Method::Original,
            fetch_failure: None,
        }
    }
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// The URL that has survived so far: validated input, redirect target or canonical.
    pub fn current_url(&self) -> Option<&NormalizedUrl> {
        self.current.as_ref()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub(crate) fn finish(&mut self, reason: Reason) -> Resolution {
        self.stage = if reason == Reason::Canonical {
            Stage::Resolved
        } else {
            Stage::Failed(reason)
        };
        self.snapshot(reason)
    }

    /// Close a resolution whose driver stopped early, with the reason of the
    /// stage it was stuck in.
    pub fn abandon(mut self) -> Resolution {
        let reason = match self.stage {
            Stage::Failed(reason) => return self.snapshot(reason),
            Stage::Resolved => return self.snapshot(Reason::Canonical),
            Stage::Init => Reason::InvalidUrl,
            Stage::Validated => Reason::NotInLists,
            Stage::Filtered => Reason::NoContent,
            Stage::Fetched => Reason::DecodeFailed,
            Stage::Decoded | Stage::Extracted => Reason::NoAttributes,
        };
        self.finish(reason)
    }

    fn snapshot(&self, reason: Reason) -> Resolution {
        Resolution {
            original: self.original.clone(),
            retrieved: self.current.as_ref().map(|url| url.as_str().to_string()),
            method: self.method,
            reason,
            fetch_failure: self.fetch_failure,
        }
    }
}
