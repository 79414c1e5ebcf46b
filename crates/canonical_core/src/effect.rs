use crate::{NormalizedUrl, Resolution};

/// Work the state machine asks its driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch {
        url: NormalizedUrl,
    },
    Decode {
        body: Vec<u8>,
        declared_charset: Option<String>,
    },
    Extract {
        text: String,
    },
    /// Terminal; no further messages are accepted.
    Complete(Resolution),
}
