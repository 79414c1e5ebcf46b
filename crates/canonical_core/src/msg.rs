use crate::{FetchOutcome, NormalizedUrl};

/// Inputs that drive one resolution forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Raw request text, possibly not UTF-8.
    Submitted(Vec<u8>),
    /// The fetcher finished, successfully or not.
    Fetched(FetchOutcome),
    /// Body text, or `None` when every decoding strategy failed.
    Decoded(Option<String>),
    /// Validated canonical or Open Graph URL, if the page declared one.
    Extracted(Option<NormalizedUrl>),
}
