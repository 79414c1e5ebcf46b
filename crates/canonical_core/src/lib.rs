//! Canonical core: URL normalization, trust policy and the pure resolution state machine.
mod address;
mod domains;
mod effect;
mod msg;
mod resolution;
mod state;
mod update;

pub use address::{normalize_url, normalize_url_bytes, NormalizedUrl};
pub use domains::{DomainExtractor, DomainPolicy, DomainSet, SuffixError};
pub use effect::Effect;
pub use msg::Msg;
pub use resolution::{FetchFailure, FetchOutcome, Method, Reason, Resolution};
pub use state::{ResolutionState, Stage};
pub use update::update;
