//! Canonical engine: network, decoding, extraction and the two concurrency gates.
mod capped;
mod context;
mod decode;
mod extract;
mod fetch;
mod fetch_blocking;
mod pool;
mod resolve;

pub use capped::{CappedFetcher, GateSettings};
pub use context::{load_domain_list, ContextError, ContextSettings, ResolverContext};
pub use decode::{
    declared_encodings, decode_page, normalize_charset, DecodeError, DecodeStrategy, DecodedPage,
    MIN_DETECTION_SAMPLE,
};
pub use extract::{CanonicalExtractor, CanonicalSource, ExtractError, ExtractedCanonical, Extractor};
pub use fetch::{charset_from_content_type, FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use fetch_blocking::{BlockingFetcher, BlockingReqwestFetcher};
pub use pool::{PoolError, PoolSettings, Reply, RequestId, WorkerPool};
pub use resolve::{BlockingResolver, Resolver};
