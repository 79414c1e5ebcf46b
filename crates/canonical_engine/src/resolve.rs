use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use canonical_core::{update, Effect, FetchOutcome, Msg, NormalizedUrl, Resolution, ResolutionState};
use engine_logging::{engine_debug, engine_trace, engine_warn};
use futures_util::FutureExt;

use crate::decode::decode_page;
use crate::extract::Extractor;
use crate::fetch_blocking::BlockingFetcher;
use crate::{Fetcher, ResolverContext};

/// Where the pipeline stopped: at the fetch boundary, or finished.
enum Step {
    Fetch(ResolutionState, NormalizedUrl),
    Done(Resolution),
}

impl ResolverContext {
    /// Run the state machine from `msg` until it needs the network or completes.
    fn advance(&self, mut state: ResolutionState, mut msg: Msg) -> Step {
        loop {
            let (next, effects) = update(self.policy(), state, msg);
            state = next;
            msg = match effects.into_iter().next() {
                Some(Effect::Fetch { url }) => return Step::Fetch(state, url),
                Some(Effect::Decode {
                    body,
                    declared_charset,
                }) => Msg::Decoded(self.decode(state.current_url(), &body, declared_charset.as_deref())),
                Some(Effect::Extract { text }) => Msg::Extracted(self.extract(state.current_url(), &text)),
                Some(Effect::Complete(resolution)) => return Step::Done(resolution),
                None => return Step::Done(state.abandon()),
            };
        }
    }

    fn decode(&self, url: Option<&NormalizedUrl>, body: &[u8], charset: Option<&str>) -> Option<String> {
        match guarded("decode", url, || decode_page(body, charset))? {
            Ok(page) => {
                engine_trace!(
                    "decoded {} as {} via {:?}",
                    display(url),
                    page.encoding_label,
                    page.strategy
                );
                Some(page.text)
            }
            Err(err) => {
                engine_debug!("decode failed for {}: {}", display(url), err);
                None
            }
        }
    }

    fn extract(&self, url: Option<&NormalizedUrl>, text: &str) -> Option<NormalizedUrl> {
        let found = guarded("extract", url, || self.extractor().extract(text))??;
        engine_trace!("{} declares {} via {:?}", display(url), found.url, found.source);
        Some(found.url)
    }
}

/// Contains a panic inside one stage of one resolution.
fn guarded<T>(stage: &str, url: Option<&NormalizedUrl>, work: impl FnOnce() -> T) -> Option<T> {
    contained(stage, url, panic::catch_unwind(AssertUnwindSafe(work)))
}

fn contained<T>(
    stage: &str,
    url: Option<&NormalizedUrl>,
    result: std::thread::Result<T>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|message| message.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            engine_warn!("{} stage failed for {}: {}", stage, display(url), message);
            None
        }
    }
}

/// A fetcher that panicked leaves the resolution stuck at the fetch boundary.
fn after_fetch(context: &ResolverContext, state: ResolutionState, outcome: Option<FetchOutcome>) -> Step {
    match outcome {
        Some(outcome) => context.advance(state, Msg::Fetched(outcome)),
        None => Step::Done(state.abandon()),
    }
}

fn display(url: Option<&NormalizedUrl>) -> &str {
    url.map_or("<none>", NormalizedUrl::as_str)
}

fn log_resolution(resolution: &Resolution) {
    engine_debug!(
        "resolved {} -> {} method={:?} reason={} fetch={}",
        resolution.original,
        resolution.retrieved.as_deref().unwrap_or("-"),
        resolution.method,
        resolution.reason,
        resolution
            .fetch_failure
            .map_or_else(|| "-".to_string(), |failure| failure.to_string())
    );
}

/// Resolves URLs on an async runtime; suspends only inside the fetcher.
pub struct Resolver {
    context: Arc<ResolverContext>,
    fetcher: Arc<dyn Fetcher>,
}

impl Resolver {
    pub fn new(context: Arc<ResolverContext>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { context, fetcher }
    }

    pub fn context(&self) -> &Arc<ResolverContext> {
        &self.context
    }

    /// Always yields exactly one record; dropping the future cancels the pending fetch.
    pub async fn resolve(&self, raw: &[u8]) -> Resolution {
        let mut step = self
            .context
            .advance(ResolutionState::new(), Msg::Submitted(raw.to_vec()));
        loop {
            match step {
                Step::Fetch(state, url) => {
                    let outcome = AssertUnwindSafe(self.fetcher.fetch(&url)).catch_unwind().await;
                    step = after_fetch(&self.context, state, contained("fetch", Some(&url), outcome));
                }
                Step::Done(resolution) => {
                    log_resolution(&resolution);
                    return resolution;
                }
            }
        }
    }
}

/// Resolves URLs synchronously on the calling thread.
pub struct BlockingResolver {
    context: Arc<ResolverContext>,
    fetcher: Arc<dyn BlockingFetcher>,
}

impl BlockingResolver {
    pub fn new(context: Arc<ResolverContext>, fetcher: Arc<dyn BlockingFetcher>) -> Self {
        Self { context, fetcher }
    }

    pub fn resolve(&self, raw: &[u8]) -> Resolution {
        let mut step = self
            .context
            .advance(ResolutionState::new(), Msg::Submitted(raw.to_vec()));
        loop {
            match step {
                Step::Fetch(state, url) => {
                    let outcome = guarded("fetch", Some(&url), || self.fetcher.fetch(&url));
                    step = after_fetch(&self.context, state, outcome);
                }
                Step::Done(resolution) => {
                    log_resolution(&resolution);
                    return resolution;
                }
            }
        }
    }
}
