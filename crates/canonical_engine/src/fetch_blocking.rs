use std::io::{self, Read};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use canonical_core::{normalize_url, FetchFailure, FetchOutcome, NormalizedUrl};
use engine_logging::{engine_debug, engine_trace};
use reqwest::header::CONTENT_TYPE;

use crate::fetch::{charset_from_content_type, classify_error, failed_at, redirect_policy};
use crate::FetchSettings;

/// Blocking counterpart of [`crate::Fetcher`] for worker threads.
///
/// Must not be called from inside an async runtime.
pub trait BlockingFetcher: Send + Sync {
    fn fetch(&self, url: &NormalizedUrl) -> FetchOutcome;
}

impl<F: BlockingFetcher + ?Sized> BlockingFetcher for Arc<F> {
    fn fetch(&self, url: &NormalizedUrl) -> FetchOutcome {
        self.as_ref().fetch(url)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockingReqwestFetcher {
    settings: FetchSettings,
}

impl BlockingReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    // Same per-fetch client as the async fetcher: the cookie jar must not
    // outlive one redirect chain. Each blocking client runs its own runtime
    // thread, so this costs a thread spawn per fetch on top of the request.
    fn build_client(
        &self,
        redirect_counter: Arc<AtomicUsize>,
    ) -> reqwest::Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(redirect_policy(self.settings.redirect_limit, redirect_counter))
            .cookie_store(true)
            .user_agent(self.settings.user_agent.as_str())
            .build()
    }
}

impl BlockingFetcher for BlockingReqwestFetcher {
    fn fetch(&self, url: &NormalizedUrl) -> FetchOutcome {
        let parsed = match reqwest::Url::parse(url.as_str()) {
            Ok(parsed) => parsed,
            Err(err) => {
                engine_debug!("cannot form request for {}: {}", url, err);
                return FetchOutcome::failed(FetchFailure::InvalidUrl, None);
            }
        };
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = match self.build_client(redirect_counter.clone()) {
            Ok(client) => client,
            Err(err) => {
                engine_debug!("http client unavailable for {}: {}", url, err);
                return FetchOutcome::failed(FetchFailure::Download, None);
            }
        };

        let response = match client.get(parsed).send() {
            Ok(response) => response,
            Err(err) => return FetchOutcome::failed(classify_error(url, &err), failed_at(&err)),
        };

        let final_url = normalize_url(response.url().as_str());
        let status = response.status();
        if !status.is_success() {
            engine_debug!("download failed: url={} status={}", url, status);
            return FetchOutcome::failed(FetchFailure::HttpStatus(status.as_u16()), final_url);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.settings.is_content_type_allowed(ct) {
                engine_debug!("content type not supported {} for {}", ct, url);
                return FetchOutcome::failed(FetchFailure::ContentType, final_url)
                    .with_content_type(content_type);
            }
        }

        let limit = self.settings.body_limit() as u64;
        let mut body = Vec::new();
        if let Err(err) = response.take(limit).read_to_end(&mut body) {
            return FetchOutcome::failed(classify_read_error(url, &err), final_url);
        }

        engine_trace!(
            "fetched {} -> {:?} after {} redirects, {} bytes",
            url,
            final_url.as_ref().map(NormalizedUrl::as_str),
            redirect_counter.load(Ordering::Relaxed),
            body.len()
        );
        let declared_charset = content_type.as_deref().and_then(charset_from_content_type);
        FetchOutcome::success(body, declared_charset, final_url, content_type)
    }
}

fn classify_read_error(url: &NormalizedUrl, err: &io::Error) -> FetchFailure {
    if let Some(inner) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
    {
        return classify_error(url, inner);
    }
    let failure = if err.kind() == io::ErrorKind::TimedOut {
        FetchFailure::Timeout
    } else {
        FetchFailure::Download
    };
    engine_debug!("download failed: url={} reason={} ({})", url, failure, err);
    failure
}
