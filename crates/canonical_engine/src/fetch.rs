use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use canonical_core::{normalize_url, FetchFailure, FetchOutcome, NormalizedUrl};
use engine_logging::{engine_debug, engine_trace};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 10,
            max_bytes: 2 * 1024 * 1024,
            allowed_content_types: vec!["text/html".to_string()],
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchSettings {
    pub(crate) fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    pub(crate) fn body_limit(&self) -> usize {
        usize::try_from(self.max_bytes).unwrap_or(usize::MAX)
    }
}

/// Single GET with redirects, timeout, content-type gate and body cap.
///
/// Failures are reported inside the outcome, never as a panic or error.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &NormalizedUrl) -> FetchOutcome;
}

#[async_trait::async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, url: &NormalizedUrl) -> FetchOutcome {
        self.as_ref().fetch(url).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    // One client per fetch keeps the cookie jar scoped to a single redirect chain.
    fn build_client(&self, redirect_counter: Arc<AtomicUsize>) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(redirect_policy(self.settings.redirect_limit, redirect_counter))
            .cookie_store(true)
            .user_agent(self.settings.user_agent.as_str())
            .build()
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &NormalizedUrl) -> FetchOutcome {
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

        let response = match client.get(parsed).send().await {
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

        let limit = self.settings.body_limit();
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => return FetchOutcome::failed(classify_error(url, &err), final_url),
            };
            let room = limit - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                engine_debug!("body of {} truncated at {} bytes", url, limit);
                break;
            }
            body.extend_from_slice(&chunk);
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

pub(crate) fn redirect_policy(
    redirect_limit: usize,
    redirect_counter: Arc<AtomicUsize>,
) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        // `previous` holds the requested URL plus every hop already followed.
        let count = attempt.previous().len();
        redirect_counter.store(count, Ordering::Relaxed);
        if count > redirect_limit {
            attempt.error("redirect limit exceeded")
        } else {
            attempt.follow()
        }
    })
}

pub(crate) fn classify_error(url: &NormalizedUrl, err: &reqwest::Error) -> FetchFailure {
    let failure = if err.is_timeout() {
        FetchFailure::Timeout
    } else if err.is_builder() {
        FetchFailure::InvalidUrl
    } else {
        FetchFailure::Download
    };
    engine_debug!("download failed: url={} reason={} ({})", url, failure, err);
    failure
}

/// Address a failed request had reached, so the whitelist check can still see
/// a redirect target. An exceeded redirect limit has no trustworthy final URL.
pub(crate) fn failed_at(err: &reqwest::Error) -> Option<NormalizedUrl> {
    if err.is_redirect() {
        return None;
    }
    err.url().and_then(|url| normalize_url(url.as_str()))
}

/// `charset` parameter of a Content-Type header value, lower-cased and unquoted.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches(['"', '\'']).trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}
