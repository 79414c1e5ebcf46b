//! HTTP front door over the async gate.
//!
//! One or more scheduler threads share the listening socket. Each runs its
//! own single-threaded runtime with its own fetch limits.

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use canonical_engine::{CappedFetcher, FetchSettings, GateSettings, ReqwestFetcher, Resolver, ResolverContext};
use engine_logging::{engine_debug, engine_info};
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;

pub const NO_URL_PARAMETER: &str = "no url query parameter";

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

#[derive(Debug, Deserialize)]
struct ResolveQuery {
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/", get(resolve))
        .with_state(AppState { resolver })
}

async fn resolve(
    State(state): State<AppState>,
    query: Result<Query<ResolveQuery>, QueryRejection>,
) -> Response {
    let url = match query {
        Ok(Query(ResolveQuery { url: Some(url) })) => url,
        Ok(_) => return error_response(NO_URL_PARAMETER),
        Err(rejection) => return error_response(&rejection.body_text()),
    };
    Json(state.resolver.resolve(url.as_bytes()).await).into_response()
}

fn error_response(message: &str) -> Response {
    engine_debug!("rejected request: {}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Resolver for one scheduler: a fresh HTTP fetcher behind its own caps.
pub fn scheduler_resolver(
    context: Arc<ResolverContext>,
    fetch: FetchSettings,
    gate: &GateSettings,
) -> Resolver {
    let max_body_bytes = fetch.max_bytes;
    let fetcher = CappedFetcher::new(ReqwestFetcher::new(fetch), gate, max_body_bytes);
    Resolver::new(context, Arc::new(fetcher))
}

/// Bind, then block until every scheduler has shut down.
pub fn serve(config: &ServiceConfig, context: Arc<ResolverContext>) -> Result<()> {
    let addr = SocketAddr::new(config.service.bind, config.service.port);
    let listener =
        TcpListener::bind(addr).with_context(|| format!("Failed to bind HTTP listener on {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("Failed to make listener non-blocking")?;
    engine_info!(
        "Listening on http://{} with {} scheduler(s), {} clients each",
        listener.local_addr().unwrap_or(addr),
        config.service.schedulers,
        config.canonical.max_clients
    );

    let mut schedulers = Vec::with_capacity(config.service.schedulers);
    for index in 0..config.service.schedulers {
        let listener = listener
            .try_clone()
            .context("Failed to share listening socket")?;
        let context = context.clone();
        let fetch = config.fetch_settings();
        let gate = config.gate_settings();
        let handle = thread::Builder::new()
            .name(format!("scheduler-{index}"))
            .spawn(move || run_scheduler(index, listener, context, fetch, gate))
            .context("Failed to start scheduler thread")?;
        schedulers.push(handle);
    }

    for handle in schedulers {
        handle
            .join()
            .map_err(|_| anyhow!("scheduler thread panicked"))??;
    }
    engine_info!("HTTP front door stopped");
    Ok(())
}

fn run_scheduler(
    index: usize,
    listener: TcpListener,
    context: Arc<ResolverContext>,
    fetch: FetchSettings,
    gate: GateSettings,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build scheduler runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener)
            .context("Failed to register listener with runtime")?;
        let resolver = Arc::new(scheduler_resolver(context, fetch, &gate));
        axum::serve(listener, router(resolver))
            .with_graceful_shutdown(shutdown_signal(index))
            .await
            .context("HTTP server error")
    })
}

async fn shutdown_signal(index: usize) {
    let _ = tokio::signal::ctrl_c().await;
    engine_info!("scheduler-{} shutting down", index);
}
