//! Canonical URL service: command line, configuration and the two front
//! ends (HTTP and batch) over the canonical engine.
pub mod app;
pub mod batch;
pub mod cli;
pub mod config;
pub mod http;

pub use app::run;
pub use batch::{run_batch, BatchSummary};
pub use cli::Cli;
pub use config::ServiceConfig;
