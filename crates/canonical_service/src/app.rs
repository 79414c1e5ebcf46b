use std::fs::File;
use std::io::{self, BufReader, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use canonical_engine::{BlockingReqwestFetcher, BlockingResolver, ResolverContext, WorkerPool};
use engine_logging::engine_info;

use crate::batch::run_batch;
use crate::cli::{Cli, Command};
use crate::config::ServiceConfig;
use crate::http;

/// Load configuration, install logging, build the shared context and run
/// the selected command.
pub fn run(cli: Cli) -> Result<()> {
    let mut config = ServiceConfig::load(cli.global.config.as_deref())?;
    config.apply_global(&cli.global);
    match &cli.command {
        Command::Serve(args) => config.apply_serve(args),
        Command::Batch(args) => config.apply_batch(args),
        Command::Resolve(_) => {}
    }
    config.validate()?;

    engine_logging::initialize(&config.log_settings());
    engine_info!("canonicalurl {} started, pid {}", env!("CARGO_PKG_VERSION"), std::process::id());
    engine_info!("Configuration: {:?}", config);

    let context = Arc::new(
        ResolverContext::load(&config.context_settings()).context("Failed to load resolver context")?,
    );

    match cli.command {
        Command::Serve(_) => http::serve(&config, context),
        Command::Batch(args) => {
            let resolver = Arc::new(blocking_resolver(&config, context));
            let pool = WorkerPool::new(&config.pool_settings(), resolver)?;
            let stdout = io::stdout();
            let mut output = stdout.lock();
            match args.input {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("Failed to open input {}", path.display()))?;
                    run_batch(pool, BufReader::new(file), &mut output)?;
                }
                None => {
                    run_batch(pool, io::stdin().lock(), &mut output)?;
                }
            }
            Ok(())
        }
        Command::Resolve(args) => {
            let resolution = blocking_resolver(&config, context).resolve(args.url.as_bytes());
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &resolution)?;
            writeln!(stdout)?;
            Ok(())
        }
    }
}

fn blocking_resolver(config: &ServiceConfig, context: Arc<ResolverContext>) -> BlockingResolver {
    let fetcher = BlockingReqwestFetcher::new(config.fetch_settings());
    BlockingResolver::new(context, Arc::new(fetcher))
}
