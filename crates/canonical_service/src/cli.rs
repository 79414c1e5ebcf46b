//! Command line definitions.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Resolve URLs to the canonical address their pages declare.
#[derive(Parser, Debug)]
#[command(name = "canonicalurl")]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Configuration file (RON). Defaults to $CANONICALURL_CONFIG, then ./canonicalurl.ron
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Trusted domains, one per line
    #[arg(long, global = true)]
    pub whitelist: Option<PathBuf>,

    /// Domains worth expanding (URL shorteners), one per line
    #[arg(long, global = true)]
    pub expandlist: Option<PathBuf>,

    /// Public suffix list used to find registered domains
    #[arg(long, global = true)]
    pub suffix_cache: Option<PathBuf>,

    /// Refuse to start when a list or the suffix cache cannot be read
    #[arg(long, global = true)]
    pub strict: bool,

    /// Also append log records to this file
    #[arg(long, global = true)]
    pub log: Option<PathBuf>,

    /// With --log, write records to the file only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Answer `GET /?url=<url>` over HTTP
    Serve(ServeArgs),
    /// Resolve URLs read line by line, writing one JSON record per line
    Batch(BatchArgs),
    /// Resolve a single URL and print its record
    Resolve(ResolveArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Listening port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Listening address
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Scheduler threads sharing the listening socket
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=256))]
    pub schedulers: Option<u32>,

    /// Outstanding fetches per scheduler
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub max_clients: Option<u32>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct BatchArgs {
    /// Worker threads
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=1024))]
    pub workers: Option<u32>,

    /// Read URLs from this file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// URL to resolve
    pub url: String,
}
