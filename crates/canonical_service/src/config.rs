//! Service configuration: built-in defaults, an optional RON file, then
//! command line overrides.

use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use canonical_engine::{
    ContextSettings, FetchSettings, GateSettings, PoolSettings, DEFAULT_USER_AGENT,
};
use engine_logging::{LogDestination, LogSettings};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::cli::{BatchArgs, GlobalArgs, ServeArgs};

pub const CONFIG_ENV: &str = "CANONICALURL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "canonicalurl.ron";
pub const DEFAULT_PORT: u16 = 7171;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    pub lists: ListsSection,
    pub canonical: CanonicalSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub port: u16,
    pub bind: IpAddr,
    pub workers: usize,
    pub schedulers: usize,
    pub log: Option<PathBuf>,
    /// With a `log` file set, `false` sends records to the file only.
    pub log_terminal: bool,
    pub log_level: String,
    pub strict: bool,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            workers: thread::available_parallelism()
                .map(|n| n.get() * 2)
                .unwrap_or(2),
            schedulers: 1,
            log: None,
            log_terminal: true,
            log_level: "info".to_string(),
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListsSection {
    pub whitelist: Option<PathBuf>,
    pub expandlist: Option<PathBuf>,
}

impl Default for ListsSection {
    fn default() -> Self {
        Self {
            whitelist: Some(PathBuf::from("./whitelist.txt")),
            expandlist: Some(PathBuf::from("./shorteners.txt")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalSection {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_body_bytes: u64,
    pub max_clients: usize,
    pub max_buffer_bytes: u64,
    pub redirect_limit: usize,
    pub suffix_cache: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for CanonicalSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_body_bytes: 2 * 1024 * 1024,
            max_clients: 10,
            max_buffer_bytes: 100 * 1024 * 1024,
            redirect_limit: 10,
            suffix_cache: Some(PathBuf::from("./cache.tld")),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Explicit path, else `$CANONICALURL_CONFIG`, else `./canonicalurl.ron`
    /// when present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.workers == 0 {
            anyhow::bail!("service.workers must be at least 1");
        }
        if self.service.schedulers == 0 {
            anyhow::bail!("service.schedulers must be at least 1");
        }
        if self.canonical.max_clients == 0 {
            anyhow::bail!("canonical.max_clients must be at least 1");
        }
        if self.canonical.timeout_secs == 0 {
            anyhow::bail!("canonical.timeout_secs must be at least 1");
        }
        LevelFilter::from_str(&self.service.log_level)
            .map_err(|_| anyhow::anyhow!("unknown log level {:?}", self.service.log_level))?;
        Ok(())
    }

    pub fn apply_global(&mut self, args: &GlobalArgs) {
        if let Some(path) = &args.whitelist {
            self.lists.whitelist = Some(path.clone());
        }
        if let Some(path) = &args.expandlist {
            self.lists.expandlist = Some(path.clone());
        }
        if let Some(path) = &args.suffix_cache {
            self.canonical.suffix_cache = Some(path.clone());
        }
        if let Some(path) = &args.log {
            self.service.log = Some(path.clone());
        }
        if args.strict {
            self.service.strict = true;
        }
        if args.quiet {
            self.service.log_terminal = false;
        }
        match args.verbose {
            0 => {}
            1 => self.service.log_level = "debug".to_string(),
            _ => self.service.log_level = "trace".to_string(),
        }
    }

    pub fn apply_serve(&mut self, args: &ServeArgs) {
        if let Some(port) = args.port {
            self.service.port = port;
        }
        if let Some(bind) = args.bind {
            self.service.bind = bind;
        }
        if let Some(schedulers) = args.schedulers {
            self.service.schedulers = schedulers as usize;
        }
        if let Some(max_clients) = args.max_clients {
            self.canonical.max_clients = max_clients as usize;
        }
    }

    pub fn apply_batch(&mut self, args: &BatchArgs) {
        if let Some(workers) = args.workers {
            self.service.workers = workers as usize;
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        let level = LevelFilter::from_str(&self.service.log_level).unwrap_or(LevelFilter::Info);
        let destination = match (&self.service.log, self.service.log_terminal) {
            (Some(path), true) => LogDestination::Both(path.clone()),
            (Some(path), false) => LogDestination::File(path.clone()),
            (None, _) => LogDestination::Terminal,
        };
        LogSettings { destination, level }
    }

    pub fn context_settings(&self) -> ContextSettings {
        ContextSettings {
            whitelist: self.lists.whitelist.clone(),
            expandlist: self.lists.expandlist.clone(),
            suffix_cache: self.canonical.suffix_cache.clone(),
            strict: self.service.strict,
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.canonical.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.canonical.timeout_secs),
            redirect_limit: self.canonical.redirect_limit,
            max_bytes: self.canonical.max_body_bytes,
            user_agent: self.canonical.user_agent.clone(),
            ..FetchSettings::default()
        }
    }

    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            max_clients: self.canonical.max_clients,
            max_buffer_bytes: self.canonical.max_buffer_bytes,
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            workers: self.service.workers,
            queue_depth: self.service.workers * 4,
        }
    }
}
