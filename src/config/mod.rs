//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::repos::ReadIsolation;
use crate::cache::CacheBackendKind;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "qcache";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_DB_QUERY_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CACHE_TTL_SECS: u64 = 120;
const DEFAULT_CACHE_OP_TIMEOUT_MS: u64 = 500;
const DEFAULT_CACHE_NAMESPACE: &str = "qcache";
const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
const DEFAULT_BENCHMARK_MAX_REPETITIONS: u32 = 25;
const DEFAULT_BENCH_REPETITIONS: i64 = 5;

/// Command-line arguments for the qcache binary.
#[derive(Debug, Parser)]
#[command(name = "qcache", version, about = "Query-result cache service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QCACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Replay a query pair against the configured stores and print the latency report.
    Bench(Box<BenchArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the read transaction isolation level.
    #[arg(long = "database-read-isolation", value_name = "LEVEL")]
    pub database_read_isolation: Option<String>,

    /// Override the cache store (redis|memory).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the Redis URL.
    #[arg(long = "cache-redis-url", value_name = "URL")]
    pub cache_redis_url: Option<String>,

    /// Override the cache entry lifetime.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the cache key namespace.
    #[arg(long = "cache-namespace", value_name = "NAME")]
    pub cache_namespace: Option<String>,

    /// Override the pause before retrying a transient store failure.
    #[arg(long = "retry-backoff-ms", value_name = "MILLIS")]
    pub retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub store: StoreOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct BenchArgs {
    #[command(flatten)]
    pub store: StoreOverrides,

    /// Number of times the query pair is replayed.
    #[arg(long, short = 'T', default_value_t = DEFAULT_BENCH_REPETITIONS)]
    pub repetitions: i64,

    /// Lower bound of the time-range query.
    #[arg(long = "min-time", value_name = "EPOCH")]
    pub min_time: i64,

    /// Upper bound of the time-range query.
    #[arg(long = "max-time", value_name = "EPOCH")]
    pub max_time: i64,

    /// Start of the start-net-count query.
    #[arg(long = "start-time", value_name = "EPOCH")]
    pub start_time: i64,

    /// Network code of the start-net-count query.
    #[arg(long, value_name = "NET")]
    pub net: String,

    /// Row limit of the start-net-count query.
    #[arg(long, value_name = "COUNT")]
    pub count: i64,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
    pub benchmark: BenchmarkSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub acquire_timeout: Duration,
    /// Server-side statement timeout; the client waits slightly longer.
    pub query_timeout: Duration,
    pub read_isolation: ReadIsolation,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub redis_url: Option<String>,
    pub ttl_seconds: NonZeroU64,
    pub op_timeout_ms: NonZeroU64,
    pub namespace: String,
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct BenchmarkSettings {
    pub max_repetitions: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("QCACHE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Bench(args)) => raw.apply_store_overrides(&args.store),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    retry: RawRetrySettings,
    benchmark: RawBenchmarkSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }

        self.apply_store_overrides(&overrides.store);
    }

    fn apply_store_overrides(&mut self, overrides: &StoreOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(level) = overrides.database_read_isolation.as_ref() {
            self.database.read_isolation = Some(level.clone());
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.cache_redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(namespace) = overrides.cache_namespace.as_ref() {
            self.cache.namespace = Some(namespace.clone());
        }
        if let Some(backoff) = overrides.retry_backoff_ms {
            self.retry.backoff_ms = Some(backoff);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            retry,
            benchmark,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache)?;
        let retry = build_retry_settings(retry);
        let benchmark = build_benchmark_settings(benchmark)?;

        Ok(Self {
            server,
            logging,
            database,
            cache,
            retry,
            benchmark,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;
    let acquire_timeout = non_zero_u64(
        database
            .acquire_timeout_seconds
            .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS),
        "database.acquire_timeout_seconds",
    )?;
    let query_timeout = non_zero_u64(
        database
            .query_timeout_seconds
            .unwrap_or(DEFAULT_DB_QUERY_TIMEOUT_SECS),
        "database.query_timeout_seconds",
    )?;

    let read_isolation = match database.read_isolation.as_deref().map(str::trim) {
        None => ReadIsolation::default(),
        Some(value) => parse_read_isolation(value).ok_or_else(|| {
            LoadError::invalid(
                "database.read_isolation",
                format!(
                    "unknown level `{value}`; expected read_uncommitted, read_committed, \
                     repeatable_read or serializable"
                ),
            )
        })?,
    };

    Ok(DatabaseSettings {
        url,
        max_connections,
        acquire_timeout: Duration::from_secs(acquire_timeout.get()),
        query_timeout: Duration::from_secs(query_timeout.get()),
        read_isolation,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let redis_url = non_blank(cache.redis_url);

    let backend = match cache.backend.as_deref().map(str::trim) {
        None | Some("") if redis_url.is_some() => CacheBackendKind::Redis,
        None | Some("") => CacheBackendKind::Memory,
        Some(value) if value.eq_ignore_ascii_case("redis") => CacheBackendKind::Redis,
        Some(value) if value.eq_ignore_ascii_case("memory") => CacheBackendKind::Memory,
        Some(value) => {
            return Err(LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{value}`; expected redis or memory"),
            ));
        }
    };
    if backend == CacheBackendKind::Redis && redis_url.is_none() {
        return Err(LoadError::invalid(
            "cache.redis_url",
            "required when cache.backend is redis",
        ));
    }

    let ttl_seconds = non_zero_u64(
        cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "cache.ttl_seconds",
    )?;
    let op_timeout_ms = non_zero_u64(
        cache.op_timeout_ms.unwrap_or(DEFAULT_CACHE_OP_TIMEOUT_MS),
        "cache.op_timeout_ms",
    )?;

    let namespace = cache
        .namespace
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE.to_string());
    if namespace.is_empty()
        || !namespace
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(LoadError::invalid(
            "cache.namespace",
            "must be non-empty and contain only ASCII letters, digits, `_` or `-`",
        ));
    }

    Ok(CacheSettings {
        backend,
        redis_url,
        ttl_seconds,
        op_timeout_ms,
        namespace,
    })
}

fn build_retry_settings(retry: RawRetrySettings) -> RetrySettings {
    RetrySettings {
        backoff: Duration::from_millis(retry.backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS)),
    }
}

fn build_benchmark_settings(
    benchmark: RawBenchmarkSettings,
) -> Result<BenchmarkSettings, LoadError> {
    let max_repetitions = non_zero_u32(
        benchmark
            .max_repetitions
            .unwrap_or(DEFAULT_BENCHMARK_MAX_REPETITIONS)
            .into(),
        "benchmark.max_repetitions",
    )?;
    Ok(BenchmarkSettings { max_repetitions })
}

fn parse_read_isolation(value: &str) -> Option<ReadIsolation> {
    match value.to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
        "read_uncommitted" => Some(ReadIsolation::ReadUncommitted),
        "read_committed" => Some(ReadIsolation::ReadCommitted),
        "repeatable_read" => Some(ReadIsolation::RepeatableRead),
        "serializable" => Some(ReadIsolation::Serializable),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    acquire_timeout_seconds: Option<u64>,
    query_timeout_seconds: Option<u64>,
    read_isolation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    redis_url: Option<String>,
    ttl_seconds: Option<u64>,
    op_timeout_ms: Option<u64>,
    namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRetrySettings {
    backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBenchmarkSettings {
    max_repetitions: Option<u32>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
