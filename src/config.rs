//!
//! src/config.rs
//!
//! Loads environment into typed configuration at startup. Everything
//! downstream receives the pieces it needs from AppConfig
//!

use std::time;
use url::Url;

use crate::errors::ServiceError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 10_000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90_000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ITUNES_BASE: &str = "https://itunes.apple.com/";
pub const DEFAULT_FILTER: &str = "info,similar_songs=debug,reqwest=warn";

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

/// Treats unset and whitespace-only the same
fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

///
/// Where the http server listens
///
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn build_server(lookup: &impl Fn(&str) -> Option<String>) -> Result<ServerConfig, ServiceError> {
    let host = non_empty(lookup, "HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match non_empty(lookup, "PORT") {
        Some(p) => p.trim().parse::<u16>()
            .map_err(|e| ServiceError::Config(format!("PORT invalid {e}")))?,
        None => DEFAULT_PORT,
    };
    Ok( ServerConfig { host, port } )
}

///
/// Configuration for the iTunes search api
///
#[derive(Debug, Clone)]
pub struct ItunesConfig {
    pub base_url: Url,      // https://itunes.apple.com/
}

fn build_itunes(lookup: &impl Fn(&str) -> Option<String>) -> Result<ItunesConfig, ServiceError> {
    let base_url = non_empty(lookup, "ITUNES_BASE_URL")
        .unwrap_or_else(|| DEFAULT_ITUNES_BASE.to_string());

    let mut base_url = Url::parse(&base_url)
        .map_err(|e| ServiceError::Config(
                format!("ITUNES_BASE_URL invalid {e}")
        ))?;

    ensure_https(&base_url).map_err(ServiceError::Config)?;
    ensure_trailing_slash(&mut base_url);

    Ok( ItunesConfig { base_url } )
}

///
/// Configuration for Http timeouts, pooling, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Optional storage backend. Only presence of the variables is ever
/// reported back to clients
///
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub database_url: Option<String>,
    pub database_name: Option<String>,
}

fn build_storage(lookup: &impl Fn(&str) -> Option<String>) -> StorageConfig {
    StorageConfig {
        database_url: non_empty(lookup, "DATABASE_URL"),
        database_name: non_empty(lookup, "DATABASE_NAME"),
    }
}

///
/// Configuration for Logger
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: DEFAULT_FILTER.to_string(),
            format: LogFormat::Json,
            with_ansi: true,
            include_file_line: true,
            include_target: true,
        }
    }
}

fn build_logging(lookup: &impl Fn(&str) -> Option<String>) -> Result<LoggingConfig, ServiceError> {
    let format = match non_empty(lookup, "LOG_FORMAT").as_deref().map(str::trim) {
        None | Some("json") => LogFormat::Json,
        Some("pretty") => LogFormat::Pretty,
        Some(other) => return Err(ServiceError::Config(
            format!("LOG_FORMAT must be json or pretty, got {other}")
        )),
    };
    let filter_directives = non_empty(lookup, "RUST_LOG")
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());

    Ok( LoggingConfig { filter_directives, format, ..LoggingConfig::default() } )
}

///
/// AppConfig which holds everything main needs to wire the service
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub itunes: ItunesConfig,
    pub storage: StorageConfig,
    pub similarity: crate::similar::SimilarityLimits,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, ServiceError> {
    dotenvy::dotenv().ok();
    load_config_from(|key| std::env::var(key).ok())
}

pub fn load_config_from(lookup: impl Fn(&str) -> Option<String>) ->
    Result<AppConfig, ServiceError> {

    let server     = build_server(&lookup)?;
    let http       = HttpConfig::default();
    let itunes     = build_itunes(&lookup)?;
    let storage    = build_storage(&lookup);
    let similarity = crate::similar::SimilarityLimits::default();
    let logging    = build_logging(&lookup)?;

    Ok( AppConfig { server, http, itunes, storage, similarity, logging } )
}
