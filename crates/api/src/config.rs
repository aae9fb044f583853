//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `BAZAAR_ENV` - `dev` (default) or anything else for production rules
//! - `BAZAAR_BIND` - Listen address (default: 0.0.0.0:8080)
//! - `JWT_SECRET` - HS256 secret; required unless `BAZAAR_ENV=dev`
//! - `DATABASE_URL` - Postgres connection string (needs the `postgres` feature)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `SMTP_HOST`, `SMTP_PORT` (default: 587), `SMTP_USERNAME`, `SMTP_PASSWORD`
//! - `MAIL_FROM` - Sender address; SMTP is used only when host and sender are set
//! - `JOB_WORKERS` - Concurrent background jobs (default: 4)
//! - `IMPORT_TIMEOUT_SECS` - Per-run import bound (default: 300)
//! - `JOB_POLL_INTERVAL_MS` - Executor poll interval (default: 100)
//! - `LOG_FORMAT` - `json` (default) or `pretty`

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use bazaar_infra::notifications::SmtpConfig;
use bazaar_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),

    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub smtp: Option<SmtpConfig>,
    pub job_workers: usize,
    pub import_timeout: Duration,
    pub job_poll_interval: Duration,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// In-memory stores, log mailer, the given secret. Used by tests and local runs.
    pub fn local(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            database_max_connections: 10,
            smtp: None,
            job_workers: 4,
            import_timeout: Duration::from_secs(300),
            job_poll_interval: Duration::from_millis(100),
            log_format: LogFormat::Json,
        }
    }

    /// True when running on the built-in development secret.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let dev = get("BAZAAR_ENV").is_none_or(|env| env.eq_ignore_ascii_case("dev"));
        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if dev => DEV_JWT_SECRET.to_string(),
            None => return Err(ConfigError::Missing("JWT_SECRET".into())),
        };

        let smtp = match (get("SMTP_HOST"), get("MAIL_FROM")) {
            (Some(host), Some(from)) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from,
            }),
            (Some(_), None) => return Err(ConfigError::Missing("MAIL_FROM".into())),
            _ => None,
        };

        Ok(Self {
            bind: parse_or(
                "BAZAAR_BIND",
                get("BAZAAR_BIND"),
                SocketAddr::from(([0, 0, 0, 0], 8080)),
            )?,
            jwt_secret,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                10,
            )?,
            smtp,
            job_workers: parse_or("JOB_WORKERS", get("JOB_WORKERS"), 4usize)?.max(1),
            import_timeout: Duration::from_secs(parse_or(
                "IMPORT_TIMEOUT_SECS",
                get("IMPORT_TIMEOUT_SECS"),
                300,
            )?),
            job_poll_interval: Duration::from_millis(parse_or(
                "JOB_POLL_INTERVAL_MS",
                get("JOB_POLL_INTERVAL_MS"),
                100,
            )?),
            log_format: get("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
