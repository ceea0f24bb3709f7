use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use crate::redact::Redacted;

#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub log_level: String,
}

/// Connection pool settings for the application database.
///
/// TLS (`ssl`) is only used when `APP_ENV=production`, and even then
/// `DB_SSL=false` turns it off. Both timeouts must be non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Redacted<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout: Duration,
    pub connection_timeout: Duration,
    pub ssl: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.key, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db = DbConfig::from_env()?;
        let log_level = env_or("MONEYWISE_LOG_LEVEL", "info");
        Ok(Config { db, log_level })
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "moneywise".to_string(),
            user: "postgres".to_string(),
            password: Redacted::new("password".to_string()),
            max_connections: 20,
            min_connections: 2,
            idle_timeout: Duration::from_millis(30_000),
            connection_timeout: Duration::from_millis(2_000),
            ssl: false,
        }
    }
}

impl DbConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Unset keys fall
    /// back to the defaults; set keys must parse or the whole load fails.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DbConfig::default();

        let host = lookup("DB_HOST").unwrap_or(defaults.host);
        let port = parse_or(&lookup, "DB_PORT", defaults.port)?;
        let database = lookup("DB_NAME").unwrap_or(defaults.database);
        let user = lookup("DB_USER").unwrap_or(defaults.user);
        let password = lookup("DB_PASSWORD")
            .map(Redacted::new)
            .unwrap_or(defaults.password);

        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?;
        if max_connections == 0 {
            return Err(ConfigError {
                key: "DB_MAX_CONNECTIONS",
                message: "must be at least 1".to_string(),
            });
        }

        let min_connections = parse_or(&lookup, "DB_MIN_CONNECTIONS", defaults.min_connections)?;
        if min_connections > max_connections {
            return Err(ConfigError {
                key: "DB_MIN_CONNECTIONS",
                message: format!("{min_connections} exceeds DB_MAX_CONNECTIONS ({max_connections})"),
            });
        }

        let idle_timeout = parse_timeout(&lookup, "DB_IDLE_TIMEOUT", defaults.idle_timeout)?;
        let connection_timeout =
            parse_timeout(&lookup, "DB_CONNECTION_TIMEOUT", defaults.connection_timeout)?;

        let production = lookup("APP_ENV").as_deref() == Some("production");
        let ssl = production && lookup("DB_SSL").as_deref() != Some("false");

        Ok(DbConfig {
            host,
            port,
            database,
            user,
            password,
            max_connections,
            min_connections,
            idle_timeout,
            connection_timeout,
            ssl,
        })
    }

    /// Driver connect options. With `ssl` on, TLS is required but the server
    /// certificate is not verified.
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(self.password.expose())
            .ssl_mode(ssl_mode)
    }

    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .idle_timeout(self.idle_timeout)
            .acquire_timeout(self.connection_timeout)
    }
}

/// Operator-facing summary. The password is left out entirely.
impl fmt::Display for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Database configuration:")?;
        writeln!(f, "  host: {}", self.host)?;
        writeln!(f, "  port: {}", self.port)?;
        writeln!(f, "  database: {}", self.database)?;
        writeln!(f, "  user: {}", self.user)?;
        writeln!(f, "  max connections: {}", self.max_connections)?;
        writeln!(f, "  min connections: {}", self.min_connections)?;
        writeln!(f, "  idle timeout: {}ms", self.idle_timeout.as_millis())?;
        writeln!(f, "  connection timeout: {}ms", self.connection_timeout.as_millis())?;
        write!(f, "  ssl: {}", if self.ssl { "enabled" } else { "disabled" })
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| ConfigError {
            key,
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

/// Millisecond timeout. Zero would make sqlx expire immediately, so it is
/// rejected.
fn parse_timeout<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let millis = parse_or(lookup, key, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(ConfigError {
            key,
            message: "must be at least 1ms".to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
