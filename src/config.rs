use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Service configuration, read once at startup.
///
/// | Env Var              | Default   |
/// |----------------------|-----------|
/// | `DATABASE_URL`       | required  |
/// | `HOST`               | `0.0.0.0` |
/// | `PORT`               | `8081`    |
/// | `API_PREFIX`         | `api`     |
/// | `DB_MAX_CONNECTIONS` | `10`      |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so parsing can be tested without
    /// touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL not set")?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "PORT", 8081)?;
        let api_prefix = lookup("API_PREFIX")
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "api".into());
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?;

        Ok(Self {
            database_url,
            host,
            port,
            api_prefix,
            db_max_connections,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value {raw:?}")),
        None => Ok(default),
    }
}
