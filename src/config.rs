use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://campus.db?mode=rwc";

/// Longest accepted token lifetime: a century.
pub const MAX_TOKEN_TTL_HOURS: i64 = 100 * 365 * 24;

/// Runtime settings, read once at start-up and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub database_url: String,
    /// Public base used to build image `url` fields.
    pub app_url: String,
    pub token_ttl: Duration,
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            app_url: "http://127.0.0.1:3000".to_string(),
            token_ttl: Duration::days(2),
            max_connections: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();
        Ok(Self {
            listen: var("LISTEN_ADDR", defaults.listen)?,
            database_url: var("DATABASE_URL", defaults.database_url)?,
            app_url: var("APP_URL", defaults.app_url)?,
            token_ttl: token_ttl(var("TOKEN_TTL_HOURS", defaults.token_ttl.num_hours())?)?,
            max_connections: var("DB_MAX_CONNECTIONS", defaults.max_connections)?,
        })
    }

    pub fn serve_url(&self, image_id: i64) -> String {
        format!(
            "{}/api/images/{}/serve",
            self.app_url.trim_end_matches('/'),
            image_id
        )
    }
}

fn token_ttl(hours: i64) -> anyhow::Result<Duration> {
    if !(0..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
        anyhow::bail!(
            "TOKEN_TTL_HOURS must be between 0 and {}, got {}",
            MAX_TOKEN_TTL_HOURS,
            hours
        );
    }
    Ok(Duration::hours(hours))
}

fn var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid value `{}` for {}: {}", raw, name, err)),
        Err(_) => Ok(default),
    }
}
