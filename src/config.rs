// Configuration - Environment Variables
//
// Every variable has a development default. Malformed or out-of-range
// values fail fast.

use crate::reconciliation::UnknownCategoryPolicy;
use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Development-only signing secret, used when `JWT_SECRET` is unset.
pub const INSECURE_JWT_SECRET: &str = "development-jwt-secret-change-me";

/// SQLite takes the busy timeout as an i32 millisecond count
const MAX_BUSY_TIMEOUT_MS: u64 = i32::MAX as u64;

/// 100 years
const MAX_TOKEN_TTL_HOURS: i64 = 876_600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub db_busy_timeout: Duration,
    pub unknown_categories: UnknownCategoryPolicy,
    pub characters_csv: PathBuf,
    pub planets_csv: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: "favorites.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            jwt_secret: INSECURE_JWT_SECRET.to_string(),
            token_ttl_hours: 80,
            db_busy_timeout: Duration::from_millis(5000),
            unknown_categories: UnknownCategoryPolicy::Reject,
            characters_csv: PathBuf::from("data/characters.csv"),
            planets_csv: PathBuf::from("data/planets.csv"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set, using insecure development secret");
                defaults.jwt_secret
            }
        };

        Ok(Config {
            db_path: get("FAVORITES_DB_PATH").unwrap_or(defaults.db_path),
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(get("PORT"), "PORT", defaults.port)?,
            jwt_secret,
            token_ttl_hours: in_range(
                parse(get("TOKEN_TTL_HOURS"), "TOKEN_TTL_HOURS", defaults.token_ttl_hours)?,
                "TOKEN_TTL_HOURS",
                1..=MAX_TOKEN_TTL_HOURS,
            )?,
            db_busy_timeout: Duration::from_millis(in_range(
                parse(
                    get("DB_BUSY_TIMEOUT_MS"),
                    "DB_BUSY_TIMEOUT_MS",
                    defaults.db_busy_timeout.as_millis() as u64,
                )?,
                "DB_BUSY_TIMEOUT_MS",
                1..=MAX_BUSY_TIMEOUT_MS,
            )?),
            unknown_categories: parse(
                get("UNKNOWN_CATEGORY_POLICY"),
                "UNKNOWN_CATEGORY_POLICY",
                defaults.unknown_categories,
            )?,
            characters_csv: get("CHARACTERS_CSV").map(PathBuf::from).unwrap_or(defaults.characters_csv),
            planets_csv: get("PLANETS_CSV").map(PathBuf::from).unwrap_or(defaults.planets_csv),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(value: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            message: e.to_string(),
        }),
    }
}

fn in_range<T>(value: T, var: &'static str, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var,
            message: format!("{} is outside {}..={}", value, range.start(), range.end()),
        })
    }
}
