use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("SECRET_KEY is required and cannot be empty")]
    EmptySecret,
    #[error("{key} must be an integer, got {value:?}")]
    InvalidInteger { key: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub max_overflow: u32,
    pub recycle_secs: u64,
    pub echo: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub server: ServerConfig,
    pub environment: Option<String>,
    pub debug: bool,
    pub log_json: bool,
}

/// Drops unset or blank entries and lower-cases keys.
///
/// A value of `None` stands for a variable that exists but could not be read
/// as UTF-8; it is treated like an absent one.
pub fn normalize_env<I, K>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, Option<String>)>,
    K: AsRef<str>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            let value = value?;
            if value.trim().is_empty() {
                return None;
            }
            Some((key.as_ref().to_lowercase(), value))
        })
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_int<T: std::str::FromStr>(
    map: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match map.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidInteger {
                key,
                value: raw.clone(),
            }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars = std::env::vars_os().filter_map(|(k, v)| {
            let key = k.into_string().ok()?;
            Some((key, v.into_string().ok()))
        });
        Self::from_map(&normalize_env(vars))
    }

    /// Builds the typed configuration from an already normalized map.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let secret = map
            .get("secret_key")
            .cloned()
            .ok_or(ConfigError::EmptySecret)?;
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        let ttl_minutes = parse_int::<i64>(map, "access_token_expire_minutes")?
            .ok_or(ConfigError::Missing("ACCESS_TOKEN_EXPIRE_MINUTES"))?;

        let url = map
            .get("database_url")
            .map(|v| v.trim().to_string())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let database = DatabaseConfig {
            url,
            pool_size: parse_int(map, "db_pool_size")?.unwrap_or(10),
            max_overflow: parse_int(map, "db_max_overflow")?.unwrap_or(20),
            recycle_secs: parse_int(map, "db_pool_recycle_secs")?.unwrap_or(3600),
            echo: map.get("sql_echo").map(|v| parse_flag(v)).unwrap_or(false),
        };

        let server = ServerConfig {
            host: map
                .get("app_host")
                .cloned()
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_int(map, "app_port")?.unwrap_or(8080),
        };

        Ok(Self {
            database,
            jwt: JwtConfig {
                secret,
                ttl_minutes,
            },
            server,
            environment: map.get("environment").map(|v| v.trim().to_lowercase()),
            debug: map.get("debug").map(|v| parse_flag(v)).unwrap_or(false),
            log_json: map
                .get("log_format")
                .map(|v| v.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.as_deref() == Some("production")
    }
}
