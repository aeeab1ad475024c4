//! Server configuration parsed from environment variables.

use std::net::IpAddr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_AUTH_PORT: u16 = 4444;
pub const DEFAULT_QUERY_PORT: u16 = 4445;
pub const DEFAULT_PASSWORD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_AUTH_ATTEMPTS: u32 = 3;
pub const DEFAULT_AUTH_TOKEN_LENGTH: usize = 8;
pub const DEFAULT_NASA_API_KEY: &str = "DEMO_KEY";
pub const DEFAULT_APOD_BASE_URL: &str = "https://api.nasa.gov/planetary/apod";
pub const DEFAULT_INSIGHT_URL: &str = "https://api.nasa.gov/insight_weather/";
pub const DEFAULT_PROVIDER_REQUEST_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_PROVIDER_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub apod_base_url: String,
    pub insight_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub auth_port: u16,
    pub query_port: u16,
    /// How long the handshake waits for each password frame.
    pub password_timeout: Duration,
    pub max_auth_attempts: u32,
    /// Token characters issued per username character.
    pub auth_token_length: usize,
    /// `None` keeps sessions until revoked.
    pub session_idle_timeout: Option<Duration>,
    /// Extra `user:pass` accounts on top of the built-in ones.
    pub extra_users: Vec<(String, String)>,
    pub provider: ProviderConfig,
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// Optional:
    /// - `STRATONET_BIND`: listen address (default `0.0.0.0`)
    /// - `AUTH_PORT`, `QUERY_PORT`: default 4444 / 4445
    /// - `PASSWORD_TIMEOUT_SECS`: default 30
    /// - `MAX_AUTH_ATTEMPTS`: default 3
    /// - `AUTH_TOKEN_LENGTH`: default 8
    /// - `SESSION_IDLE_TIMEOUT_SECS`: sessions never expire when absent
    /// - `STRATONET_USERS`: `user:pass,user:pass`
    /// - `NASA_API_KEY`, `APOD_BASE_URL`, `INSIGHT_URL`
    /// - `PROVIDER_REQUEST_TIMEOUT_SECS`, `PROVIDER_CONNECT_TIMEOUT_SECS`: default 20 / 5
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_raw = std::env::var("STRATONET_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse()
            .map_err(|_| ConfigError::Invalid { var: "STRATONET_BIND", value: bind_raw.clone() })?;

        let session_idle_timeout = std::env::var("SESSION_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let extra_users = match std::env::var("STRATONET_USERS") {
            Ok(raw) => parse_users(&raw)?,
            Err(_) => Vec::new(),
        };

        let provider = ProviderConfig {
            api_key: std::env::var("NASA_API_KEY").unwrap_or_else(|_| DEFAULT_NASA_API_KEY.to_string()),
            apod_base_url: std::env::var("APOD_BASE_URL").unwrap_or_else(|_| DEFAULT_APOD_BASE_URL.to_string()),
            insight_url: std::env::var("INSIGHT_URL").unwrap_or_else(|_| DEFAULT_INSIGHT_URL.to_string()),
            request_timeout: Duration::from_secs(env_parse(
                "PROVIDER_REQUEST_TIMEOUT_SECS",
                DEFAULT_PROVIDER_REQUEST_TIMEOUT_SECS,
            )),
            connect_timeout: Duration::from_secs(env_parse(
                "PROVIDER_CONNECT_TIMEOUT_SECS",
                DEFAULT_PROVIDER_CONNECT_TIMEOUT_SECS,
            )),
        };

        Ok(Self {
            bind,
            auth_port: env_parse("AUTH_PORT", DEFAULT_AUTH_PORT),
            query_port: env_parse("QUERY_PORT", DEFAULT_QUERY_PORT),
            password_timeout: Duration::from_secs(env_parse("PASSWORD_TIMEOUT_SECS", DEFAULT_PASSWORD_TIMEOUT_SECS)),
            max_auth_attempts: env_parse("MAX_AUTH_ATTEMPTS", DEFAULT_MAX_AUTH_ATTEMPTS).max(1),
            auth_token_length: env_parse("AUTH_TOKEN_LENGTH", DEFAULT_AUTH_TOKEN_LENGTH).max(1),
            session_idle_timeout,
            extra_users,
            provider,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            auth_port: DEFAULT_AUTH_PORT,
            query_port: DEFAULT_QUERY_PORT,
            password_timeout: Duration::from_secs(DEFAULT_PASSWORD_TIMEOUT_SECS),
            max_auth_attempts: DEFAULT_MAX_AUTH_ATTEMPTS,
            auth_token_length: DEFAULT_AUTH_TOKEN_LENGTH,
            session_idle_timeout: None,
            extra_users: Vec::new(),
            provider: ProviderConfig {
                api_key: DEFAULT_NASA_API_KEY.to_string(),
                apod_base_url: DEFAULT_APOD_BASE_URL.to_string(),
                insight_url: DEFAULT_INSIGHT_URL.to_string(),
                request_timeout: Duration::from_secs(DEFAULT_PROVIDER_REQUEST_TIMEOUT_SECS),
                connect_timeout: Duration::from_secs(DEFAULT_PROVIDER_CONNECT_TIMEOUT_SECS),
            },
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_users(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((user, pass)) if !user.is_empty() => Ok((user.to_string(), pass.to_string())),
            _ => Err(ConfigError::Invalid { var: "STRATONET_USERS", value: entry.to_string() }),
        })
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
