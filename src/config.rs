// src/config.rs
use std::time::Duration;

use reqwest::Url;

use crate::error::{ClientError, ClientResult, ConfigError};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_REDIRECT_DELAY_MS: u64 = 1000;
const DEFAULT_BANNER_TTL_MS: u64 = 3000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub push_enabled: bool,
    pub request_timeout: Option<Duration>,
    pub redirect_delay: Duration,
    pub banner_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            push_enabled: true,
            request_timeout: None,
            redirect_delay: Duration::from_millis(DEFAULT_REDIRECT_DELAY_MS),
            banner_ttl: Duration::from_millis(DEFAULT_BANNER_TTL_MS),
        }
    }

    /// Reads `CHAT_*` variables, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var("CHAT_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        };
        Url::parse(&config.base_url).map_err(|e| ConfigError::Invalid {
            name: "CHAT_BASE_URL",
            reason: e.to_string(),
        })?;

        if let Some(enabled) = read_var("CHAT_PUSH_ENABLED", parse_bool)? {
            config.push_enabled = enabled;
        }
        if let Some(secs) = read_var("CHAT_REQUEST_TIMEOUT_SECS", parse_u64)? {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(ms) = read_var("CHAT_REDIRECT_DELAY_MS", parse_u64)? {
            config.redirect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = read_var("CHAT_BANNER_TTL_MS", parse_u64)? {
            config.banner_ttl = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Engine.IO v4 WebSocket address derived from the HTTP origin.
    pub fn push_url(&self) -> ClientResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(ClientError::InvalidUrl(format!("unsupported scheme '{other}'"))),
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::InvalidUrl(format!("cannot switch to {scheme}")))?;

        let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_query(Some("EIO=4&transport=websocket"));
        Ok(url)
    }
}

fn read_var<T>(
    name: &'static str,
    parse: fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse(raw.trim())
            .map(Some)
            .map_err(|reason| ConfigError::Invalid { name, reason }),
        _ => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}

fn parse_u64(raw: &str) -> Result<u64, String> {
    raw.parse::<u64>().map_err(|e| e.to_string())
}
