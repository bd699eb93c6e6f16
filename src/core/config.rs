use std::{path::PathBuf, time::Duration};

use tracing::warn;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 120;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const SIGN_URL_TTL: Duration = Duration::from_secs(55 * 60);

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub http_timeout: Duration,
    pub sign_url_ttl: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            data_dir: PathBuf::from(".lumi-reader"),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_poll_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            sign_url_ttl: SIGN_URL_TTL,
        }
    }
}

impl ReaderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source; unset or invalid
    /// values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let api_base_url = lookup("LUMI_API_BASE")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.api_base_url);
        let data_dir = lookup("LUMI_DATA_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let poll_interval = parse_number::<u64>(&lookup, "LUMI_POLL_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        let max_poll_attempts = parse_number::<u32>(&lookup, "LUMI_POLL_MAX_ATTEMPTS")
            .filter(|value| *value > 0)
            .unwrap_or(defaults.max_poll_attempts);
        let http_timeout = parse_number::<u64>(&lookup, "LUMI_HTTP_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        Self {
            api_base_url,
            data_dir,
            poll_interval,
            max_poll_attempts,
            http_timeout,
            sign_url_ttl: defaults.sign_url_ttl,
        }
    }
}

fn parse_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid numeric setting");
            None
        }
    }
}

pub fn env_flag_enabled(value: Option<String>) -> bool {
    matches!(
        value.unwrap_or_default().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
