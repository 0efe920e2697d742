//! Service configuration
//!
//! Process settings come from environment variables; the watcher rule list
//! comes from a [`RuleSource`] and is reloaded before every pass.

pub mod rules;

pub use rules::{CryptoRule, Direction, RuleSource, Settings};

use std::path::PathBuf;
use std::time::Duration;

use crate::notifiers::WebhookFormat;

pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_KEY_PREFIX: &str = "watchbell:";

/// Where watcher state is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    File { path: PathBuf },
    Redis,
    Memory,
}

/// Upstash Redis REST credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstashConfig {
    pub url: String,
    pub token: String,
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub webhook_url: String,
    pub webhook_format: WebhookFormat,
    pub store: StoreBackend,
    pub upstash: Option<UpstashConfig>,
    pub key_prefix: String,
    pub settings_path: PathBuf,
    pub price_api_url: String,
    pub coingecko_api_key: Option<String>,
    /// `None` disables the interval timer
    pub check_interval: Option<Duration>,
    pub default_cooldown: Duration,
    pub concurrent_checks: bool,
}

impl AppConfig {
    /// Read configuration from the process environment
    ///
    /// WEBHOOK_URL (or DISCORD_WEBHOOK_URL) is required. Variables are
    /// listed on [`AppConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// - WATCHBELL_HOST: bind address (default: 0.0.0.0)
    /// - PORT: port number (default: 8080)
    /// - WEBHOOK_URL / DISCORD_WEBHOOK_URL: notification endpoint
    /// - WEBHOOK_FORMAT: json | discord
    /// - STATE_STORE_TYPE: file | redis | memory (default: file)
    /// - STATE_FILE: file store path (default: .state.json)
    /// - UPSTASH_REDIS_REST_URL / UPSTASH_REDIS_REST_TOKEN: remote key-value store
    /// - REDIS_KEY_PREFIX: remote key prefix (default: watchbell:)
    /// - SETTINGS_PATH: rule file (default: settings.json)
    /// - PRICE_API_URL / COINGECKO_API_KEY: price API
    /// - CHECK_INTERVAL_SECS: periodic pass interval, 0 or unset disables
    /// - DEFAULT_COOLDOWN_MS: default cooldown (default: 3600000)
    /// - CONCURRENT_CHECKS: run check steps concurrently (default: false)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("WATCHBELL_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var(&var, "PORT")?.unwrap_or(8080);

        let generic_url = var("WEBHOOK_URL");
        let discord_url = var("DISCORD_WEBHOOK_URL");
        let webhook_format = match var("WEBHOOK_FORMAT") {
            Some(format) => format
                .parse()
                .map_err(|reason| ConfigError::Invalid {
                    key: "WEBHOOK_FORMAT",
                    reason,
                })?,
            None if generic_url.is_none() && discord_url.is_some() => WebhookFormat::Discord,
            None => WebhookFormat::Json,
        };
        let webhook_url = generic_url
            .or(discord_url)
            .ok_or(ConfigError::Missing("WEBHOOK_URL"))?;
        reqwest::Url::parse(&webhook_url).map_err(|e| ConfigError::Invalid {
            key: "WEBHOOK_URL",
            reason: e.to_string(),
        })?;

        let upstash = match (var("UPSTASH_REDIS_REST_URL"), var("UPSTASH_REDIS_REST_TOKEN")) {
            (Some(url), Some(token)) => Some(UpstashConfig { url, token }),
            _ => None,
        };

        let store = match var("STATE_STORE_TYPE").as_deref() {
            None | Some("file") => StoreBackend::File {
                path: var("STATE_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".state.json")),
            },
            Some("redis") => {
                if upstash.is_none() {
                    return Err(ConfigError::Missing(
                        "UPSTASH_REDIS_REST_URL/UPSTASH_REDIS_REST_TOKEN",
                    ));
                }
                StoreBackend::Redis
            }
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STATE_STORE_TYPE",
                    reason: format!("unknown store type '{}'", other),
                })
            }
        };

        let check_interval = parse_var::<u64>(&var, "CHECK_INTERVAL_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let default_cooldown = parse_var::<u64>(&var, "DEFAULT_COOLDOWN_MS")?
            .map(Duration::from_millis)
            .unwrap_or(crate::domain::DEFAULT_COOLDOWN);
        let concurrent_checks = var("CONCURRENT_CHECKS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            host,
            port,
            webhook_url,
            webhook_format,
            store,
            upstash,
            key_prefix: var("REDIS_KEY_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            settings_path: var("SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("settings.json")),
            price_api_url: var("PRICE_API_URL")
                .unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string()),
            coingecko_api_key: var("COINGECKO_API_KEY"),
            check_interval,
            default_cooldown,
            concurrent_checks,
        })
    }

    /// Remote key holding the rule list
    pub fn rules_key(&self) -> String {
        format!("{}config:rules", self.key_prefix)
    }

    /// Prefix for per-watcher state keys
    pub fn state_key_prefix(&self) -> String {
        format!("{}watcher:", self.key_prefix)
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Invalid rule list: {0}")]
    InvalidRules(String),

    #[error("Rule source unavailable: {0}")]
    RuleSource(String),
}
