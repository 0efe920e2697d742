//! Watcher rule definitions and their hot-reloadable sources

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::store::UpstashClient;

/// Which side of the threshold raises the alarm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Above,
    Below,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }

    /// Whether `price` is on the alarmed side of `threshold` (inclusive)
    pub fn is_crossed(&self, price: f64, threshold: f64) -> bool {
        match self {
            Direction::Above => price >= threshold,
            Direction::Below => price <= threshold,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price threshold rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoRule {
    pub coin_id: String,
    pub currency: String,
    pub threshold: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_cooldown_ms() -> u64 {
    60 * 60 * 1000
}

impl CryptoRule {
    pub fn new(
        coin_id: impl Into<String>,
        currency: impl Into<String>,
        threshold: f64,
        direction: Direction,
    ) -> Self {
        Self {
            coin_id: coin_id.into(),
            currency: currency.into(),
            threshold,
            direction,
            cooldown_ms: default_cooldown_ms(),
        }
    }

    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Rule file layout: `{"rules": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub rules: Vec<CryptoRule>,
}

impl Settings {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidRules(e.to_string()))
    }
}

/// Where rules are loaded from before each pass
///
/// The remote key wins when it holds a valid rule list; otherwise the local
/// file is used. A missing file means no rules.
pub struct RuleSource {
    file: Option<PathBuf>,
    remote: Option<(UpstashClient, String)>,
}

impl RuleSource {
    pub fn new() -> Self {
        Self {
            file: None,
            remote: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_remote(mut self, client: UpstashClient, key: impl Into<String>) -> Self {
        self.remote = Some((client, key.into()));
        self
    }

    /// Load the current rule list
    pub async fn load(&self) -> Result<Vec<CryptoRule>, ConfigError> {
        let mut last_error = None;

        if let Some((client, key)) = &self.remote {
            match self.load_remote(client, key).await {
                Ok(Some(rules)) => return Ok(rules),
                Ok(None) => tracing::debug!(key = %key, "No remote rules, falling back to file"),
                Err(e) => {
                    tracing::warn!(error = %e, "Remote rules unavailable, falling back to file");
                    last_error = Some(e);
                }
            }
        }

        match &self.file {
            Some(path) => self.load_file(path).await,
            None => match last_error {
                Some(e) => Err(e),
                None => Ok(Vec::new()),
            },
        }
    }

    async fn load_remote(
        &self,
        client: &UpstashClient,
        key: &str,
    ) -> Result<Option<Vec<CryptoRule>>, ConfigError> {
        let value = client
            .get(key)
            .await
            .map_err(|e| ConfigError::RuleSource(e.to_string()))?;

        match value {
            Some(value) => Ok(Some(Settings::from_json(value)?.rules)),
            None => Ok(None),
        }
    }

    async fn load_file(&self, path: &Path) -> Result<Vec<CryptoRule>, ConfigError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "Settings file not found, using empty rules"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(ConfigError::RuleSource(e.to_string())),
        };

        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ConfigError::InvalidRules(e.to_string()))?;
        Ok(Settings::from_json(value)?.rules)
    }
}

impl Default for RuleSource {
    fn default() -> Self {
        Self::new()
    }
}
