//! Price threshold watcher backed by the CoinGecko simple price API

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CryptoRule, DEFAULT_PRICE_API_URL};
use crate::domain::{Alert, CheckResult, Watcher, WatcherError};

/// HTTP client for `/simple/price`, shared by all price watchers
#[derive(Debug, Clone)]
pub struct PriceClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl PriceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Demo API key sent as `x-cg-demo-api-key`
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Current price of `coin_id` in `currency`, `None` if the API omits it
    pub async fn simple_price(
        &self,
        coin_id: &str,
        currency: &str,
    ) -> Result<Option<f64>, PriceError> {
        let url = format!("{}/simple/price", self.base_url);
        let mut request = self
            .http_client
            .get(&url)
            .query(&[("ids", coin_id), ("vs_currencies", currency)])
            .header("Accept", "application/json");

        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PriceError::Network(e.to_string()))?;

        tracing::debug!(
            coin_id = %coin_id,
            status = %response.status(),
            "Price API response received"
        );

        if !response.status().is_success() {
            return Err(PriceError::Status(response.status().as_u16()));
        }

        let prices: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .map_err(|e| PriceError::Deserialization(e.to_string()))?;

        Ok(prices
            .get(coin_id)
            .and_then(|by_currency| by_currency.get(currency))
            .copied())
    }
}

impl Default for PriceClient {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_API_URL)
    }
}

/// Price API errors
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Price API returned status {0}")]
    Status(u16),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Alarms while a coin's price is at or beyond a threshold
pub struct CryptoWatcher {
    id: String,
    rule: CryptoRule,
    client: PriceClient,
}

impl CryptoWatcher {
    pub fn new(rule: CryptoRule, client: PriceClient) -> Self {
        let id = format!(
            "crypto-{}-{}-{}-{}",
            rule.coin_id, rule.currency, rule.direction, rule.threshold
        );
        Self { id, rule, client }
    }

    fn evaluate(&self, price: f64) -> CheckResult {
        let CryptoRule {
            coin_id,
            currency,
            threshold,
            direction,
            ..
        } = &self.rule;

        let is_triggered = direction.is_crossed(price, *threshold);
        tracing::debug!(
            watcher_id = %self.id,
            price,
            threshold = *threshold,
            direction = %direction,
            is_triggered,
            "Threshold check"
        );

        let alerts = if is_triggered {
            vec![Alert::new(
                format!("{} Price Alert", capitalize(coin_id)),
                format!(
                    "{} price is {} {} ({} threshold: {})",
                    coin_id,
                    price,
                    currency.to_uppercase(),
                    direction,
                    threshold
                ),
            )
            .with_url(format!("https://www.coingecko.com/en/coins/{}", coin_id))
            .with_cooldown(self.rule.cooldown())]
        } else {
            Vec::new()
        };

        CheckResult {
            is_triggered,
            alerts,
            message: Some(format!(
                "{} is {} {} ({} {})",
                coin_id, price, currency, direction, threshold
            )),
        }
    }
}

#[async_trait]
impl Watcher for CryptoWatcher {
    fn id(&self) -> &str {
        &self.id
    }

    async fn check(&self) -> Result<CheckResult, WatcherError> {
        match self
            .client
            .simple_price(&self.rule.coin_id, &self.rule.currency)
            .await
        {
            Ok(Some(price)) => Ok(self.evaluate(price)),
            Ok(None) => {
                tracing::warn!(watcher_id = %self.id, "Price data not found in response");
                Ok(CheckResult::clear())
            }
            Err(e) => {
                tracing::warn!(watcher_id = %self.id, error = %e, "Failed to fetch price");
                Ok(CheckResult::clear())
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
