//! Upstash Redis REST client and the remote state store built on it

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::domain::{StateStore, StoreError, WatcherState};

/// Minimal client for the Upstash Redis REST API
///
/// Values are stored as JSON strings, the layout the Upstash SDKs use for
/// objects.
#[derive(Debug, Clone)]
pub struct UpstashClient {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

impl UpstashClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn command_url(&self, command: &str, key: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StoreError::Remote(format!("invalid base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Remote("base url cannot have a path".to_string()))?
            .pop_if_empty()
            .push(command)
            .push(key);
        Ok(url)
    }

    /// GET a key; string values holding JSON are decoded
    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let url = self.command_url("get", key)?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Remote(e.to_string()))?;

        let result = Self::read_result(response).await?;
        Ok(match result {
            serde_json::Value::Null => None,
            serde_json::Value::String(raw) => {
                Some(serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)))
            }
            other => Some(other),
        })
    }

    /// SET a key to the JSON encoding of `value`
    pub async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let url = self.command_url("set", key)?;
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.token)
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| StoreError::Remote(e.to_string()))?;

        Self::read_result(response).await.map(|_| ())
    }

    async fn read_result(response: reqwest::Response) -> Result<serde_json::Value, StoreError> {
        let status = response.status();
        let body: RestResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Remote(format!("status {}: {}", status, e)))?;

        if let Some(error) = body.error {
            return Err(StoreError::Remote(error));
        }
        if !status.is_success() {
            return Err(StoreError::Remote(format!("status {}", status)));
        }
        Ok(body.result)
    }
}

/// State store keeping one remote key per watcher
pub struct RemoteStateStore {
    client: UpstashClient,
    prefix: String,
}

impl RemoteStateStore {
    pub fn new(client: UpstashClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }
}

#[async_trait]
impl StateStore for RemoteStateStore {
    async fn get_watcher_state(&self, id: &str) -> Result<Option<WatcherState>, StoreError> {
        match self.client.get(&self.key(id)).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::Corrupted(format!("{}: {}", self.key(id), e))),
            None => Ok(None),
        }
    }

    async fn set_watcher_state(&self, id: &str, state: WatcherState) -> Result<(), StoreError> {
        let value =
            serde_json::to_value(state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.client.set(&self.key(id), &value).await
    }
}
