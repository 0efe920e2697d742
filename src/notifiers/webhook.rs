//! HTTP webhook notifier

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Alert, Notifier};

/// Embed color used for Discord messages
const DISCORD_EMBED_COLOR: u32 = 15158332;

/// Payload layout posted to the webhook
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookFormat {
    /// `{title, message, url?, timestamp}`
    #[default]
    Json,
    /// Discord `embeds` message
    Discord,
}

impl FromStr for WebhookFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(WebhookFormat::Json),
            "discord" => Ok(WebhookFormat::Discord),
            other => Err(format!("unknown webhook format '{}'", other)),
        }
    }
}

/// Posts each alert as JSON to a fixed endpoint
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    format: WebhookFormat,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url: url.into(),
            format: WebhookFormat::default(),
        }
    }

    pub fn with_format(mut self, format: WebhookFormat) -> Self {
        self.format = format;
        self
    }

    /// Request body for `alert`
    pub fn payload(&self, alert: &Alert) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("title".to_string(), alert.title.clone().into());
        let text_key = match self.format {
            WebhookFormat::Json => "message",
            WebhookFormat::Discord => "description",
        };
        body.insert(text_key.to_string(), alert.message.clone().into());
        if let Some(url) = &alert.url {
            body.insert("url".to_string(), url.clone().into());
        }
        body.insert("timestamp".to_string(), alert.timestamp.to_rfc3339().into());

        match self.format {
            WebhookFormat::Json => serde_json::Value::Object(body),
            WebhookFormat::Discord => {
                body.insert("color".to_string(), DISCORD_EMBED_COLOR.into());
                serde_json::json!({ "embeds": [body] })
            }
        }
    }

    /// Deliver `alert`, reporting failures to the caller
    pub async fn send(&self, alert: &Alert) -> Result<(), NotifierError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(alert))
            .send()
            .await
            .map_err(|e| NotifierError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifierError::Status(response.status().as_u16()));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) {
        match self.send(alert).await {
            Ok(()) => tracing::debug!(title = %alert.title, "Webhook notification sent"),
            Err(e) => tracing::error!(
                title = %alert.title,
                error = %e,
                "Failed to send webhook notification"
            ),
        }
    }
}

/// Webhook delivery errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Webhook returned status {0}")]
    Status(u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_mock_server;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Received = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn mock_webhook(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let handler = move |State(received): State<Received>, Json(body): Json<serde_json::Value>| {
            async move {
                received.lock().push(body);
                status
            }
        };
        let router = Router::new()
            .route("/hook", post(handler))
            .with_state(Arc::clone(&received));
        let base = spawn_mock_server(router).await;
        (format!("{}/hook", base), received)
    }

    fn alert() -> Alert {
        Alert::new("Bitcoin Price Alert", "bitcoin price is 20000000 JPY")
            .with_url("https://www.coingecko.com/en/coins/bitcoin")
            .with_timestamp(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<WebhookFormat>(), Ok(WebhookFormat::Json));
        assert_eq!("Discord".parse::<WebhookFormat>(), Ok(WebhookFormat::Discord));
        assert!("slack".parse::<WebhookFormat>().is_err());
    }

    #[test]
    fn test_json_payload_omits_missing_url() {
        let notifier = WebhookNotifier::new("http://unused");
        let payload = notifier.payload(&Alert::new("t", "m"));
        assert!(payload.get("url").is_none());
        assert_eq!(payload["title"], "t");
        assert_eq!(payload["message"], "m");
        assert!(payload["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_posts_json_payload() {
        let (url, received) = mock_webhook(StatusCode::NO_CONTENT).await;
        let notifier = WebhookNotifier::new(url);

        notifier.send(&alert()).await.unwrap();

        let bodies = received.lock().clone();
        assert_eq!(
            bodies,
            vec![serde_json::json!({
                "title": "Bitcoin Price Alert",
                "message": "bitcoin price is 20000000 JPY",
                "url": "https://www.coingecko.com/en/coins/bitcoin",
                "timestamp": "2024-06-01T12:00:00+00:00"
            })]
        );
    }

    #[tokio::test]
    async fn test_posts_discord_embed() {
        let (url, received) = mock_webhook(StatusCode::NO_CONTENT).await;
        let notifier = WebhookNotifier::new(url).with_format(WebhookFormat::Discord);

        notifier.notify(&alert()).await;

        let bodies = received.lock().clone();
        let embed = &bodies[0]["embeds"][0];
        assert_eq!(embed["title"], "Bitcoin Price Alert");
        assert_eq!(embed["description"], "bitcoin price is 20000000 JPY");
        assert_eq!(embed["color"], DISCORD_EMBED_COLOR);
    }

    #[tokio::test]
    async fn test_error_status_is_reported_but_notify_returns() {
        let (url, received) = mock_webhook(StatusCode::INTERNAL_SERVER_ERROR).await;
        let notifier = WebhookNotifier::new(url);

        assert!(matches!(
            notifier.send(&alert()).await,
            Err(NotifierError::Status(500))
        ));
        notifier.notify(&alert()).await;
        assert_eq!(received.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");

        assert!(matches!(
            notifier.send(&alert()).await,
            Err(NotifierError::Webhook(_))
        ));
        notifier.notify(&alert()).await;
    }
}
