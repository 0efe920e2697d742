//! Data contracts shared by the orchestrator and its collaborators

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification payload produced by a watcher (or synthesized for recovery)
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Overrides the orchestrator's default cooldown for the onset decision
    pub cooldown: Option<Duration>,
}

impl Alert {
    /// Create an alert stamped with the current time
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            url: None,
            timestamp: Utc::now(),
            cooldown: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }
}

/// Point-in-time outcome of a single watcher check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckResult {
    pub is_triggered: bool,
    /// Empty when not triggered
    pub alerts: Vec<Alert>,
    /// Human summary, used as recovery text when present
    pub message: Option<String>,
}

impl CheckResult {
    /// A triggered result carrying the given alerts
    pub fn triggered(alerts: Vec<Alert>) -> Self {
        Self {
            is_triggered: true,
            alerts,
            message: None,
        }
    }

    /// A non-triggered, alert-less result
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Last known alarm state of a watcher, as persisted by a [`StateStore`]
///
/// A missing record is equivalent to `WatcherState::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherState {
    pub is_triggered: bool,
    /// Set on every dispatch, including recovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_notification: Option<DateTime<Utc>>,
}

impl WatcherState {
    pub fn triggered_at(at: DateTime<Utc>) -> Self {
        Self {
            is_triggered: true,
            last_notification: Some(at),
        }
    }

    pub fn recovered_at(at: DateTime<Utc>) -> Self {
        Self {
            is_triggered: false,
            last_notification: Some(at),
        }
    }
}

/// Evaluates one monitored condition
///
/// Ordinary observation failures (upstream unavailable, malformed data)
/// should be reported as [`CheckResult::clear`]. `Err` is reserved for
/// exceptional conditions; the orchestrator skips the watcher for that pass.
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Stable identity, the join key for persisted state
    fn id(&self) -> &str;

    async fn check(&self) -> Result<CheckResult, WatcherError>;
}

/// Delivers alerts to an external channel
///
/// Implementations log and swallow their own delivery failures: a returned
/// call counts as a dispatch for state purposes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert);
}

/// Durable per-watcher state
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_watcher_state(&self, id: &str) -> Result<Option<WatcherState>, StoreError>;

    /// Fully replaces any prior value for `id`
    async fn set_watcher_state(&self, id: &str, state: WatcherState) -> Result<(), StoreError>;
}

/// Exceptional watcher failures
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Watcher failed: {0}")]
    Internal(String),
}

/// State store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted state: {0}")]
    Corrupted(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Remote store error: {0}")]
    Remote(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_json_shape() {
        let at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_value(WatcherState::triggered_at(at)).unwrap();
        assert_eq!(json["isTriggered"], true);
        assert_eq!(json["lastNotification"], "2023-01-01T00:00:00Z");

        let json = serde_json::to_value(WatcherState::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "isTriggered": false }));
    }

    #[test]
    fn test_state_parses_millisecond_timestamps() {
        let state: WatcherState = serde_json::from_str(
            r#"{"isTriggered":true,"lastNotification":"2023-01-01T00:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(
            state,
            WatcherState::triggered_at(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        );

        let state: WatcherState = serde_json::from_str(r#"{"isTriggered":false}"#).unwrap();
        assert_eq!(state, WatcherState::default());
    }

    #[test]
    fn test_check_result_builders() {
        let result = CheckResult::clear().with_message("ok");
        assert!(!result.is_triggered);
        assert!(result.alerts.is_empty());
        assert_eq!(result.message.as_deref(), Some("ok"));

        let alert = Alert::new("t", "m").with_cooldown(Duration::ZERO);
        let result = CheckResult::triggered(vec![alert]);
        assert!(result.is_triggered);
        assert_eq!(result.alerts[0].cooldown, Some(Duration::ZERO));
    }
}
