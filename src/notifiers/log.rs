//! Tracing-backed notifier

use async_trait::async_trait;

use crate::domain::{Alert, Notifier};

/// Writes alerts to the log instead of an external channel
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) {
        tracing::warn!(
            title = %alert.title,
            url = alert.url.as_deref().unwrap_or(""),
            timestamp = %alert.timestamp.to_rfc3339(),
            "Alert: {}",
            alert.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notification() {
        // Log notification always returns
        LogNotifier.notify(&Alert::new("Test", "test message")).await;
    }
}
