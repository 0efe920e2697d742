//! Wiring between configuration, rule reloading and the orchestrator

use std::sync::Arc;

use crate::config::{AppConfig, ConfigError, RuleSource, StoreBackend};
use crate::domain::{Notifier, Orchestrator, PassReport, StateStore, Watcher};
use crate::notifiers::WebhookNotifier;
use crate::store::{InMemoryStateStore, JsonFileStateStore, RemoteStateStore, UpstashClient};
use crate::watchers::{self, PriceClient};

/// Runs evaluation passes, refreshing the watcher list from the rule source first
pub struct MonitorService {
    orchestrator: Arc<Orchestrator>,
    rules: Option<RuleSource>,
    prices: PriceClient,
}

impl MonitorService {
    /// A service with a fixed watcher list
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            rules: None,
            prices: PriceClient::default(),
        }
    }

    /// Reload price rules from `rules` before every pass
    pub fn with_rules(mut self, rules: RuleSource, prices: PriceClient) -> Self {
        self.rules = Some(rules);
        self.prices = prices;
        self
    }

    /// Build the full service described by `config`
    ///
    /// Fails when the redis store is selected without Upstash credentials.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let upstash = config
            .upstash
            .as_ref()
            .map(|c| UpstashClient::new(&c.url, &c.token));

        let store: Arc<dyn StateStore> = match (&config.store, &upstash) {
            (StoreBackend::File { path }, _) => Arc::new(JsonFileStateStore::new(path.clone())),
            (StoreBackend::Redis, Some(client)) => Arc::new(RemoteStateStore::new(
                client.clone(),
                config.state_key_prefix(),
            )),
            (StoreBackend::Redis, None) => {
                return Err(ConfigError::Missing(
                    "UPSTASH_REDIS_REST_URL/UPSTASH_REDIS_REST_TOKEN",
                ))
            }
            (StoreBackend::Memory, _) => Arc::new(InMemoryStateStore::new()),
        };

        let notifier: Arc<dyn Notifier> = Arc::new(
            WebhookNotifier::new(&config.webhook_url).with_format(config.webhook_format),
        );

        let orchestrator = Orchestrator::new(Vec::new(), notifier, store)
            .with_cooldown(config.default_cooldown)
            .with_concurrent_checks(config.concurrent_checks);

        let mut rules = RuleSource::new().with_file(config.settings_path.clone());
        if let Some(client) = upstash {
            rules = rules.with_remote(client, config.rules_key());
        }

        let prices = PriceClient::new(&config.price_api_url)
            .with_api_key(config.coingecko_api_key.clone());

        Ok(Self::new(Arc::new(orchestrator)).with_rules(rules, prices))
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Rebuild the watcher list from the rule source
    ///
    /// On failure the current watchers stay active.
    pub async fn reload_watchers(&self) -> Option<usize> {
        let source = self.rules.as_ref()?;
        match source.load().await {
            Ok(rules) => {
                let watchers: Vec<Arc<dyn Watcher>> = watchers::from_rules(rules, &self.prices);
                let count = watchers.len();
                self.orchestrator.update_watchers(watchers);
                Some(count)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload rules, keeping current watchers");
                None
            }
        }
    }

    /// Reload watchers, then run one pass to completion
    ///
    /// The pass runs on its own task so that a caller who stops waiting does
    /// not abandon state writes mid-pass.
    pub async fn run_once(&self) -> Result<PassReport, ServiceError> {
        if let Some(count) = self.reload_watchers().await {
            tracing::debug!(watchers = count, "Watchers reloaded");
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let report = tokio::spawn(async move { orchestrator.run_checks().await }).await?;
        Ok(report)
    }
}

/// Service errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Evaluation pass aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alert, CheckResult};
    use crate::test_support::{
        spawn_mock_server, RecordingNotifier, RecordingStore, StaticWatcher,
    };
    use axum::{routing::get, Json, Router};
    use std::io::Write;

    #[tokio::test]
    async fn test_run_once_with_fixed_watchers() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(RecordingStore::default());
        let watcher: Arc<dyn Watcher> = Arc::new(StaticWatcher::new(
            "w",
            CheckResult::triggered(vec![Alert::new("t", "m")]),
        ));
        let orchestrator = Orchestrator::new(vec![watcher], notifier.clone(), store.clone());
        let service = MonitorService::new(Arc::new(orchestrator));

        let report = service.run_once().await.unwrap();

        assert_eq!(report.notified, 1);
        assert_eq!(notifier.alerts().len(), 1);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_rules_are_reloaded_before_each_pass() {
        let router = Router::new().route(
            "/simple/price",
            get(|| async {
                Json(serde_json::json!({
                    "bitcoin": { "usd": 70000 },
                    "ethereum": { "usd": 1500 }
                }))
            }),
        );
        let prices = PriceClient::new(spawn_mock_server(router).await);

        let mut settings = tempfile::NamedTempFile::new().unwrap();
        write!(
            settings,
            r#"{{"rules":[{{"coinId":"bitcoin","currency":"usd","threshold":60000,"cooldownMs":0}}]}}"#
        )
        .unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(RecordingStore::default());
        let orchestrator = Orchestrator::new(Vec::new(), notifier.clone(), store.clone());
        let service = MonitorService::new(Arc::new(orchestrator))
            .with_rules(RuleSource::new().with_file(settings.path()), prices);

        let report = service.run_once().await.unwrap();
        assert_eq!(report.notified, 1);
        assert_eq!(notifier.alerts()[0].title, "Bitcoin Price Alert");

        std::fs::write(
            settings.path(),
            r#"{"rules":[{"coinId":"ethereum","currency":"usd","threshold":2000,"direction":"below"}]}"#,
        )
        .unwrap();

        let report = service.run_once().await.unwrap();
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(notifier.alerts()[1].title, "Ethereum Price Alert");
        assert!(store.state("crypto-ethereum-usd-below-2000").is_some());
    }

    #[tokio::test]
    async fn test_broken_rules_keep_previous_watchers() {
        let mut settings = tempfile::NamedTempFile::new().unwrap();
        write!(settings, "not json").unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(RecordingStore::default());
        let watcher: Arc<dyn Watcher> =
            Arc::new(StaticWatcher::new("kept", CheckResult::clear()));
        let orchestrator = Orchestrator::new(vec![watcher], notifier, store);
        let service = MonitorService::new(Arc::new(orchestrator))
            .with_rules(RuleSource::new().with_file(settings.path()), PriceClient::default());

        assert_eq!(service.reload_watchers().await, None);
        let report = service.run_once().await.unwrap();
        assert_eq!(report.evaluated, 1);
        assert_eq!(service.orchestrator().watchers()[0].id(), "kept");
    }

    #[tokio::test]
    async fn test_from_config_uses_memory_store_and_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.json");
        std::fs::write(
            &settings,
            r#"{"rules":[{"coinId":"bitcoin","currency":"usd","threshold":1}]}"#,
        )
        .unwrap();
        let settings_path = settings.to_string_lossy().to_string();

        let config = AppConfig::from_lookup(|key| match key {
            "WEBHOOK_URL" => Some("http://127.0.0.1:9/hook".to_string()),
            "STATE_STORE_TYPE" => Some("memory".to_string()),
            "SETTINGS_PATH" => Some(settings_path.clone()),
            _ => None,
        })
        .unwrap();
        let service = MonitorService::from_config(&config).unwrap();

        assert_eq!(service.reload_watchers().await, Some(1));
        assert_eq!(
            service.orchestrator().watchers()[0].id(),
            "crypto-bitcoin-usd-above-1"
        );
    }

    #[test]
    fn test_from_config_rejects_redis_without_credentials() {
        let mut config = AppConfig::from_lookup(|key| match key {
            "WEBHOOK_URL" => Some("http://127.0.0.1:9/hook".to_string()),
            _ => None,
        })
        .unwrap();
        config.store = StoreBackend::Redis;
        config.upstash = None;

        assert!(matches!(
            MonitorService::from_config(&config),
            Err(ConfigError::Missing(_))
        ));
    }
}
