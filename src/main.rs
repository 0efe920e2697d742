//! Watchbell Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - WEBHOOK_URL or DISCORD_WEBHOOK_URL: notification endpoint (required)
//! - WEBHOOK_FORMAT: json | discord
//! - WATCHBELL_HOST / PORT: bind address (default: 0.0.0.0:8080)
//! - STATE_STORE_TYPE: file | redis | memory (default: file)
//! - STATE_FILE: file store path (default: .state.json)
//! - UPSTASH_REDIS_REST_URL / UPSTASH_REDIS_REST_TOKEN: remote state and rules
//! - SETTINGS_PATH: rule file (default: settings.json)
//! - COINGECKO_API_KEY: price API demo key
//! - CHECK_INTERVAL_SECS: run passes on a timer (default: disabled, use POST /trigger)
//! - DEFAULT_COOLDOWN_MS: default cooldown (default: 3600000)
//! - RUST_LOG: Log level (default: info)

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watchbell::api::run_server;
use watchbell::config::{AppConfig, StoreBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchbell=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    tracing::info!("Watchbell configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Webhook format: {:?}", config.webhook_format);
    match &config.store {
        StoreBackend::File { path } => tracing::info!("  State store: file ({})", path.display()),
        StoreBackend::Redis => tracing::info!("  State store: upstash redis"),
        StoreBackend::Memory => tracing::info!("  State store: memory"),
    }
    tracing::info!("  Settings: {}", config.settings_path.display());
    if config.upstash.is_some() {
        tracing::info!("  Remote rules key: {}", config.rules_key());
    }
    tracing::info!("  Default cooldown: {:?}", config.default_cooldown);
    match config.check_interval {
        Some(interval) => tracing::info!("  Check interval: {:?}", interval),
        None => tracing::info!("  Check interval: DISABLED (POST /trigger only)"),
    }

    run_server(config).await
}
