//! Watchbell: notify-once threshold watcher service
//!
//! Periodically evaluates independent monitored conditions ("watchers"),
//! decides whether each condition's state change warrants a notification,
//! and dispatches it exactly once per transition.
//!
//! # Features
//!
//! - **Notify once per onset**: a continuing alarm never re-notifies
//! - **Cooldown**: a fresh onset inside the cooldown window is suppressed,
//!   counted from the last real dispatch
//! - **Recovery alerts**: every triggered-to-normal transition is signalled
//! - **Error isolation**: one failing watcher never aborts a pass
//! - **Pluggable roles**: watchers, notifiers and state stores are traits
//! - **Hot reload**: price rules are reloaded from file or Upstash before each pass
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use watchbell::config::{CryptoRule, Direction};
//! use watchbell::domain::Orchestrator;
//! use watchbell::notifiers::LogNotifier;
//! use watchbell::store::InMemoryStateStore;
//! use watchbell::watchers::{self, PriceClient};
//!
//! # async fn run() {
//! let rules = vec![CryptoRule::new("bitcoin", "usd", 100_000.0, Direction::Above)];
//! let orchestrator = Orchestrator::new(
//!     watchers::from_rules(rules, &PriceClient::default()),
//!     Arc::new(LogNotifier),
//!     Arc::new(InMemoryStateStore::new()),
//! );
//!
//! let report = orchestrator.run_checks().await;
//! println!("Pass: {:?}", report);
//! # }
//! ```

pub mod api;
pub mod config;
pub mod domain;
pub mod notifiers;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod watchers;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError};
pub use domain::{
    Alert, CheckResult, Notifier, Orchestrator, PassReport, StateStore, Watcher, WatcherState,
};
pub use service::MonitorService;
