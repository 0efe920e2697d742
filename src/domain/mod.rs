//! Core decision engine
//!
//! Couples watcher check results, persisted per-watcher state and cooldown
//! timing so that each state transition produces at most one notification,
//! and every recovery is signalled.

pub mod orchestrator;
pub mod types;

pub use orchestrator::{decide, Decision, Orchestrator, PassError, PassReport, DEFAULT_COOLDOWN};
pub use types::{
    Alert, CheckResult, Notifier, StateStore, StoreError, Watcher, WatcherError, WatcherState,
};
