//! Watcher implementations

pub mod crypto;

pub use crypto::{CryptoWatcher, PriceClient, PriceError};

use std::sync::Arc;

use crate::config::CryptoRule;
use crate::domain::Watcher;

/// Build one price watcher per rule, sharing a single price client
pub fn from_rules(rules: Vec<CryptoRule>, client: &PriceClient) -> Vec<Arc<dyn Watcher>> {
    rules
        .into_iter()
        .map(|rule| Arc::new(CryptoWatcher::new(rule, client.clone())) as Arc<dyn Watcher>)
        .collect()
}
