//! State store backends
//!
//! Every backend keeps one JSON record per watcher id:
//! `{"isTriggered": bool, "lastNotification": "<RFC 3339>"}`.

pub mod file;
pub mod memory;
pub mod upstash;

pub use file::JsonFileStateStore;
pub use memory::InMemoryStateStore;
pub use upstash::{RemoteStateStore, UpstashClient};

pub use crate::domain::{StateStore, StoreError};
