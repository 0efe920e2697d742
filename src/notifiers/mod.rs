//! Notification channels

pub mod log;
pub mod webhook;

pub use log::LogNotifier;
pub use webhook::{NotifierError, WebhookFormat, WebhookNotifier};

pub use crate::domain::Notifier;
