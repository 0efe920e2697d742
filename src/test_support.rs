//! Test doubles shared by unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use crate::domain::{
    Alert, CheckResult, Notifier, StateStore, StoreError, Watcher, WatcherError, WatcherState,
};

enum Behavior {
    Return(CheckResult),
    Fail,
    Panic,
}

/// Watcher returning a scripted result
pub struct StaticWatcher {
    id: String,
    behavior: Mutex<Behavior>,
    calls: AtomicUsize,
}

impl StaticWatcher {
    pub fn new(id: &str, result: CheckResult) -> Self {
        Self::with_behavior(id, Behavior::Return(result))
    }

    pub fn failing(id: &str) -> Self {
        Self::with_behavior(id, Behavior::Fail)
    }

    pub fn panicking(id: &str) -> Self {
        Self::with_behavior(id, Behavior::Panic)
    }

    fn with_behavior(id: &str, behavior: Behavior) -> Self {
        Self {
            id: id.to_string(),
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_result(&self, result: CheckResult) {
        *self.behavior.lock() = Behavior::Return(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Watcher for StaticWatcher {
    fn id(&self) -> &str {
        &self.id
    }

    async fn check(&self) -> Result<CheckResult, WatcherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = match &*self.behavior.lock() {
            Behavior::Return(result) => Some(Ok(result.clone())),
            Behavior::Fail => Some(Err(WatcherError::Internal("scripted failure".to_string()))),
            Behavior::Panic => None,
        };
        match outcome {
            Some(outcome) => outcome,
            None => panic!("scripted panic in {}", self.id),
        }
    }
}

/// Notifier recording every alert it receives
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &Alert) {
        self.alerts.lock().push(alert.clone());
    }
}

/// State store recording every write
#[derive(Default)]
pub struct RecordingStore {
    states: Mutex<HashMap<String, WatcherState>>,
    writes: Mutex<Vec<(String, WatcherState)>>,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
}

impl RecordingStore {
    pub fn with_state(self, id: &str, state: WatcherState) -> Self {
        self.states.lock().insert(id.to_string(), state);
        self
    }

    pub fn fail_reads_for(self, id: &str) -> Self {
        self.failing_reads.lock().insert(id.to_string());
        self
    }

    pub fn fail_writes_for(self, id: &str) -> Self {
        self.failing_writes.lock().insert(id.to_string());
        self
    }

    pub fn writes(&self) -> Vec<(String, WatcherState)> {
        self.writes.lock().clone()
    }

    pub fn state(&self, id: &str) -> Option<WatcherState> {
        self.states.lock().get(id).copied()
    }
}

#[async_trait]
impl StateStore for RecordingStore {
    async fn get_watcher_state(&self, id: &str) -> Result<Option<WatcherState>, StoreError> {
        if self.failing_reads.lock().contains(id) {
            return Err(StoreError::Remote("scripted read failure".to_string()));
        }
        Ok(self.states.lock().get(id).copied())
    }

    async fn set_watcher_state(&self, id: &str, state: WatcherState) -> Result<(), StoreError> {
        if self.failing_writes.lock().contains(id) {
            return Err(StoreError::Remote("scripted write failure".to_string()));
        }
        self.states.lock().insert(id.to_string(), state);
        self.writes.lock().push((id.to_string(), state));
        Ok(())
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_mock_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
