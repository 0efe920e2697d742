//! Evaluation pass over the registered watchers

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;

use super::types::{
    Alert, CheckResult, Notifier, StateStore, StoreError, Watcher, WatcherError, WatcherState,
};

/// Cooldown applied when the first alert of an onset carries no override
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60 * 60);

pub const RECOVERY_TITLE_PREFIX: &str = "RECOVERY: ";

pub const DEFAULT_RECOVERY_MESSAGE: &str = "Value returned to normal range.";

/// Immutable snapshot of the registered watchers
pub type WatcherList = Arc<Vec<Arc<dyn Watcher>>>;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What a single check result means for a watcher, given its prior state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Fresh onset outside the cooldown window
    Notify,
    /// Triggered watcher returned to normal
    Recover,
    /// Still triggered since the last onset
    AlreadyTriggered,
    /// Fresh onset inside the cooldown window
    CoolingDown { remaining: Duration },
    /// Still normal
    Unchanged,
}

/// Apply the transition and cooldown policy
///
/// The cooldown counts from the last actual dispatch. A `last_notification`
/// later than `now` counts as zero elapsed time.
pub fn decide(
    result: &CheckResult,
    prior: &WatcherState,
    now: DateTime<Utc>,
    default_cooldown: Duration,
) -> Decision {
    if !result.is_triggered {
        return if prior.is_triggered {
            Decision::Recover
        } else {
            Decision::Unchanged
        };
    }

    if prior.is_triggered {
        return Decision::AlreadyTriggered;
    }

    let cooldown = result
        .alerts
        .first()
        .and_then(|alert| alert.cooldown)
        .unwrap_or(default_cooldown);

    if let Some(last) = prior.last_notification {
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < cooldown {
            return Decision::CoolingDown {
                remaining: cooldown - elapsed,
            };
        }
    }

    Decision::Notify
}

/// Synthesized alert sent when a triggered watcher returns to normal
pub fn recovery_alert(watcher_id: &str, message: Option<&str>, now: DateTime<Utc>) -> Alert {
    Alert::new(
        format!("{}{}", RECOVERY_TITLE_PREFIX, watcher_id),
        message.unwrap_or(DEFAULT_RECOVERY_MESSAGE),
    )
    .with_timestamp(now)
}

/// Outcome counts for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub evaluated: usize,
    pub notified: usize,
    pub recovered: usize,
    pub suppressed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl PassReport {
    fn record(&mut self, decision: Decision) {
        self.evaluated += 1;
        match decision {
            Decision::Notify => self.notified += 1,
            Decision::Recover => self.recovered += 1,
            Decision::AlreadyTriggered | Decision::CoolingDown { .. } => self.suppressed += 1,
            Decision::Unchanged => self.unchanged += 1,
        }
    }

    fn record_failure(&mut self) {
        self.evaluated += 1;
        self.failed += 1;
    }
}

/// Reasons a watcher is skipped for a pass
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("Check failed: {0}")]
    Check(#[from] WatcherError),

    #[error("Failed to read state: {0}")]
    ReadState(StoreError),

    #[error("Failed to write state: {0}")]
    WriteState(StoreError),

    #[error("Panicked: {0}")]
    Panicked(String),
}

/// Runs evaluation passes and owns the notify-once policy
pub struct Orchestrator {
    watchers: RwLock<WatcherList>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn StateStore>,
    cooldown: Duration,
    concurrent_checks: bool,
    clock: Clock,
    /// Held for the duration of a pass so overlapping triggers run one after the other
    pass_guard: Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator with the default one hour cooldown
    pub fn new(
        watchers: Vec<Arc<dyn Watcher>>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            watchers: RwLock::new(Arc::new(watchers)),
            notifier,
            store,
            cooldown: DEFAULT_COOLDOWN,
            concurrent_checks: false,
            clock: Arc::new(Utc::now),
            pass_guard: Mutex::new(()),
        }
    }

    /// Set the default cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Run every watcher's check step concurrently before deciding in list order
    pub fn with_concurrent_checks(mut self, enabled: bool) -> Self {
        self.concurrent_checks = enabled;
        self
    }

    /// Replace the time source
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Current watcher snapshot
    pub fn watchers(&self) -> WatcherList {
        self.watchers.read().clone()
    }

    /// Replace the watcher list used by the next pass
    pub fn update_watchers(&self, watchers: Vec<Arc<dyn Watcher>>) {
        let count = watchers.len();
        *self.watchers.write() = Arc::new(watchers);
        tracing::debug!(watchers = count, "Watcher list replaced");
    }

    /// Run one full evaluation pass
    ///
    /// Never fails: per-watcher errors are logged and counted in the report.
    pub async fn run_checks(&self) -> PassReport {
        let _pass = self.pass_guard.lock().await;
        let watchers = self.watchers();
        tracing::info!(watchers = watchers.len(), "Starting evaluation pass");

        let mut report = PassReport::default();

        if self.concurrent_checks {
            let checks = join_all(watchers.iter().map(|w| run_check(w.as_ref()))).await;
            for (watcher, checked) in watchers.iter().zip(checks) {
                let outcome = self.finish(watcher.as_ref(), checked).await;
                Self::record(&mut report, watcher.id(), outcome);
            }
        } else {
            for watcher in watchers.iter() {
                let checked = run_check(watcher.as_ref()).await;
                let outcome = self.finish(watcher.as_ref(), checked).await;
                Self::record(&mut report, watcher.id(), outcome);
            }
        }

        tracing::info!(
            evaluated = report.evaluated,
            notified = report.notified,
            recovered = report.recovered,
            suppressed = report.suppressed,
            failed = report.failed,
            "Evaluation pass complete"
        );
        report
    }

    fn record(report: &mut PassReport, watcher_id: &str, outcome: Result<Decision, PassError>) {
        match outcome {
            Ok(decision) => report.record(decision),
            Err(e) => {
                tracing::error!(
                    watcher_id = %watcher_id,
                    error = %e,
                    "Watcher skipped for this pass"
                );
                report.record_failure();
            }
        }
    }

    async fn finish(
        &self,
        watcher: &dyn Watcher,
        checked: Result<CheckResult, PassError>,
    ) -> Result<Decision, PassError> {
        let result = checked?;
        match AssertUnwindSafe(self.apply(watcher.id(), result))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Err(PassError::Panicked(panic_message(&*panic))),
        }
    }

    async fn apply(&self, id: &str, result: CheckResult) -> Result<Decision, PassError> {
        let prior = self
            .store
            .get_watcher_state(id)
            .await
            .map_err(PassError::ReadState)?
            .unwrap_or_default();

        let now = (self.clock)();
        let decision = decide(&result, &prior, now, self.cooldown);

        tracing::debug!(
            watcher_id = %id,
            triggered = result.is_triggered,
            previous = prior.is_triggered,
            "Check result"
        );

        match decision {
            Decision::Notify => {
                tracing::info!(
                    watcher_id = %id,
                    alerts = result.alerts.len(),
                    "Sending alerts"
                );
                for alert in &result.alerts {
                    self.notifier.notify(alert).await;
                }
                self.store
                    .set_watcher_state(id, WatcherState::triggered_at(now))
                    .await
                    .map_err(PassError::WriteState)?;
            }
            Decision::Recover => {
                tracing::info!(watcher_id = %id, "Sending recovery notification");
                let alert = recovery_alert(id, result.message.as_deref(), now);
                self.notifier.notify(&alert).await;
                self.store
                    .set_watcher_state(id, WatcherState::recovered_at(now))
                    .await
                    .map_err(PassError::WriteState)?;
            }
            Decision::AlreadyTriggered => {
                tracing::debug!(watcher_id = %id, "Skipping notification (already triggered)");
            }
            Decision::CoolingDown { remaining } => {
                tracing::info!(
                    watcher_id = %id,
                    remaining_ms = remaining.as_millis() as u64,
                    "Skipping notification due to cooldown"
                );
            }
            Decision::Unchanged => {}
        }

        Ok(decision)
    }
}

async fn run_check(watcher: &dyn Watcher) -> Result<CheckResult, PassError> {
    match AssertUnwindSafe(watcher.check()).catch_unwind().await {
        Ok(checked) => Ok(checked?),
        Err(panic) => Err(PassError::Panicked(panic_message(&*panic))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
