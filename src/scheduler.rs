use crate::service::MonitorService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time;

/// Interval worker that runs an evaluation pass on every tick
pub struct PassWorker {
    service: Arc<MonitorService>,
    interval: Duration,
    running: Arc<AtomicBool>,
    shutdown: Notify,
}

impl PassWorker {
    pub fn new(service: Arc<MonitorService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Notify::new(),
        }
    }

    /// Start the background worker
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!("Pass worker started with interval {:?}", self.interval);

            let mut interval = time::interval(self.interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = self.shutdown.notified() => break,
                }
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }

                match self.service.run_once().await {
                    Ok(report) if report.failed > 0 => {
                        tracing::warn!(
                            "Scheduled pass finished with {} failed watchers",
                            report.failed
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Scheduled pass failed"),
                }
            }

            tracing::info!("Pass worker stopped");
        })
    }

    /// Stop the worker after the current pass
    ///
    /// A pass in progress runs to completion; an idle wait ends immediately.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Check if worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
