//! # Scheduler
//!
//! Drives passes from a single task: one on startup (optional), one per poll
//! interval, and one per manual trigger. Passes never overlap. Triggers that
//! arrive while a pass is running collapse into a single follow-up pass.
//!
//! The interval is measured from the end of the previous pass, so a slow pass
//! delays the next one instead of stacking up.

use crate::controller::reconciler::Reconciler;
use crate::observability::metrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Why a pass was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// First pass after startup
    Startup,
    /// Poll interval elapsed
    Timer,
    /// `POST /trigger`
    Manual,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Startup => "startup",
            TriggerSource::Timer => "timer",
            TriggerSource::Manual => "manual",
        }
    }
}

/// Cloneable handle used to request an out-of-schedule pass
#[derive(Debug, Clone, Default)]
pub struct TriggerHandle {
    notify: Arc<Notify>,
    pending: Arc<AtomicBool>,
}

impl TriggerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a pass. Returns `false` when one is already pending.
    pub fn trigger(&self) -> bool {
        if self.pending.swap(true, Ordering::SeqCst) {
            metrics::increment_triggers_coalesced();
            debug!("Trigger coalesced into pending pass");
            return false;
        }
        self.notify.notify_one();
        true
    }

    fn clear(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }
}

pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    run_on_start: bool,
    trigger: TriggerHandle,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("run_on_start", &self.run_on_start)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration, run_on_start: bool) -> Self {
        Self {
            reconciler,
            interval,
            run_on_start,
            trigger: TriggerHandle::new(),
        }
    }

    pub fn trigger_handle(&self) -> TriggerHandle {
        self.trigger.clone()
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // first tick completes immediately
        let mut first = true;
        if !self.run_on_start {
            ticker.tick().await;
            first = false;
        }

        info!(
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        loop {
            let source = tokio::select! {
                _ = ticker.tick() => {
                    if first { TriggerSource::Startup } else { TriggerSource::Timer }
                }
                () = self.trigger.notify.notified() => TriggerSource::Manual,
                _ = shutdown.changed() => break,
            };
            first = false;

            if *shutdown.borrow() {
                break;
            }

            self.trigger.clear();
            debug!(trigger = source.as_str(), "Starting scheduled pass");
            self.reconciler.run_pass().await;
            ticker.reset();
        }

        info!("Scheduler stopped");
    }
}
