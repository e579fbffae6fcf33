use pagelift_kernel::IdlePolicy;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::gate::{EvictOutcome, LifecycleGate};

/// Background task that evicts the resource once it has been idle too long.
///
/// Sleeps `poll_interval` between checks. Every check goes through
/// [`LifecycleGate::evict_if_idle`], the same lock the request path uses.
pub struct IdleReaper {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl IdleReaper {
    /// Start the reaper on the current tokio runtime.
    pub fn spawn(gate: LifecycleGate, policy: IdlePolicy) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(gate, policy, cancel.clone()));
        info!(
            poll_interval_secs = policy.poll_interval.as_secs_f64(),
            idle_threshold_secs = policy.idle_threshold.as_secs_f64(),
            "idle reaper started"
        );
        Self { cancel, task }
    }

    /// Stop the reaper and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "idle reaper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run(gate: LifecycleGate, policy: IdlePolicy, cancel: CancellationToken) {
    let mut ticker =
        tokio::time::interval_at(Instant::now() + policy.poll_interval, policy.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match gate.evict_if_idle(&policy) {
                    EvictOutcome::InUse => {
                        debug!("model idle past threshold but in use; eviction deferred")
                    }
                    EvictOutcome::Evicted { .. }
                    | EvictOutcome::Fresh { .. }
                    | EvictOutcome::NotLoaded => {}
                }
            }
        }
    }

    info!("idle reaper stopped");
}
