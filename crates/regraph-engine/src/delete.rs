use regraph_core::{DeletionCounts, PartitionedGraphView, StoreError};
use std::time::Duration;
use tracing::{debug, warn};

/// Suspension seam for the deletion loop's intentional delays.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// Blocks the calling thread.
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Bounded-retry policy for the batched deletion driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause after each successful, not-yet-done batch.
    pub batch_pause: Duration,
    /// Pause after a failed batch before re-issuing it.
    pub failure_backoff: Duration,
    /// Consecutive failures after which the last error propagates.
    pub max_consecutive_failures: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            batch_pause: Duration::from_millis(500),
            failure_backoff: Duration::from_secs(2),
            max_consecutive_failures: 5,
        }
    }
}

impl RetryPolicy {
    /// No delays; failure accounting unchanged. For tests.
    pub fn immediate() -> Self {
        Self {
            batch_pause: Duration::ZERO,
            failure_backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Repeatedly invokes the scoped store's bounded delete until it reports
/// `done`, accumulating each batch's delta into a running total.
///
/// A failed batch is re-issued, not skipped: deletion is idempotent at the
/// entity level, so re-running a delete against data not yet removed is
/// safe. The consecutive-failure counter resets after any successful batch;
/// once it reaches the policy's threshold the last error propagates to the
/// caller.
pub fn delete_dataset_completely(
    view: &PartitionedGraphView<'_>,
    batch_size: u32,
    batch_duration_ms: u64,
    policy: &RetryPolicy,
    pause: &dyn Pause,
) -> Result<DeletionCounts, StoreError> {
    let mut total = DeletionCounts::empty();
    let mut consecutive_failures: u32 = 0;

    loop {
        match view.delete_batch(batch_size, batch_duration_ms) {
            Ok(batch) => {
                total += batch.counts;
                if batch.done {
                    return Ok(total);
                }
                consecutive_failures = 0;
                debug!(
                    organization = %view.organization,
                    dataset = %view.dataset,
                    removed = %batch.counts,
                    cumulative = %total,
                    "delete batch complete"
                );
                pause.pause(policy.batch_pause);
            }
            Err(err) => {
                consecutive_failures += 1;
                warn!(
                    organization = %view.organization,
                    dataset = %view.dataset,
                    failures = consecutive_failures,
                    "delete batch failed: {err}"
                );
                if consecutive_failures >= policy.max_consecutive_failures {
                    return Err(err);
                }
                warn!("waiting {:?} before retrying the batch", policy.failure_backoff);
                pause.pause(policy.failure_backoff);
            }
        }
    }
}
