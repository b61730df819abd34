use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::aggregator::Tally;
use crate::error::ScanError;
use crate::pool::WorkerPool;

/// Live counters shared by the feeder, the workers and any observer of a running scan.
///
/// `completed` only moves after the matching result has been published, so
/// `wait_for(n)` returning means `n` results are already on the results channel.
#[derive(Clone, Debug, Default)]
pub struct ScanProgress {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    issued: AtomicU64,
    completed: AtomicU64,
    reachable: AtomicU64,
    active_workers: AtomicUsize,
    changed: Notify,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued(&self) -> u64 {
        self.inner.issued.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    pub fn reachable(&self) -> u64 {
        self.inner.reachable.load(Ordering::Relaxed)
    }

    /// Workers currently alive. Zero once a scan has returned.
    pub fn active_workers(&self) -> usize {
        self.inner.active_workers.load(Ordering::Acquire)
    }

    pub(crate) fn mark_issued(&self) {
        self.inner.issued.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn mark_completed(&self, reachable: bool) {
        if reachable {
            self.inner.reachable.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.completed.fetch_add(1, Ordering::AcqRel);
        self.inner.changed.notify_waiters();
    }

    pub(crate) fn worker_started(&self) -> WorkerGuard {
        self.inner.active_workers.fetch_add(1, Ordering::AcqRel);
        WorkerGuard {
            progress: self.clone(),
        }
    }

    /// Wait until at least `expected` items have completed.
    pub async fn wait_for(&self, expected: u64) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            // Register before checking so a wakeup between the load and the await is not lost.
            notified.as_mut().enable();
            if self.completed() >= expected {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the live-worker gauge when a worker exits, including by panic.
#[derive(Debug)]
pub(crate) struct WorkerGuard {
    progress: ScanProgress,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.progress
            .inner
            .active_workers
            .fetch_sub(1, Ordering::AcqRel);
        self.progress.inner.changed.notify_waiters();
    }
}

/// Owns every task of one scan and tears them down in order: feeder, then workers, and
/// only then the aggregator, whose channel closes once the last worker has dropped its
/// sender.
pub(crate) struct Coordinator {
    pub feeder: JoinHandle<u64>,
    pub pool: WorkerPool,
    pub aggregator: JoinHandle<Tally>,
    pub progress: ScanProgress,
}

/// What a finished scan accounted for.
#[derive(Debug)]
pub(crate) struct Settled {
    pub issued: u64,
    pub tally: Tally,
}

impl Coordinator {
    pub async fn finish(self) -> Result<Settled, ScanError> {
        let Coordinator {
            feeder,
            pool,
            aggregator,
            progress,
        } = self;

        let issued = feeder.await.map_err(ScanError::Worker)?;
        debug!(issued, "feeder closed the work channel");

        // Workers publish a result before asking for the next port, so once the pool has
        // drained every completion is already on the results channel.
        pool.join().await?;
        // Shared counters may span several runs, so only this run's tally is compared.
        debug!(total_completed = progress.completed(), "worker pool drained");

        let tally = aggregator.await.map_err(ScanError::Worker)?;
        if tally.observed != issued {
            warn!(issued, observed = tally.observed, "result accounting mismatch");
            return Err(ScanError::Accounting {
                issued,
                observed: tally.observed,
            });
        }
        Ok(Settled { issued, tally })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_for_releases_at_expected_count() {
        let progress = ScanProgress::new();
        let waiter = {
            let p = progress.clone();
            tokio::spawn(async move { p.wait_for(3).await })
        };

        for _ in 0..3 {
            progress.mark_issued();
        }
        progress.mark_completed(true);
        progress.mark_completed(false);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        progress.mark_completed(false);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_for should release")
            .unwrap();
        assert_eq!(progress.completed(), 3);
        assert_eq!(progress.reachable(), 1);
    }

    #[tokio::test]
    async fn wait_for_zero_returns_immediately() {
        ScanProgress::new().wait_for(0).await;
    }

    #[test]
    fn worker_guard_tracks_live_workers() {
        let progress = ScanProgress::new();
        let a = progress.worker_started();
        let b = progress.worker_started();
        assert_eq!(progress.active_workers(), 2);
        drop(a);
        assert_eq!(progress.active_workers(), 1);
        drop(b);
        assert_eq!(progress.active_workers(), 0);
    }
}
