use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::ScanConfig;
use crate::coordinator::ScanProgress;
use crate::error::ScanError;
use crate::probe::{probe, Dialer};
use crate::types::{ProbeOutcome, ProbeResult, WorkItem};

/// Work channel receiver shared by every worker. Each port goes to whichever worker takes
/// the lock first; the lock is held only for the `recv`.
type SharedWork = Arc<Mutex<mpsc::Receiver<WorkItem>>>;

/// Fixed set of workers draining one work channel.
pub struct WorkerPool {
    set: JoinSet<()>,
    size: usize,
}

impl WorkerPool {
    /// Start exactly `config.worker_count` workers.
    ///
    /// Each worker holds a clone of `result_tx`; the results channel therefore closes only
    /// after the last worker has returned.
    pub fn spawn(
        config: Arc<ScanConfig>,
        dialer: Arc<dyn Dialer>,
        work_rx: mpsc::Receiver<WorkItem>,
        result_tx: mpsc::Sender<ProbeResult>,
        progress: ScanProgress,
        cancel: CancellationToken,
    ) -> Self {
        let work: SharedWork = Arc::new(Mutex::new(work_rx));
        let mut set = JoinSet::new();

        for id in 0..config.worker_count {
            let worker = Worker {
                id,
                config: config.clone(),
                dialer: dialer.clone(),
                work: work.clone(),
                results: result_tx.clone(),
                progress: progress.clone(),
                cancel: cancel.clone(),
            };
            set.spawn(worker.run());
        }
        debug!(workers = config.worker_count, "worker pool started");

        Self {
            set,
            size: config.worker_count,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for every worker to exit. A panicking worker is reported after the rest have
    /// drained, so no task outlives this call.
    pub async fn join(mut self) -> Result<(), ScanError> {
        let mut failure = None;
        while let Some(res) = self.set.join_next().await {
            if let Err(e) = res {
                failure.get_or_insert(e);
            }
        }
        match failure {
            Some(e) => Err(ScanError::Worker(e)),
            None => Ok(()),
        }
    }
}

struct Worker {
    id: usize,
    config: Arc<ScanConfig>,
    dialer: Arc<dyn Dialer>,
    work: SharedWork,
    results: mpsc::Sender<ProbeResult>,
    progress: ScanProgress,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let _alive = self.progress.worker_started();
        let mut handled = 0u64;

        loop {
            let next = { self.work.lock().await.recv().await };
            let Some(port) = next else {
                break;
            };

            // After cancellation the remaining queue is still drained so every issued port
            // gets a result, but nothing more is dialed.
            let result = if self.cancel.is_cancelled() {
                ProbeResult::new(port, ProbeOutcome::Cancelled, Duration::ZERO)
            } else {
                probe(self.dialer.as_ref(), &self.config, port, &self.cancel).await
            };

            let reachable = result.reachable();
            if self.results.send(result).await.is_err() {
                // Aggregator gone; nothing left to report to.
                break;
            }
            self.progress.mark_completed(reachable);
            handled += 1;
        }

        trace!(worker = self.id, handled, "worker exiting");
    }
}
