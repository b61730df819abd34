use tokio::sync::mpsc;
use tracing::debug;

use crate::types::{ProbeOutcome, ProbeResult, WorkItem};

/// Running totals collected from the results channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub observed: u64,
    pub unreachable: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    pub cancelled: u64,
    /// Reachable ports. Arrival order until [`Tally::finish`] sorts them.
    pub open: Vec<WorkItem>,
}

impl Tally {
    pub fn record(&mut self, result: ProbeResult) {
        self.observed += 1;
        match result.outcome {
            ProbeOutcome::Reachable => self.open.push(result.port),
            ProbeOutcome::Unreachable => self.unreachable += 1,
            ProbeOutcome::Timeout => self.timeouts += 1,
            ProbeOutcome::TransportError(ref e) => {
                debug!(port = result.port, error = %e, "transport error");
                self.transport_errors += 1;
            }
            ProbeOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Workers finish in arrival order, not issue order; restore ascending port order.
    pub fn finish(mut self) -> Self {
        self.open.sort_unstable();
        self
    }
}

/// Consumes results until every sender is gone, then returns the sorted tally.
pub struct Aggregator;

impl Aggregator {
    pub async fn collect(mut results: mpsc::Receiver<ProbeResult>) -> Tally {
        let mut tally = Tally::default();
        while let Some(result) = results.recv().await {
            tally.record(result);
        }
        tally.finish()
    }

    pub fn spawn(results: mpsc::Receiver<ProbeResult>) -> tokio::task::JoinHandle<Tally> {
        tokio::spawn(Self::collect(results))
    }
}
