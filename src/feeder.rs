use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::coordinator::ScanProgress;
use crate::ports::PortRange;
use crate::types::WorkItem;

/// Publish `range` in ascending order on its own task and return the number of ports
/// issued. The work channel closes when the task drops `work_tx`.
///
/// Sending waits while the channel is full, so the feeder never runs more than the
/// channel capacity ahead of the workers. Cancellation stops issuing immediately; a
/// closed channel (every worker gone) ends the feed as well.
pub fn spawn_feeder(
    range: PortRange,
    work_tx: mpsc::Sender<WorkItem>,
    progress: ScanProgress,
    cancel: CancellationToken,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut issued = 0u64;
        for port in range.iter() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = work_tx.reserve() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };
            // Count before handing over so `issued` never trails `completed`.
            progress.mark_issued();
            permit.send(port);
            issued += 1;
        }
        debug!(issued, range = %range, "work feed finished");
        issued
    })
}
