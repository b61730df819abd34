use ::time::{format_description::well_known, OffsetDateTime};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::config::ScanConfig;
use crate::coordinator::{Coordinator, ScanProgress};
use crate::error::ScanError;
use crate::feeder::spawn_feeder;
use crate::pool::WorkerPool;
use crate::probe::{Dialer, TcpDialer};
use crate::types::ScanReport;

/// Scan `config` with TCP connects, blocking the calling thread until the report is ready.
///
/// Builds its own multi-threaded runtime, so it must not be called from inside one; use
/// [`scan_async`] there.
pub fn scan(config: ScanConfig) -> Result<ScanReport, ScanError> {
    config.validate()?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ScanError::Runtime)?;
    rt.block_on(Scanner::new(config).run())
}

/// Async form of [`scan`].
pub async fn scan_async(config: ScanConfig) -> Result<ScanReport, ScanError> {
    Scanner::new(config).run().await
}

/// One configured scan: feeder, worker pool and aggregator wired through two channels.
///
/// - the feeder publishes the port range on a work channel bounded by `work_queue_depth`
/// - `worker_count` workers compete for ports, dial, and publish one result per port
/// - the aggregator keeps reachable ports and sorts them once the results channel closes
pub struct Scanner {
    config: Arc<ScanConfig>,
    dialer: Arc<dyn Dialer>,
    cancel: CancellationToken,
    progress: ScanProgress,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config: Arc::new(config),
            dialer: Arc::new(TcpDialer),
            cancel: CancellationToken::new(),
            progress: ScanProgress::new(),
        }
    }

    /// Replace the TCP dialer, e.g. with a mock in tests.
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Scan-wide cancellation. Cancelling stops the feed, abandons in-flight dials and makes
    /// [`Scanner::run`] return [`ScanError::Cancelled`] once every worker has exited.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Share live counters with an observer.
    pub fn with_progress(mut self, progress: ScanProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn progress(&self) -> &ScanProgress {
        &self.progress
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<ScanReport, ScanError> {
        // Nothing is spawned for a config that cannot run.
        self.config.validate()?;

        let started_at = now_iso_like();
        let start = Instant::now();
        let config = self.config.clone();
        info!(
            host = %config.target_host,
            range = %config.port_range,
            ports = config.port_range.len(),
            workers = config.worker_count,
            queue_depth = config.work_queue_depth,
            timeout_ms = config.dial_timeout.as_millis() as u64,
            "scan starting"
        );

        let (work_tx, work_rx) = mpsc::channel(config.channel_capacity());
        let (result_tx, result_rx) = mpsc::channel(config.worker_count);

        let aggregator = Aggregator::spawn(result_rx);
        let pool = WorkerPool::spawn(
            config.clone(),
            self.dialer.clone(),
            work_rx,
            result_tx,
            self.progress.clone(),
            self.cancel.clone(),
        );
        let feeder = spawn_feeder(
            config.port_range,
            work_tx,
            self.progress.clone(),
            self.cancel.clone(),
        );

        let settled = Coordinator {
            feeder,
            pool,
            aggregator,
            progress: self.progress.clone(),
        }
        .finish()
        .await?;

        // A cancel that lands after the last result leaves a complete report.
        if self.cancel.is_cancelled() && settled.tally.cancelled > 0 {
            let probed = settled.issued - settled.tally.cancelled;
            warn!(issued = settled.issued, probed, "scan cancelled");
            return Err(ScanError::Cancelled {
                issued: settled.issued,
                probed,
            });
        }

        let tally = settled.tally;
        let report = ScanReport {
            host: config.target_host.clone(),
            protocol: config.protocol,
            probed: tally.observed,
            unreachable: tally.unreachable,
            timeouts: tally.timeouts,
            transport_errors: tally.transport_errors,
            open_ports: tally.open,
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            probed = report.probed,
            open = report.open_ports.len(),
            timeouts = report.timeouts,
            transport_errors = report.transport_errors,
            elapsed_ms = report.elapsed_ms,
            "scan finished"
        );
        Ok(report)
    }
}

fn now_iso_like() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
