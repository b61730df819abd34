use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::{Protocol, ScanConfig};
use crate::error::DialError;
use crate::types::{ProbeOutcome, ProbeResult, WorkItem};

/// Connect capability the workers drive. Success means a connection could be opened; the
/// implementation must not exchange data and must release the connection right away.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, protocol: Protocol, host: &str, port: u16) -> Result<(), DialError>;
}

/// Plain TCP connect dialer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, protocol: Protocol, host: &str, port: u16) -> Result<(), DialError> {
        let Protocol::Tcp = protocol;

        let mut addrs = lookup_host((host, port))
            .await
            .map_err(|e| DialError::Resolve(format!("{host}: {e}")))?;
        let addr = addrs
            .next()
            .ok_or_else(|| DialError::Resolve(host.to_string()))?;

        let stream = TcpStream::connect(addr)
            .await
            .map_err(DialError::from_connect)?;
        drop(stream);
        Ok(())
    }
}

/// Run one dial against `config.target_host:port`.
///
/// - The dial is abandoned after `config.dial_timeout` and tagged [`ProbeOutcome::Timeout`].
/// - Cancelling `cancel` abandons the dial and yields [`ProbeOutcome::Cancelled`].
/// - An OS-level connect timeout is also [`ProbeOutcome::Timeout`]; refusal and routing
///   failures are negative outcomes, anything else is a transport error.
pub async fn probe<D>(
    dialer: &D,
    config: &ScanConfig,
    port: WorkItem,
    cancel: &CancellationToken,
) -> ProbeResult
where
    D: Dialer + ?Sized,
{
    let start = Instant::now();
    let dial = time::timeout(
        config.dial_timeout,
        dialer.dial(config.protocol, &config.target_host, port),
    );

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => ProbeOutcome::Cancelled,
        res = dial => classify(res),
    };

    let latency = start.elapsed();
    trace!(port, ?outcome, latency_ms = latency.as_millis() as u64, "probe finished");
    ProbeResult::new(port, outcome, latency)
}

fn classify(res: Result<Result<(), DialError>, time::error::Elapsed>) -> ProbeOutcome {
    match res {
        Ok(Ok(())) => ProbeOutcome::Reachable,
        Ok(Err(DialError::Unreachable(_))) => ProbeOutcome::Unreachable,
        Ok(Err(DialError::TimedOut(_))) => ProbeOutcome::Timeout,
        Ok(Err(e)) => ProbeOutcome::TransportError(e.to_string()),
        Err(_) => ProbeOutcome::Timeout,
    }
}
