use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Protocol;

/// One unit of dispatchable work: the port to probe.
pub type WorkItem = u16;

/// How a single probe ended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
    Timeout,
    TransportError(String),
    /// Issued but abandoned because the whole scan was cancelled.
    Cancelled,
}

/// Coarse error tag carried by a non-reachable [`ProbeResult`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unreachable,
    Timeout,
    Transport,
    Cancelled,
}

/// Outcome of one [`WorkItem`], published exactly once by the worker that consumed it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub port: WorkItem,
    pub outcome: ProbeOutcome,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
}

impl ProbeResult {
    pub fn new(port: WorkItem, outcome: ProbeOutcome, latency: Duration) -> Self {
        Self {
            port,
            outcome,
            latency,
        }
    }

    pub fn reachable(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Reachable)
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self.outcome {
            ProbeOutcome::Reachable => None,
            ProbeOutcome::Unreachable => Some(ErrorKind::Unreachable),
            ProbeOutcome::Timeout => Some(ErrorKind::Timeout),
            ProbeOutcome::TransportError(_) => Some(ErrorKind::Transport),
            ProbeOutcome::Cancelled => Some(ErrorKind::Cancelled),
        }
    }
}

/// Final, ascending list of reachable ports plus per-outcome counters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub host: String,
    pub protocol: Protocol,
    pub open_ports: Vec<WorkItem>,
    pub probed: u64,
    pub unreachable: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    pub started_at: String,
    pub elapsed_ms: u64,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.open_ports.is_empty()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
