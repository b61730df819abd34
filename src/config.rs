use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::ports::PortRange;

/// Upper bound on concurrent workers.
pub const MAX_WORKERS: usize = 5_000;
/// Upper bound on the work channel; one slot per possible port.
pub const MAX_QUEUE_DEPTH: usize = 65_535;

/// Transport used by the dial probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
        }
    }
}

/// Parameters of one scan. Read-only once the scan starts; workers share it behind an `Arc`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub target_host: String,
    pub protocol: Protocol,
    pub port_range: PortRange,
    pub worker_count: usize,
    /// Capacity of the work channel. The feeder blocks once this many ports are queued.
    pub work_queue_depth: usize,
    pub dial_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target_host: "127.0.0.1".into(),
            protocol: Protocol::Tcp,
            port_range: PortRange::default(),
            worker_count: 100,
            work_queue_depth: 100,
            dial_timeout: Duration::from_millis(1000),
        }
    }
}

impl ScanConfig {
    pub fn new(target_host: impl Into<String>, port_range: PortRange) -> Self {
        Self {
            target_host: target_host.into(),
            port_range,
            ..Self::default()
        }
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.worker_count = n;
        self
    }

    pub fn queue_depth(mut self, n: usize) -> Self {
        self.work_queue_depth = n;
        self
    }

    pub fn timeout(mut self, t: Duration) -> Self {
        self.dial_timeout = t;
        self
    }

    /// Reject configurations that could not run. An inverted port range is accepted and
    /// simply yields no work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.worker_count > MAX_WORKERS {
            return Err(ConfigError::TooManyWorkers(self.worker_count));
        }
        if self.work_queue_depth > MAX_QUEUE_DEPTH {
            return Err(ConfigError::QueueTooDeep(self.work_queue_depth));
        }
        if self.port_range.low == 0 {
            return Err(ConfigError::ZeroPort(self.port_range.low));
        }
        if self.target_host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.dial_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// tokio channels need a non-zero capacity, so a depth of 0 becomes a single slot.
    pub(crate) fn channel_capacity(&self) -> usize {
        self.work_queue_depth.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ScanConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let cfg = ScanConfig::default().workers(0);
        assert_eq!(cfg.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn oversized_pool_and_queue_rejected() {
        let cfg = ScanConfig::default().workers(usize::MAX);
        assert_eq!(cfg.validate(), Err(ConfigError::TooManyWorkers(usize::MAX)));
        let cfg = ScanConfig::default().queue_depth(usize::MAX);
        assert_eq!(cfg.validate(), Err(ConfigError::QueueTooDeep(usize::MAX)));
        assert!(ScanConfig::default()
            .workers(MAX_WORKERS)
            .queue_depth(MAX_QUEUE_DEPTH)
            .validate()
            .is_ok());
    }

    #[test]
    fn port_zero_rejected() {
        let cfg = ScanConfig::new("localhost", PortRange::new(0, 10));
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroPort(0)));
    }

    #[test]
    fn blank_host_and_zero_timeout_rejected() {
        let cfg = ScanConfig::new("  ", PortRange::new(1, 2));
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyHost));
        let cfg = ScanConfig::default().timeout(Duration::ZERO);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn inverted_range_is_valid() {
        let cfg = ScanConfig::new("localhost", PortRange::new(5, 1));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_depth_maps_to_one_slot() {
        assert_eq!(ScanConfig::default().queue_depth(0).channel_capacity(), 1);
        assert_eq!(ScanConfig::default().queue_depth(8).channel_capacity(), 8);
    }
}
