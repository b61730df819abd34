//! Library crate for sweep-scan-rs: a bounded worker pool that sweeps a port range with
//! TCP connects and reports the reachable ports in ascending order.
pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod feeder;
pub mod pool;
pub mod ports;
pub mod probe;
pub mod scanner;
pub mod types;

pub use config::{Protocol, ScanConfig};
pub use coordinator::ScanProgress;
pub use error::{ConfigError, DialError, ScanError};
pub use ports::PortRange;
pub use probe::{Dialer, TcpDialer};
pub use scanner::{scan, scan_async, Scanner};
pub use types::{ErrorKind, ProbeOutcome, ProbeResult, ScanReport, WorkItem};
