use thiserror::Error;

/// Rejected [`ScanConfig`](crate::config::ScanConfig). Raised before any task is spawned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be greater than zero")]
    NoWorkers,
    #[error("worker count {0} exceeds the limit of {max}", max = crate::config::MAX_WORKERS)]
    TooManyWorkers(usize),
    #[error("work queue depth {0} exceeds the limit of {max}", max = crate::config::MAX_QUEUE_DEPTH)]
    QueueTooDeep(usize),
    #[error("port range must start at 1 or above (got {0})")]
    ZeroPort(u16),
    #[error("target host is empty")]
    EmptyHost,
    #[error("dial timeout must be greater than zero")]
    ZeroTimeout,
}

/// Failure of a single dial attempt.
#[derive(Debug, Error)]
pub enum DialError {
    /// Refused, reset or no route. The common negative outcome.
    #[error("unreachable: {0}")]
    Unreachable(#[source] std::io::Error),
    /// The OS gave up on the connect before our own deadline did.
    #[error("connect timed out: {0}")]
    TimedOut(#[source] std::io::Error),
    #[error("failed to resolve `{0}`")]
    Resolve(String),
    #[error("transport failure: {0}")]
    Io(#[source] std::io::Error),
}

impl DialError {
    /// Sort an I/O error from `connect` into a negative outcome or a transport fault.
    pub fn from_connect(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            ConnectionRefused | ConnectionReset | ConnectionAborted | HostUnreachable
            | NetworkUnreachable | AddrNotAvailable => Self::Unreachable(err),
            TimedOut => Self::TimedOut(err),
            _ => Self::Io(err),
        }
    }
}

/// Scan-level failures. Per-port errors never show up here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid scan configuration: {0}")]
    Config(#[from] ConfigError),
    /// `probed` excludes the issued ports that were abandoned.
    #[error("scan cancelled after probing {probed} of {issued} issued ports")]
    Cancelled { issued: u64, probed: u64 },
    #[error("accounting mismatch: issued {issued} ports but observed {observed} results")]
    Accounting { issued: u64, observed: u64 },
    #[error("scan task failed: {0}")]
    Worker(#[source] tokio::task::JoinError),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn refused_is_unreachable() {
        let err = DialError::from_connect(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(matches!(err, DialError::Unreachable(_)));
    }

    #[test]
    fn os_connect_timeout_is_its_own_tag() {
        let err = DialError::from_connect(io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(err, DialError::TimedOut(_)));
    }

    #[test]
    fn resource_exhaustion_is_transport() {
        let err = DialError::from_connect(io::Error::from(io::ErrorKind::OutOfMemory));
        assert!(matches!(err, DialError::Io(_)));
    }
}
