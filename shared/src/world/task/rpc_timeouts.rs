use std::time::Duration;

/// How long a synchronous call waits before complaining, and before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcTimeouts {
    pub warn_await: Duration,
    pub error_await: Duration,
}

impl RpcTimeouts {
    pub fn new(warn_await: Duration, error_await: Duration) -> Self {
        Self {
            warn_await: warn_await.min(error_await),
            error_await,
        }
    }

    /// For handlers known to take a while
    pub fn long_running() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(120))
    }
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_millis(3000))
    }
}
