use std::time::Duration;

/// Tuning of a [`SocketWire`](super::socket_wire::SocketWire)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// Pause between two connection attempts of a client
    pub connect_retry_interval: Duration,
    /// Largest accepted frame, header included
    pub max_frame_length: usize,
    /// Sets `TCP_NODELAY` on connected streams
    pub no_delay: bool,
    /// How often blocked background threads check whether the wire was torn down
    pub poll_interval: Duration,
    /// Prefix of the background thread names
    pub thread_name: String,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            connect_retry_interval: Duration::from_millis(500),
            max_frame_length: 300_000_000,
            no_delay: true,
            poll_interval: Duration::from_millis(50),
            thread_name: "ripple-socket".to_string(),
        }
    }
}

impl SocketConfig {
    pub fn with_connect_retry_interval(mut self, interval: Duration) -> Self {
        self.connect_retry_interval = interval;
        self
    }

    pub fn with_max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = max;
        self
    }

    pub fn with_no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_thread_name(mut self, name: &str) -> Self {
        self.thread_name = name.to_string();
        self
    }
}
