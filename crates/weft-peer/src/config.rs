use std::time::Duration;

/// Tunables of the peer subsystem.
///
/// All fields have the defaults the protocol expects. Use the builder
/// pattern:
///
/// ```rust
/// use std::time::Duration;
/// use weft_peer::PeerSetConfig;
///
/// let config = PeerSetConfig::new()
///     .known_address_poll_interval(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct PeerSetConfig {
    /// Concurrent interactions admitted per queue.
    pub(crate) interaction_concurrency: usize,
    /// Minimum gap between successive queue admissions.
    pub(crate) interaction_spacing: Duration,
    /// How often a full discovery re-tries the cached operational address.
    pub(crate) known_address_poll_interval: Duration,
    /// Scan window for a retransmission-triggered rediscovery.
    pub(crate) retransmission_scan_window: Duration,
    /// Processing-time hint handed to CASE on a channel reconnect.
    pub(crate) reconnect_processing_time: Duration,
    /// Capacity of the peer-set event channel.
    pub(crate) event_capacity: usize,
}

impl PeerSetConfig {
    pub fn new() -> Self {
        Self {
            interaction_concurrency: 4,
            interaction_spacing: Duration::from_millis(100),
            known_address_poll_interval: Duration::from_secs(600),
            retransmission_scan_window: Duration::from_secs(5),
            reconnect_processing_time: Duration::from_millis(2000),
            event_capacity: 64,
        }
    }

    /// Concurrent interactions admitted per queue (default: 4).
    pub fn interaction_concurrency(mut self, count: usize) -> Self {
        self.interaction_concurrency = count;
        self
    }

    /// Minimum gap between successive queue admissions (default: 100 ms).
    pub fn interaction_spacing(mut self, spacing: Duration) -> Self {
        self.interaction_spacing = spacing;
        self
    }

    /// Cached-address poll cadence during full discovery (default: 10 min).
    pub fn known_address_poll_interval(mut self, interval: Duration) -> Self {
        self.known_address_poll_interval = interval;
        self
    }

    /// Scan window for retransmission-triggered rediscovery (default: 5 s).
    pub fn retransmission_scan_window(mut self, window: Duration) -> Self {
        self.retransmission_scan_window = window;
        self
    }

    /// CASE processing-time hint used when reconnecting (default: 2000 ms).
    pub fn reconnect_processing_time(mut self, hint: Duration) -> Self {
        self.reconnect_processing_time = hint;
        self
    }
}

impl Default for PeerSetConfig {
    fn default() -> Self {
        Self::new()
    }
}
