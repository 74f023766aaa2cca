//! Statistics and metrics for the relay

use std::time::{Duration, Instant};

/// Per-connection delivery statistics
///
/// Filled in by the delivery loop as payloads reach the transport.
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// Payloads written to the transport
    pub messages_sent: u64,
    /// Payload bytes written to the transport
    pub bytes_sent: u64,
    /// When the delivery loop started
    pub started_at: Instant,
}

impl ConnectionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            messages_sent: 0,
            bytes_sent: 0,
            started_at: Instant::now(),
        }
    }

    /// Record one delivered payload
    pub fn record(&mut self, len: usize) {
        self.messages_sent += 1;
        self.bytes_sent += len as u64;
    }

    /// Time since the delivery loop started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average throughput in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of hub state, taken inside the control loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Currently registered connections
    pub connections: usize,
    /// Size of the cached greeting in bytes (0 before the first broadcast)
    pub greeting_len: usize,
    /// Broadcast requests processed
    pub broadcasts: u64,
    /// Register requests processed
    pub registrations: u64,
    /// Connections evicted because their queue was full
    pub evictions: u64,
}

impl HubStats {
    /// Whether a greeting has been cached yet
    pub fn has_greeting(&self) -> bool {
        self.greeting_len > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_stats_new() {
        let stats = ConnectionStats::new();
        assert_eq!(stats.messages_sent, 0);
        assert_eq!(stats.bytes_sent, 0);
    }

    #[test]
    fn test_connection_stats_record() {
        let mut stats = ConnectionStats::new();
        stats.record(10);
        stats.record(32);

        assert_eq!(stats.messages_sent, 2);
        assert_eq!(stats.bytes_sent, 42);
    }

    #[test]
    fn test_connection_stats_bitrate_zero_duration() {
        let mut stats = ConnectionStats::new();
        stats.record(1_000_000);

        // Less than a second has passed
        assert_eq!(stats.bitrate(), 0);
    }

    #[test]
    fn test_hub_stats_greeting() {
        let mut stats = HubStats::default();
        assert!(!stats.has_greeting());

        stats.greeting_len = 12;
        assert!(stats.has_greeting());
    }
}
