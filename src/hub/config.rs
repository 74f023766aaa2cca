//! Hub configuration

/// Default per-connection outbound queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Outbound queue capacity for each connection
    ///
    /// A connection whose queue is full when a message is broadcast is
    /// evicted. A value of 0 is treated as 1 so the greeting always fits.
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl HubConfig {
    /// Set the per-connection queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.queue_capacity, 256);
    }

    #[test]
    fn test_builder_queue_capacity() {
        let config = HubConfig::default().queue_capacity(16);
        assert_eq!(config.queue_capacity, 16);
    }
}
