//! Statistics for the hub and its connections

pub mod metrics;

pub use metrics::{ConnectionStats, HubStats};
