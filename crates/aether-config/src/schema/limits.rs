//! Admission and session lifetime limits.

use serde::{Deserialize, Serialize};

/// Sliding-window admission capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 5,
            per_hour: 50,
            per_day: 250,
        }
    }
}

/// Session lifetime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity timeout in hours (valid range: 1-720).
    pub timeout_hours: u32,
    /// How often the eviction sweep runs, in seconds (valid range: 5-3600).
    pub reap_interval_secs: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_hours: 24,
            reap_interval_secs: 60,
        }
    }
}
