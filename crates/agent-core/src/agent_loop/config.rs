//! Configuration for the orchestration loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds applied to one run of the orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// Tool calls allowed before the run is failed.
    /// Default: 50
    pub max_iterations: u32,

    /// Fresh sessions opened after rate-limit rejections before giving up.
    /// Default: 5
    pub max_rate_limit_retries: u32,

    /// Added on top of the delay suggested by the rate-limit error.
    /// Default: 2000
    pub rate_limit_buffer_ms: u64,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_rate_limit_retries: 5,
            rate_limit_buffer_ms: 2_000,
        }
    }
}

impl AgentLoopConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a minimal config for testing.
    pub fn minimal() -> Self {
        Self {
            max_iterations: 10,
            max_rate_limit_retries: 1,
            rate_limit_buffer_ms: 0,
        }
    }

    /// Long-running tasks on a tight quota.
    pub fn patient() -> Self {
        Self {
            max_iterations: 150,
            max_rate_limit_retries: 10,
            rate_limit_buffer_ms: 5_000,
        }
    }

    pub fn rate_limit_buffer(&self) -> Duration {
        Duration::from_millis(self.rate_limit_buffer_ms)
    }

    /// Builder: set max iterations.
    pub fn max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Builder: set rate-limit retry bound.
    pub fn rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    /// Builder: set rate-limit buffer.
    pub fn rate_limit_buffer_ms(mut self, ms: u64) -> Self {
        self.rate_limit_buffer_ms = ms;
        self
    }
}
