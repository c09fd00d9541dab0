//! Engine configuration
//!
//! A single immutable struct resolved once before `run()`: the knobs travel
//! with the engine and are clamped at construction, so nothing can change
//! retry or pacing behavior mid-run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::EndpointConfig;

/// Configuration for one relay engine run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Endpoint opened as the primary (channel 0) bus
    pub primary: EndpointConfig,
    /// Endpoint opened as the secondary (channel 1) bus
    pub secondary: EndpointConfig,

    /// Attempt automatic recovery after a bus-off condition
    pub retry_on_bus_off: bool,
    /// Recovery attempt budget, both per episode and for consecutive episodes
    pub max_bus_off_retries: u32,
    /// Delay before each reopen attempt during recovery
    pub bus_off_retry_delay: Duration,

    /// Send attempts per frame under TX overflow (clamped to at least 1)
    pub max_send_retries: u32,
    /// First backoff delay after a TX overflow; doubles per retry, capped
    pub send_retry_initial_delay: Duration,
    /// Minimum gap enforced between sends, shared across both directions
    pub tx_min_gap: Duration,
    /// Cooldown slept after a frame is dropped on overflow
    pub tx_overflow_cooldown: Duration,
}

impl EngineConfig {
    /// Config bridging two endpoints with all other knobs at their defaults
    pub fn new(primary: EndpointConfig, secondary: EndpointConfig) -> Self {
        Self {
            primary,
            secondary,
            retry_on_bus_off: true,
            max_bus_off_retries: 3,
            bus_off_retry_delay: Duration::from_millis(500),
            max_send_retries: 10,
            send_retry_initial_delay: Duration::from_millis(10),
            tx_min_gap: Duration::ZERO,
            tx_overflow_cooldown: Duration::from_millis(50),
        }
    }

    /// Apply the construction-time clamps: `max_send_retries >= 1`.
    /// Durations and counts are unsigned types, so non-negativity holds by
    /// construction.
    pub fn normalized(mut self) -> Self {
        self.max_send_retries = self.max_send_retries.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(
            EndpointConfig::virtual_bus("vcan0"),
            EndpointConfig::virtual_bus("vcan1"),
        )
    }
}
