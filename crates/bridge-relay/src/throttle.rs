//! Inter-send pacing
//!
//! Enforces a minimum gap between consecutive sends. The clock is shared
//! across both relay directions: sends toward either endpoint compete for
//! the same pacing budget, which keeps slower backends from being saturated
//! by the combined traffic of both buses.

use std::time::Duration;

use tokio::time::Instant;

/// Enforces `tx_min_gap` between the first attempts of consecutive sends
#[derive(Debug)]
pub struct ThrottleController {
    min_gap: Duration,
    last_send: Option<Instant>,
}

impl ThrottleController {
    /// Controller with the given minimum inter-send gap (zero disables pacing)
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_send: None,
        }
    }

    /// Sleep out the remainder of the gap since the last recorded send.
    /// Applies to the first attempt of a send only; retry backoff sleeps are
    /// separate and additive.
    pub async fn pace(&mut self) {
        if self.min_gap.is_zero() {
            return;
        }
        if let Some(last) = self.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.min_gap {
                tokio::time::sleep(self.min_gap - elapsed).await;
            }
        }
    }

    /// Stamp the shared clock after a successful send
    pub fn record_send(&mut self) {
        self.last_send = Some(Instant::now());
    }
}
