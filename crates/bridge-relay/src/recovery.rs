//! Bus-off recovery
//!
//! After a bus-off classified receive failure the engine hands control here:
//! both endpoints are closed and reopened as an atomic pair, bounded by a
//! retry budget. This inner budget limits attempts *within one* recovery
//! episode; the engine's `bus_off_streak` separately bounds consecutive
//! episodes across loop iterations.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channel::EndpointConfig;
use crate::config::EngineConfig;
use crate::endpoint::{open_pair, BusConnector, BusEndpoint};
use crate::state::StopHandle;

/// Phase of a recovery episode, tracked for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// No episode in progress
    Idle,
    /// Shutting down the failed endpoints
    Closing,
    /// Sleeping out the retry delay
    Waiting,
    /// Attempting to reopen the endpoint pair
    Reopening,
    /// Episode finished with reopened endpoints
    Succeeded,
    /// Episode exhausted its budget or was cancelled
    Failed,
}

/// Closes and reopens the endpoint pair after a bus-off event
pub struct RecoverySupervisor<'a> {
    connector: &'a dyn BusConnector,
    primary_config: &'a EndpointConfig,
    secondary_config: &'a EndpointConfig,
    max_retries: u32,
    retry_delay: Duration,
    stop: &'a StopHandle,
    state: RecoveryState,
}

impl<'a> RecoverySupervisor<'a> {
    /// Supervisor borrowing the engine's connector, configs and stop handle
    pub fn new(connector: &'a dyn BusConnector, config: &'a EngineConfig, stop: &'a StopHandle) -> Self {
        Self {
            connector,
            primary_config: &config.primary,
            secondary_config: &config.secondary,
            max_retries: config.max_bus_off_retries,
            retry_delay: config.bus_off_retry_delay,
            stop,
            state: RecoveryState::Idle,
        }
    }

    /// Current phase of the episode
    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Run one recovery episode.
    ///
    /// Shuts down both endpoints (best-effort, shutdown never fails), then
    /// up to `max_bus_off_retries` times sleeps the retry delay and reopens
    /// the pair. On success the reopened endpoints replace `primary` and
    /// `secondary` in place and `true` is returned. An external stop aborts
    /// the episode immediately.
    pub async fn attempt_recovery(
        &mut self,
        primary: &mut Box<dyn BusEndpoint>,
        secondary: &mut Box<dyn BusEndpoint>,
    ) -> bool {
        self.state = RecoveryState::Closing;
        primary.shutdown().await;
        secondary.shutdown().await;

        for attempt in 1..=self.max_retries {
            if !self.stop.is_running() {
                debug!("recovery cancelled by stop request");
                self.state = RecoveryState::Failed;
                return false;
            }

            self.state = RecoveryState::Waiting;
            tokio::time::sleep(self.retry_delay).await;

            self.state = RecoveryState::Reopening;
            match open_pair(self.connector, self.primary_config, self.secondary_config).await {
                Ok((new_primary, new_secondary))
                    if new_primary.is_usable() && new_secondary.is_usable() =>
                {
                    info!("bus recovery succeeded on attempt {}", attempt);
                    *primary = new_primary;
                    *secondary = new_secondary;
                    self.state = RecoveryState::Succeeded;
                    return true;
                }
                Ok((mut new_primary, mut new_secondary)) => {
                    debug!("reopened endpoints not usable, retrying");
                    new_primary.shutdown().await;
                    new_secondary.shutdown().await;
                }
                Err(e) => {
                    debug!("reopen attempt {} failed: {}", attempt, e);
                }
            }
        }

        warn!("bus recovery failed after {} attempts", self.max_retries);
        self.state = RecoveryState::Failed;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BusError;
    use async_trait::async_trait;

    struct RefusingConnector;

    #[async_trait]
    impl BusConnector for RefusingConnector {
        async fn open(
            &self,
            config: &EndpointConfig,
        ) -> Result<Box<dyn BusEndpoint>, BusError> {
            Err(BusError::Open(format!("{} unavailable", config.channel)))
        }
    }

    struct DeadEndpoint;

    #[async_trait]
    impl BusEndpoint for DeadEndpoint {
        async fn receive(
            &mut self,
            _timeout: std::time::Duration,
        ) -> Result<Option<crate::CanFrame>, BusError> {
            Err(BusError::BusOff)
        }

        async fn send(
            &mut self,
            _frame: &crate::CanFrame,
            _timeout: std::time::Duration,
        ) -> Result<(), BusError> {
            Err(BusError::BusOff)
        }

        async fn shutdown(&mut self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_aborts_episode_before_any_reopen() {
        let config = EngineConfig::default();
        let stop = StopHandle::new();
        stop.stop();

        let connector = RefusingConnector;
        let mut supervisor = RecoverySupervisor::new(&connector, &config, &stop);
        let mut primary: Box<dyn BusEndpoint> = Box::new(DeadEndpoint);
        let mut secondary: Box<dyn BusEndpoint> = Box::new(DeadEndpoint);

        assert!(!supervisor.attempt_recovery(&mut primary, &mut secondary).await);
        assert_eq!(supervisor.state(), RecoveryState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_budget_when_reopen_keeps_failing() {
        let config = EngineConfig::default();
        let stop = StopHandle::new();

        let connector = RefusingConnector;
        let mut supervisor = RecoverySupervisor::new(&connector, &config, &stop);
        assert_eq!(supervisor.state(), RecoveryState::Idle);

        let mut primary: Box<dyn BusEndpoint> = Box::new(DeadEndpoint);
        let mut secondary: Box<dyn BusEndpoint> = Box::new(DeadEndpoint);
        assert!(!supervisor.attempt_recovery(&mut primary, &mut secondary).await);
        assert_eq!(supervisor.state(), RecoveryState::Failed);
    }
}
