//! Relay engine
//!
//! The core relay loop: polls both endpoints round-robin with short
//! timeouts, applies the rewrite table, sends with bounded retry and pacing,
//! and hands bus-off failures to the recovery supervisor. Everything runs on
//! one cooperative task, so there is exactly one mutator of the run state
//! and the endpoint handles, and `stop()` latency stays bounded by the poll
//! timeout rather than by bus traffic.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channel::BusChannel;
use crate::config::EngineConfig;
use crate::endpoint::{open_pair, BusConnector, BusEndpoint};
use crate::error::{BusError, RelayError};
use crate::events::RelayEvent;
use crate::frame::CanFrame;
use crate::recovery::RecoverySupervisor;
use crate::retry::RetryPolicy;
use crate::rewrite::RewriteTable;
use crate::state::{RunState, StopHandle};
use crate::throttle::ThrottleController;

/// Per-call receive timeout; also the bound on loop iteration latency
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(10);

/// Per-attempt send timeout, long enough for a backend to drain TX space
pub const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Bidirectional frame relay between two bus endpoints
pub struct RelayEngine {
    config: EngineConfig,
    rewrite: RewriteTable,
    connector: Box<dyn BusConnector>,
    events: mpsc::Sender<RelayEvent>,
    stop: StopHandle,
    throttle: ThrottleController,
    retry: RetryPolicy,
    state: RunState,
}

impl RelayEngine {
    /// Create an engine. The configuration is normalized (clamped) here and
    /// immutable for the rest of the run; the rewrite table applies to both
    /// relay directions alike.
    pub fn new(
        config: EngineConfig,
        rewrite: RewriteTable,
        connector: Box<dyn BusConnector>,
        events: mpsc::Sender<RelayEvent>,
    ) -> Self {
        let config = config.normalized();
        let throttle = ThrottleController::new(config.tx_min_gap);
        let retry = RetryPolicy::from_config(&config);

        Self {
            config,
            rewrite,
            connector,
            events,
            stop: StopHandle::new(),
            throttle,
            retry,
            state: RunState::default(),
        }
    }

    /// Cloneable handle for requesting the run to stop from elsewhere
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run the relay until stopped or a fatal error occurs.
    ///
    /// Blocks the calling task. Transient conditions (a dropped frame, a
    /// recovery episode within budget) never end the run; open failures,
    /// non-bus-off receive errors, and an exhausted recovery budget do.
    /// Both endpoints are shut down on every exit path and `RunFinished` is
    /// always the last event emitted.
    pub async fn run(mut self) -> Result<(), RelayError> {
        info!(
            "starting relay: {} <-> {} ({} rewrite rules)",
            self.config.primary,
            self.config.secondary,
            self.rewrite.len()
        );

        let result = match open_pair(
            self.connector.as_ref(),
            &self.config.primary,
            &self.config.secondary,
        )
        .await
        {
            Ok((mut primary, mut secondary)) => {
                let result = self.poll_loop(&mut primary, &mut secondary).await;
                primary.shutdown().await;
                secondary.shutdown().await;
                result
            }
            Err(e) => Err(RelayError::Open(e)),
        };

        if let Err(e) = &result {
            warn!("relay run failed: {}", e);
            self.emit(RelayEvent::RunFailed {
                error: e.to_string(),
            });
        } else {
            info!("relay run finished");
        }
        self.emit(RelayEvent::RunFinished);
        result
    }

    /// One iteration checks each direction once, so neither bus can starve
    /// the other.
    async fn poll_loop(
        &mut self,
        primary: &mut Box<dyn BusEndpoint>,
        secondary: &mut Box<dyn BusEndpoint>,
    ) -> Result<(), RelayError> {
        while self.stop.is_running() {
            self.relay_one(primary, secondary, BusChannel::Primary).await?;
            self.relay_one(primary, secondary, BusChannel::Secondary).await?;
        }
        Ok(())
    }

    /// Poll `origin` once and relay any frame to the opposite endpoint
    async fn relay_one(
        &mut self,
        primary: &mut Box<dyn BusEndpoint>,
        secondary: &mut Box<dyn BusEndpoint>,
        origin: BusChannel,
    ) -> Result<(), RelayError> {
        let received = match origin {
            BusChannel::Primary => primary.receive(RECEIVE_TIMEOUT).await,
            BusChannel::Secondary => secondary.receive(RECEIVE_TIMEOUT).await,
        };

        match received {
            Ok(Some(frame)) => {
                self.state.bus_off_streak = 0;
                self.emit(RelayEvent::FrameReceived {
                    frame: frame.clone(),
                    channel: origin,
                });

                let was_rewritten = self.rewrite.lookup(frame.arbitration_id()).is_some();
                let relayed = self.rewrite.apply(&frame);
                let destination = origin.opposite();
                let dest_bus = match origin {
                    BusChannel::Primary => secondary.as_mut(),
                    BusChannel::Secondary => primary.as_mut(),
                };

                if self.send_with_retry(dest_bus, &relayed).await {
                    debug!("relayed {} to {}", relayed, destination);
                    self.emit(RelayEvent::FrameSent {
                        frame: relayed,
                        channel: destination,
                    });
                } else {
                    let reason = if was_rewritten {
                        "TX buffer overflow: dropped a rewritten frame after retries"
                    } else {
                        "TX buffer overflow: dropped a frame after retries"
                    };
                    warn!("{} (destination {})", reason, destination);
                    self.emit(RelayEvent::SendDropped {
                        reason: reason.to_string(),
                        channel: destination,
                    });
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => self.handle_receive_error(primary, secondary, origin, e).await,
        }
    }

    /// Send with pacing, bounded overflow retry, and post-drop cooldown.
    /// Returns true when the frame was sent, false when it was dropped.
    async fn send_with_retry(&mut self, bus: &mut dyn BusEndpoint, frame: &CanFrame) -> bool {
        self.throttle.pace().await;

        let attempts = self.retry.max_attempts();
        let mut delays = self.retry.backoff_delays();
        for attempt in 1..=attempts {
            match bus.send(frame, SEND_TIMEOUT).await {
                Ok(()) => {
                    self.throttle.record_send();
                    return true;
                }
                Err(e) if e.is_tx_overflow() => {
                    if attempt < attempts && self.stop.is_running() {
                        if let Some(delay) = delays.next() {
                            debug!("TX overflow on attempt {}, backing off {:?}", attempt, delay);
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }
                    if let Some(cooldown) = self.retry.cooldown() {
                        tokio::time::sleep(cooldown).await;
                    }
                    return false;
                }
                Err(e) => {
                    // Not cleanly classifiable as overflow: drop the frame
                    // without consuming further retries, keep the run alive.
                    warn!("send failed: {}", e);
                    return false;
                }
            }
        }
        false
    }

    /// Classify a receive failure and either recover or terminate
    async fn handle_receive_error(
        &mut self,
        primary: &mut Box<dyn BusEndpoint>,
        secondary: &mut Box<dyn BusEndpoint>,
        origin: BusChannel,
        error: BusError,
    ) -> Result<(), RelayError> {
        if !(self.config.retry_on_bus_off && error.is_bus_off()) {
            return Err(RelayError::Receive {
                channel: origin,
                source: error,
            });
        }

        if self.state.bus_off_streak >= self.config.max_bus_off_retries {
            warn!(
                "bus off on {} with recovery budget exhausted ({} consecutive episodes)",
                origin, self.state.bus_off_streak
            );
            self.emit(RelayEvent::RecoveryFailed);
            return Err(RelayError::BusOff);
        }

        self.state.bus_off_streak += 1;
        info!(
            "bus off on {} ({}): starting recovery episode {}",
            origin, error, self.state.bus_off_streak
        );
        self.emit(RelayEvent::RecoveryStarted);

        let mut supervisor =
            RecoverySupervisor::new(self.connector.as_ref(), &self.config, &self.stop);
        if supervisor.attempt_recovery(primary, secondary).await {
            self.emit(RelayEvent::RecoverySucceeded);
            Ok(())
        } else {
            self.emit(RelayEvent::RecoveryFailed);
            Err(RelayError::BusOff)
        }
    }

    /// Fire-and-forget event emission: a slow or closed sink never blocks
    /// the relay loop.
    fn emit(&self, event: RelayEvent) {
        if self.events.try_send(event).is_err() {
            debug!("event sink full or closed, event dropped");
        }
    }
}
