//! Bus endpoint capability traits
//!
//! The engine never talks to hardware directly. It consumes two injected
//! [`BusEndpoint`] capabilities, opened through a [`BusConnector`] so that
//! recovery can close and reopen them without knowing what they are.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::channel::EndpointConfig;
use crate::error::BusError;
use crate::frame::CanFrame;

/// One open CAN bus channel: timed receive, timed send, shutdown.
#[async_trait]
pub trait BusEndpoint: Send {
    /// Wait up to `timeout` for the next frame. `Ok(None)` means the timeout
    /// elapsed without a frame, which is not an error.
    async fn receive(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BusError>;

    /// Transmit a frame, waiting up to `timeout` for TX queue space.
    async fn send(&mut self, frame: &CanFrame, timeout: Duration) -> Result<(), BusError>;

    /// Release the channel. Idempotent, must never panic.
    async fn shutdown(&mut self);

    /// Whether the endpoint is ready to carry traffic. Checked after a
    /// recovery reopen before declaring the episode successful.
    fn is_usable(&self) -> bool {
        true
    }
}

/// Factory capability that turns an [`EndpointConfig`] into an open endpoint.
#[async_trait]
pub trait BusConnector: Send + Sync {
    /// Open a single endpoint for the given configuration.
    async fn open(&self, config: &EndpointConfig) -> Result<Box<dyn BusEndpoint>, BusError>;
}

/// Open the primary and secondary endpoints as an atomic pair.
///
/// If the secondary fails to open, the already-open primary is shut down
/// before the error is surfaced, so a failed open never leaks a channel.
pub async fn open_pair(
    connector: &dyn BusConnector,
    primary: &EndpointConfig,
    secondary: &EndpointConfig,
) -> Result<(Box<dyn BusEndpoint>, Box<dyn BusEndpoint>), BusError> {
    let mut primary_bus = connector.open(primary).await?;
    match connector.open(secondary).await {
        Ok(secondary_bus) => Ok((primary_bus, secondary_bus)),
        Err(e) => {
            debug!("secondary open failed, closing primary: {}", e);
            primary_bus.shutdown().await;
            Err(e)
        }
    }
}
