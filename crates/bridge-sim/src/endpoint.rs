//! Virtual bus endpoints and the connector that opens them
//!
//! `VirtualBusEndpoint` implements the bridge's endpoint trait on top of a
//! broadcast segment, so a relay engine can run against in-process buses
//! exactly as it would against real hardware.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_relay::{
    BusConnector, BusEndpoint, BusError, CanFrame, EndpointConfig, InterfaceKind,
};
use tokio::sync::broadcast;

use crate::network::{BusMessage, VirtualBusNetwork};

/// One endpoint attached to a virtual bus segment
#[derive(Debug)]
pub struct VirtualBusEndpoint {
    id: u64,
    segment: String,
    tx: broadcast::Sender<BusMessage>,
    rx: broadcast::Receiver<BusMessage>,
    receive_own_messages: bool,
    open: bool,
}

impl VirtualBusEndpoint {
    pub(crate) fn new(
        id: u64,
        segment: String,
        tx: broadcast::Sender<BusMessage>,
        receive_own_messages: bool,
    ) -> Self {
        let rx = tx.subscribe();
        Self {
            id,
            segment,
            tx,
            rx,
            receive_own_messages,
            open: true,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }
}

#[async_trait]
impl BusEndpoint for VirtualBusEndpoint {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.rx.recv()).await {
                Ok(Ok(message)) => {
                    if message.origin == self.id && !self.receive_own_messages {
                        continue;
                    }
                    return Ok(Some(message.frame));
                }
                Ok(Err(broadcast::error::RecvError::Lagged(missed))) => {
                    tracing::warn!(
                        segment = %self.segment,
                        endpoint = self.id,
                        missed,
                        "virtual endpoint fell behind, frames lost"
                    );
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return Ok(None),
                Err(_) => return Ok(None),
            }
        }
    }

    async fn send(&mut self, frame: &CanFrame, _timeout: Duration) -> Result<(), BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        // Our own subscription keeps the channel alive, so this cannot fail
        self.tx
            .send(BusMessage {
                origin: self.id,
                frame: frame.clone(),
            })
            .map_err(|e| BusError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.open = false;
    }

    fn is_usable(&self) -> bool {
        self.open
    }
}

/// Opens virtual endpoints on a shared network
#[derive(Debug, Clone)]
pub struct VirtualConnector {
    network: Arc<VirtualBusNetwork>,
}

impl VirtualConnector {
    pub fn new(network: Arc<VirtualBusNetwork>) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &Arc<VirtualBusNetwork> {
        &self.network
    }
}

#[async_trait]
impl BusConnector for VirtualConnector {
    async fn open(&self, config: &EndpointConfig) -> Result<Box<dyn BusEndpoint>, BusError> {
        match config.interface {
            InterfaceKind::Virtual => Ok(Box::new(
                self.network
                    .attach(&config.channel, config.receive_own_messages),
            )),
            other => Err(BusError::Config(format!(
                "virtual connector cannot open {} interfaces",
                other
            ))),
        }
    }
}
