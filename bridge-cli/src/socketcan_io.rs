//! SocketCAN endpoints (Linux only, behind the `socketcan` feature)
//!
//! Wraps the kernel's CAN sockets behind the bridge's endpoint traits. The
//! socket calls are blocking with short timeouts, so they run inside
//! `block_in_place` to stay off the async reactor threads. Bit rates are
//! not configured here: set them on the interface beforehand, e.g.
//! `ip link set can0 type can bitrate 500000`.

use std::time::Duration;

use async_trait::async_trait;
use bridge_relay::{
    BusConnector, BusEndpoint, BusError, CanFrame, EndpointConfig, InterfaceKind,
};
use socketcan::{
    CanError, CanFrame as LinuxFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket,
    StandardId,
};

/// errno for a full SocketCAN transmit queue
const ENOBUFS: i32 = 105;

/// One open SocketCAN interface
pub struct SocketCanEndpoint {
    socket: CanSocket,
    channel: String,
    open: bool,
}

impl SocketCanEndpoint {
    fn open(config: &EndpointConfig) -> Result<Self, BusError> {
        let socket = CanSocket::open(&config.channel)
            .map_err(|e| BusError::Open(format!("cannot open {}: {}", config.channel, e)))?;
        // Error frames carry the bus-off indication
        if let Err(e) = socket.set_error_filter_accept_all() {
            tracing::warn!(channel = %config.channel, error = %e, "cannot enable error frames");
        }
        if config.bitrate.is_some() {
            tracing::warn!(
                channel = %config.channel,
                "bitrate is configured on the interface, not here; ignoring"
            );
        }
        Ok(Self {
            socket,
            channel: config.channel.clone(),
            open: true,
        })
    }

    fn convert_incoming(frame: LinuxFrame) -> Result<Option<CanFrame>, BusError> {
        match frame {
            LinuxFrame::Data(data) => {
                let (id, extended) = match data.id() {
                    Id::Standard(id) => (id.as_raw() as u32, false),
                    Id::Extended(id) => (id.as_raw(), true),
                };
                let frame = CanFrame::with_format(id, extended, data.data())
                    .map_err(|e| BusError::Transport(e.to_string()))?;
                Ok(Some(frame))
            }
            // The bridge forwards data frames only
            LinuxFrame::Remote(_) => Ok(None),
            LinuxFrame::Error(error_frame) => match error_frame.into_error() {
                CanError::BusOff => Err(BusError::BusOff),
                other => Err(BusError::Transport(other.to_string())),
            },
        }
    }

    fn convert_outgoing(frame: &CanFrame) -> Result<LinuxFrame, BusError> {
        let id = if frame.is_extended() {
            ExtendedId::new(frame.arbitration_id()).map(Id::Extended)
        } else {
            StandardId::new(frame.arbitration_id() as u16).map(Id::Standard)
        }
        .ok_or_else(|| {
            BusError::Config(format!("invalid CAN ID 0x{:X}", frame.arbitration_id()))
        })?;
        EmbeddedFrame::new(id, frame.data())
            .ok_or_else(|| BusError::Config("frame payload rejected by socket".into()))
    }
}

#[async_trait]
impl BusEndpoint for SocketCanEndpoint {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        let result = tokio::task::block_in_place(|| self.socket.read_frame_timeout(timeout));
        match result {
            Ok(frame) => Self::convert_incoming(frame),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(BusError::Io(e)),
        }
    }

    async fn send(&mut self, frame: &CanFrame, timeout: Duration) -> Result<(), BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        let outgoing = Self::convert_outgoing(frame)?;
        let result =
            tokio::task::block_in_place(|| self.socket.write_frame_timeout(&outgoing, timeout));
        match result {
            Ok(()) => Ok(()),
            Err(e)
                if e.raw_os_error() == Some(ENOBUFS)
                    || e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(BusError::TxOverflow(format!(
                    "transmit buffer full on {}",
                    self.channel
                )))
            }
            Err(e) => Err(BusError::Io(e)),
        }
    }

    async fn shutdown(&mut self) {
        // The socket closes on drop
        self.open = false;
    }

    fn is_usable(&self) -> bool {
        self.open
    }
}

/// Opens SocketCAN endpoints by interface name
#[derive(Debug, Default, Clone)]
pub struct SocketCanConnector;

#[async_trait]
impl BusConnector for SocketCanConnector {
    async fn open(&self, config: &EndpointConfig) -> Result<Box<dyn BusEndpoint>, BusError> {
        match config.interface {
            InterfaceKind::SocketCan => {
                let endpoint =
                    tokio::task::block_in_place(|| SocketCanEndpoint::open(config))?;
                Ok(Box::new(endpoint))
            }
            other => Err(BusError::Config(format!(
                "socketcan connector cannot open {} interfaces",
                other
            ))),
        }
    }
}
