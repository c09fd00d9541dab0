//! Bus channel identity and endpoint configuration
//!
//! The engine bridges exactly two channels. Every event is tagged with the
//! channel it concerns, and endpoint configuration is a tagged variant that
//! connectors interpret; the engine itself never inspects the interface kind.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one of the two bridged bus channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusChannel {
    /// First bus (channel index 0)
    Primary,
    /// Second bus (channel index 1)
    Secondary,
}

impl BusChannel {
    /// The channel on the other side of the bridge
    pub fn opposite(&self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }

    /// Numeric index (0 or 1), for display and log columns
    pub fn index(&self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }
}

impl fmt::Display for BusChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "Primary"),
            Self::Secondary => write!(f, "Secondary"),
        }
    }
}

/// Kind of underlying transport an endpoint is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// In-process virtual bus segment (testing, development)
    Virtual,
    /// Linux SocketCAN network interface
    SocketCan,
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Virtual => write!(f, "virtual"),
            Self::SocketCan => write!(f, "socketcan"),
        }
    }
}

/// Configuration for opening one bus endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Transport backend to use
    pub interface: InterfaceKind,
    /// Backend-specific channel name (e.g. "vcan0", "can0")
    pub channel: String,
    /// Bit rate in bits/s, where the backend supports setting it
    pub bitrate: Option<u32>,
    /// Whether the endpoint should see its own transmitted frames.
    /// Defaults to false to avoid echo loops between the two channels.
    #[serde(default)]
    pub receive_own_messages: bool,
}

impl EndpointConfig {
    /// Config for an in-process virtual bus segment
    pub fn virtual_bus(channel: impl Into<String>) -> Self {
        Self {
            interface: InterfaceKind::Virtual,
            channel: channel.into(),
            bitrate: None,
            receive_own_messages: false,
        }
    }

    /// Config for a SocketCAN interface
    pub fn socketcan(channel: impl Into<String>) -> Self {
        Self {
            interface: InterfaceKind::SocketCan,
            channel: channel.into(),
            bitrate: None,
            receive_own_messages: false,
        }
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.interface, self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_is_involution() {
        assert_eq!(BusChannel::Primary.opposite(), BusChannel::Secondary);
        assert_eq!(BusChannel::Secondary.opposite().opposite(), BusChannel::Secondary);
    }

    #[test]
    fn test_channel_indices() {
        assert_eq!(BusChannel::Primary.index(), 0);
        assert_eq!(BusChannel::Secondary.index(), 1);
    }

    #[test]
    fn test_config_display() {
        let config = EndpointConfig::virtual_bus("vcan0");
        assert_eq!(format!("{}", config), "virtual:vcan0");
        assert!(!config.receive_own_messages);
    }
}
