//! Error types for the relay engine
//!
//! `BusError` is the typed error surface of the `BusEndpoint` capability.
//! Classification of bus-off and TX-overflow conditions is deliberately
//! permissive: backends phrase these conditions differently, so in addition
//! to the dedicated variants the classifiers sniff the error text the way
//! field deployments have shown to be necessary.

use thiserror::Error;

/// Errors constructing a [`CanFrame`](crate::CanFrame)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Payload exceeds the 8-byte classic CAN limit
    #[error("payload of {0} bytes exceeds the 8 byte CAN limit")]
    PayloadTooLong(usize),

    /// Identifier does not fit the chosen format
    #[error("arbitration ID 0x{id:X} out of range (extended={is_extended})")]
    IdOutOfRange {
        /// Offending identifier
        id: u32,
        /// Format the identifier was validated against
        is_extended: bool,
    },
}

/// Errors surfaced by a bus endpoint or connector
#[derive(Debug, Error)]
pub enum BusError {
    /// The endpoint could not be opened
    #[error("failed to open bus: {0}")]
    Open(String),

    /// The controller entered the bus-off state
    #[error("bus off")]
    BusOff,

    /// The transmit queue/buffer is saturated
    #[error("TX buffer overflow: {0}")]
    TxOverflow(String),

    /// Generic transport failure from a backend without finer categories
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint configuration is not valid for this backend
    #[error("invalid bus configuration: {0}")]
    Config(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint has been shut down
    #[error("bus endpoint closed")]
    Closed,
}

impl BusError {
    /// Whether this error looks like a bus-off condition.
    ///
    /// Matches the dedicated variant, any error whose text contains
    /// "bus off" (case-insensitive), and the general transport/I-O
    /// categories, which less specific backends use for controller faults.
    pub fn is_bus_off(&self) -> bool {
        match self {
            Self::BusOff | Self::Transport(_) | Self::Io(_) => true,
            other => other.to_string().to_lowercase().contains("bus off"),
        }
    }

    /// Whether this error looks like a saturated transmit queue.
    ///
    /// Matches the dedicated variant plus the overflow phrasings seen across
    /// backends, including the bare "-13" status code some drivers report.
    pub fn is_tx_overflow(&self) -> bool {
        if matches!(self, Self::TxOverflow(_)) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        text.contains("overflow")
            || text.contains("tx buffer")
            || text.contains("transmit buffer")
            || text.contains("-13")
    }
}

/// Terminal error of a relay run
#[derive(Debug, Error)]
pub enum RelayError {
    /// One of the endpoints could not be opened at run start
    #[error("failed to open bus endpoints: {0}")]
    Open(#[source] BusError),

    /// Bus-off persisted past the recovery budget
    #[error("bus off (recovery budget exhausted)")]
    BusOff,

    /// A receive failure that is not recoverable
    #[error("receive failed on {channel} bus: {source}")]
    Receive {
        /// Channel the failure occurred on
        channel: crate::BusChannel,
        /// Underlying bus error
        #[source]
        source: BusError,
    },
}

/// Error parsing a rewrite rule table from string pairs
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid ID in row {row}: IDs must be hexadecimal values")]
pub struct RuleParseError {
    /// 1-based row number of the offending entry
    pub row: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_off_classification() {
        assert!(BusError::BusOff.is_bus_off());
        assert!(BusError::Transport("controller fault".into()).is_bus_off());
        assert!(BusError::Open("adapter reports BUS OFF".into()).is_bus_off());
        assert!(!BusError::Config("bad bitrate".into()).is_bus_off());
        assert!(!BusError::TxOverflow("queue full".into()).is_bus_off());
    }

    #[test]
    fn test_tx_overflow_classification() {
        assert!(BusError::TxOverflow("queue full".into()).is_tx_overflow());
        assert!(BusError::Transport("TX buffer full".into()).is_tx_overflow());
        assert!(BusError::Transport("transmit buffer saturated".into()).is_tx_overflow());
        assert!(BusError::Transport("driver status -13".into()).is_tx_overflow());
        assert!(!BusError::BusOff.is_tx_overflow());
    }
}
