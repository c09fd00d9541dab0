//! In-memory representation of a classic CAN frame

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Largest identifier expressible in a standard (11-bit) frame
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// Largest identifier expressible in an extended (29-bit) frame
pub const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

/// Maximum payload length of a classic CAN frame
pub const MAX_DLC: usize = 8;

/// A single classic CAN frame as read from (or written to) a bus.
///
/// Frames are immutable value objects: relaying a frame always produces a
/// *new* frame with a freshly captured timestamp, so the timestamp reflects
/// actual retransmission time rather than the original reception time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanFrame {
    arbitration_id: u32,
    is_extended: bool,
    data: [u8; MAX_DLC],
    dlc: u8,
    /// Wall-clock seconds since the Unix epoch
    timestamp: f64,
}

impl CanFrame {
    /// Create a standard (11-bit identifier) frame
    pub fn new(arbitration_id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        Self::with_format(arbitration_id, false, payload)
    }

    /// Create an extended (29-bit identifier) frame
    pub fn new_extended(arbitration_id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        Self::with_format(arbitration_id, true, payload)
    }

    /// Create a frame with an explicit identifier format
    pub fn with_format(
        arbitration_id: u32,
        is_extended: bool,
        payload: &[u8],
    ) -> Result<Self, FrameError> {
        let max_id = if is_extended {
            EXTENDED_ID_MAX
        } else {
            STANDARD_ID_MAX
        };
        if arbitration_id > max_id {
            return Err(FrameError::IdOutOfRange {
                id: arbitration_id,
                is_extended,
            });
        }
        if payload.len() > MAX_DLC {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }

        let mut data = [0u8; MAX_DLC];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            arbitration_id,
            is_extended,
            data,
            dlc: payload.len() as u8,
            timestamp: now_secs(),
        })
    }

    /// Arbitration identifier
    pub fn arbitration_id(&self) -> u32 {
        self.arbitration_id
    }

    /// Whether this frame uses the 29-bit extended identifier format
    pub fn is_extended(&self) -> bool {
        self.is_extended
    }

    /// Valid payload bytes (`dlc` of them)
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// Data length code (0..=8)
    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    /// Wall-clock timestamp in seconds captured when the frame was created
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Copy of this frame under a new identifier with a fresh timestamp.
    ///
    /// The identifier format is inherited from the source frame, matching how
    /// rewrite rules treat the format as part of the frame, not the rule.
    pub fn rewritten(&self, new_id: u32) -> Self {
        Self {
            arbitration_id: new_id,
            is_extended: self.is_extended,
            data: self.data,
            dlc: self.dlc,
            timestamp: now_secs(),
        }
    }

    /// Identical copy with a fresh timestamp, for passthrough relay
    pub fn reborn(&self) -> Self {
        Self {
            timestamp: now_secs(),
            ..self.clone()
        }
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: Vec<String> = self.data().iter().map(|b| format!("{:02X}", b)).collect();
        write!(f, "ID=0x{:X} DATA={}", self.arbitration_id, hex.join(" "))
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_length_validated() {
        assert!(CanFrame::new(0x100, &[0u8; 8]).is_ok());
        assert!(matches!(
            CanFrame::new(0x100, &[0u8; 9]),
            Err(FrameError::PayloadTooLong(9))
        ));
    }

    #[test]
    fn test_dlc_tracks_payload() {
        let frame = CanFrame::new(0x100, &[1, 2, 3]).unwrap();
        assert_eq!(frame.dlc(), 3);
        assert_eq!(frame.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_standard_id_range() {
        assert!(CanFrame::new(STANDARD_ID_MAX, &[]).is_ok());
        assert!(CanFrame::new(STANDARD_ID_MAX + 1, &[]).is_err());
        assert!(CanFrame::new_extended(STANDARD_ID_MAX + 1, &[]).is_ok());
        assert!(CanFrame::new_extended(EXTENDED_ID_MAX + 1, &[]).is_err());
    }

    #[test]
    fn test_rewritten_keeps_payload_and_format() {
        let frame = CanFrame::new_extended(0x1234, &[9, 8, 7]).unwrap();
        let rewritten = frame.rewritten(0x4321);
        assert_eq!(rewritten.arbitration_id(), 0x4321);
        assert!(rewritten.is_extended());
        assert_eq!(rewritten.data(), frame.data());
        assert_eq!(rewritten.dlc(), frame.dlc());
        assert!(rewritten.timestamp() >= frame.timestamp());
    }

    #[test]
    fn test_display_format() {
        let frame = CanFrame::new(0x1A0, &[0xDE, 0xAD]).unwrap();
        assert_eq!(format!("{}", frame), "ID=0x1A0 DATA=DE AD");
    }
}
