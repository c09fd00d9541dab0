//! Unified event stream for the relay engine
//!
//! Every observable occurrence (traffic, drops, recovery lifecycle, run
//! termination) is emitted as one tagged event through a single channel.
//! Consumers (a frame logger, a UI, a test recorder) subscribe to the one
//! stream instead of wiring individual callbacks.

use crate::channel::BusChannel;
use crate::frame::CanFrame;

/// Unified event enum for all relay activity
#[derive(Debug, Clone)]
pub enum RelayEvent {
    // -------------------------------------------------------------------------
    // Traffic events
    // -------------------------------------------------------------------------
    /// A frame was received from a bus
    FrameReceived {
        /// The frame as it arrived
        frame: CanFrame,
        /// Channel the frame was received on
        channel: BusChannel,
    },

    /// A frame was relayed to the opposite bus
    FrameSent {
        /// The relayed frame (rewritten or passthrough, fresh timestamp)
        frame: CanFrame,
        /// *Destination* channel the frame was sent to
        channel: BusChannel,
    },

    /// A frame was dropped after exhausting send retries
    SendDropped {
        /// Human-readable drop reason
        reason: String,
        /// Destination channel the send was aimed at
        channel: BusChannel,
    },

    // -------------------------------------------------------------------------
    // Recovery lifecycle
    // -------------------------------------------------------------------------
    /// A bus-off recovery episode has begun
    RecoveryStarted,
    /// Both endpoints were reopened successfully
    RecoverySucceeded,
    /// The recovery episode exhausted its retry budget
    RecoveryFailed,

    // -------------------------------------------------------------------------
    // Run termination
    // -------------------------------------------------------------------------
    /// The run loop has exited and both endpoints are shut down.
    /// Always emitted, on every exit path.
    RunFinished,

    /// The run terminated on a fatal error (emitted before `RunFinished`)
    RunFailed {
        /// Rendered terminal error
        error: String,
    },
}

impl RelayEvent {
    /// Check if this is a traffic event (received/sent/dropped frames)
    pub fn is_traffic(&self) -> bool {
        matches!(
            self,
            RelayEvent::FrameReceived { .. }
                | RelayEvent::FrameSent { .. }
                | RelayEvent::SendDropped { .. }
        )
    }

    /// Check if this is a recovery lifecycle event
    pub fn is_recovery(&self) -> bool {
        matches!(
            self,
            RelayEvent::RecoveryStarted
                | RelayEvent::RecoverySucceeded
                | RelayEvent::RecoveryFailed
        )
    }

    /// Get the channel if this event concerns a specific bus
    pub fn channel(&self) -> Option<BusChannel> {
        match self {
            RelayEvent::FrameReceived { channel, .. }
            | RelayEvent::FrameSent { channel, .. }
            | RelayEvent::SendDropped { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}
