//! Virtual bus network
//!
//! A network owns a set of named bus segments. Every endpoint attached to
//! the same segment name sees every frame sent on it, like independent
//! processes sharing one `vcan` interface. Segments are created lazily on
//! first attach and live as long as the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bridge_relay::CanFrame;
use tokio::sync::broadcast;

use crate::endpoint::VirtualBusEndpoint;

/// Frames a segment can buffer per subscriber before it starts lagging
pub const SEGMENT_CAPACITY: usize = 1024;

/// A frame in flight on a segment, tagged with the sender so endpoints
/// can filter their own traffic
#[derive(Debug, Clone)]
pub(crate) struct BusMessage {
    pub origin: u64,
    pub frame: CanFrame,
}

/// A collection of named in-process bus segments
#[derive(Debug, Default)]
pub struct VirtualBusNetwork {
    segments: Mutex<HashMap<String, broadcast::Sender<BusMessage>>>,
    next_endpoint_id: AtomicU64,
}

impl VirtualBusNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a new endpoint to the named segment, creating the segment
    /// if this is the first attach
    pub fn attach(&self, segment: &str, receive_own_messages: bool) -> VirtualBusEndpoint {
        let mut segments = self.segments.lock().unwrap();
        let sender = segments
            .entry(segment.to_string())
            .or_insert_with(|| broadcast::channel(SEGMENT_CAPACITY).0)
            .clone();
        let id = self.next_endpoint_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(segment, endpoint = id, "attached virtual endpoint");
        VirtualBusEndpoint::new(id, segment.to_string(), sender, receive_own_messages)
    }

    /// Number of segments created so far
    pub fn segment_count(&self) -> usize {
        self.segments.lock().unwrap().len()
    }
}
