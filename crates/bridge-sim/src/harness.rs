//! Test harness helpers
//!
//! A `BusProbe` is a plain endpoint with a friendlier API for tests and
//! demos: inject frames onto a segment and collect whatever shows up
//! there, without going through the endpoint trait.

use std::sync::Arc;
use std::time::Duration;

use bridge_relay::{BusEndpoint, BusError, CanFrame};

use crate::endpoint::VirtualBusEndpoint;
use crate::network::VirtualBusNetwork;

/// Default patience when collecting frames in tests
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(250);

/// An observer/injector attached to one segment.
///
/// Probes always see their own frames filtered out, so a probe that
/// injects and then collects only sees what *other* endpoints sent.
#[derive(Debug)]
pub struct BusProbe {
    endpoint: VirtualBusEndpoint,
}

impl BusProbe {
    /// Attach a probe to `segment` on `network`
    pub fn attach(network: &Arc<VirtualBusNetwork>, segment: &str) -> Self {
        Self {
            endpoint: network.attach(segment, false),
        }
    }

    /// Put a frame on the segment, as if an external node transmitted it
    pub async fn inject(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        self.endpoint.send(frame, PROBE_TIMEOUT).await
    }

    /// Wait up to `PROBE_TIMEOUT` for the next frame on the segment
    pub async fn collect(&mut self) -> Result<Option<CanFrame>, BusError> {
        self.endpoint.receive(PROBE_TIMEOUT).await
    }

    /// Wait up to `timeout` for the next frame on the segment
    pub async fn collect_within(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BusError> {
        self.endpoint.receive(timeout).await
    }
}

impl VirtualBusNetwork {
    /// Shorthand for [`BusProbe::attach`]
    pub fn tap(self: &Arc<Self>, segment: &str) -> BusProbe {
        BusProbe::attach(self, segment)
    }
}
