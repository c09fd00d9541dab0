//! Virtual CAN bus simulation
//!
//! This crate provides in-process virtual buses for exercising the bridge
//! without SocketCAN interfaces or physical transceivers. It includes:
//!
//! - **VirtualBusNetwork**: named bus segments backed by broadcast channels
//! - **VirtualBusEndpoint** / **VirtualConnector**: endpoint implementations
//!   the relay engine can open like any other transport
//! - **BusProbe**: inject-and-observe helpers for tests
//!
//! # Example
//!
//! ```rust
//! use bridge_sim::{BusProbe, VirtualBusNetwork, VirtualConnector};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let network = VirtualBusNetwork::new();
//!     let connector = VirtualConnector::new(network.clone());
//!
//!     // A probe on the same segment sees everything sent there
//!     let mut probe = BusProbe::attach(&network, "vcan0");
//!     let frame = bridge_relay::CanFrame::new(0x123, &[1, 2, 3]).unwrap();
//!     probe.inject(&frame).await.unwrap();
//!     let _ = connector;
//! }
//! ```

pub mod endpoint;
pub mod harness;
pub mod network;

pub use endpoint::{VirtualBusEndpoint, VirtualConnector};
pub use harness::{BusProbe, PROBE_TIMEOUT};
pub use network::{VirtualBusNetwork, SEGMENT_CAPACITY};
