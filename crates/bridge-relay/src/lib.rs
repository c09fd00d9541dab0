//! CAN Bridge Relay Engine
//!
//! This crate provides the core engine for bridging two CAN bus channels:
//! frames are relayed bidirectionally, arbitration IDs are optionally
//! rewritten per user-defined rules, sends retry with bounded backoff under
//! TX-buffer backpressure, and bus-off conditions trigger a supervised
//! close-and-reopen recovery.
//!
//! # Architecture
//!
//! The engine runs as a single cooperative task that polls both endpoints
//! round-robin with short timeouts. It consumes two capability interfaces,
//! [`BusEndpoint`] for an open channel and [`BusConnector`] for opening
//! one, and produces a unified [`RelayEvent`] stream over a tokio channel,
//! keeping it decoupled from any particular transport, UI, or logger.
//!
//! # Example
//!
//! ```rust,no_run
//! use bridge_relay::{EngineConfig, EndpointConfig, RelayEngine, RewriteTable};
//! # use bridge_relay::BusConnector;
//! # async fn example(connector: Box<dyn BusConnector>) {
//! let config = EngineConfig::new(
//!     EndpointConfig::virtual_bus("vcan0"),
//!     EndpointConfig::virtual_bus("vcan1"),
//! );
//! let rewrite = RewriteTable::from_pairs([(0x100, 0x200)]);
//!
//! let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(256);
//! let engine = RelayEngine::new(config, rewrite, connector, event_tx);
//! let stop = engine.stop_handle();
//!
//! tokio::spawn(engine.run());
//! // ... consume events, call stop.stop() when done
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame;
pub mod recovery;
pub mod retry;
pub mod rewrite;
mod state;
pub mod throttle;

// Re-export the data model
pub use channel::{BusChannel, EndpointConfig, InterfaceKind};
pub use frame::{CanFrame, EXTENDED_ID_MAX, MAX_DLC, STANDARD_ID_MAX};
pub use rewrite::RewriteTable;

// Re-export the capability seams
pub use endpoint::{open_pair, BusConnector, BusEndpoint};

// Re-export engine types
pub use config::EngineConfig;
pub use engine::{RelayEngine, RECEIVE_TIMEOUT, SEND_TIMEOUT};
pub use error::{BusError, FrameError, RelayError, RuleParseError};
pub use events::RelayEvent;
pub use recovery::{RecoveryState, RecoverySupervisor};
pub use retry::{RetryPolicy, BACKOFF_CAP};
pub use state::StopHandle;
pub use throttle::ThrottleController;
