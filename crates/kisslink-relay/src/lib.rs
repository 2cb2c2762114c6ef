//! Virtual-channel relay for KISS clients.
//!
//! Every TCP client of a [`VirtualChannel`] is wrapped in a
//! [`PeerConnection`] with its own KISS decode and encode loops. A
//! coordinator loop drains all peers, keeps only data frames, orders them by
//! receipt time and queues each one to every peer except its sender, like a
//! repeater that never echoes a station's own transmission.

pub mod broadcast;
pub mod channel;
pub mod error;
pub mod peer;
pub mod registry;

pub use broadcast::{plan_broadcast, Outbound};
pub use channel::{relay_cycle, ChannelConfig, CycleReport, VirtualChannel, DEFAULT_PORT};
pub use error::{RelayError, Result};
pub use peer::PeerConnection;
pub use registry::ConnectionRegistry;
