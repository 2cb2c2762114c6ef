//! KISS framing, AX.25 decoding and a virtual radio channel relay.
//!
//! # Crate Structure
//!
//! - [`transport`]: Duplex byte streams (TCP, Unix socket pairs)
//! - [`kiss`]: KISS framing with background decode/encode loops
//! - [`ax25`]: AX.25 address, control and protocol-id decoding
//! - [`relay`]: Virtual channel relay (behind the `relay` feature)

/// Re-export transport types.
pub mod transport {
    pub use kisslink_transport::*;
}

/// Re-export KISS codec types.
pub mod kiss {
    pub use kisslink_kiss::*;
}

/// Re-export AX.25 types.
pub mod ax25 {
    pub use kisslink_ax25::*;
}

/// Re-export relay types (requires `relay` feature).
#[cfg(feature = "relay")]
pub mod relay {
    pub use kisslink_relay::*;
}
