//! AX.25 link-layer frame decoding.
//!
//! Decodes the payload of a KISS data frame into a typed [`Ax25Frame`]:
//! - a destination and source address, then up to a configurable number of
//!   digipeaters, each a 7-byte field whose extension bit ends the chain
//! - one basic (modulo-8) control byte selecting an I, S or U frame
//! - for I frames, the protocol identifier and information field
//!
//! Malformed headers fail with [`Ax25Error::Format`]. Extended
//! (modulo-128) control fields fail with [`Ax25Error::NotImplemented`].

pub mod address;
pub mod control;
pub mod error;
pub mod frame;
pub mod pid;

pub use address::{
    decode_address_field, decode_addresses, AddressChain, AddressFramePart, ADDRESS_FIELD_LEN,
    DEFAULT_MAX_DIGIPEATERS,
};
pub use control::{decode_control, Control, ControlMode, SupervisoryKind};
pub use error::{Ax25Error, FormatError, Result};
pub use frame::{decode_frame, Ax25Frame, DecodeConfig, FrameKind};
pub use pid::ProtocolId;
