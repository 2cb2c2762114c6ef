/// A malformed AX.25 header. The offending frame should be dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// An address field is shorter than 7 bytes.
    #[error("address field is truncated")]
    TruncatedAddress,

    /// A callsign byte carries the address extension bit.
    #[error("byte {index} of the address field has the extension bit set")]
    InteriorExtensionBit { index: usize },

    /// The callsign is empty, too long or not uppercase alphanumeric.
    #[error("invalid callsign {0:?}")]
    InvalidCallsign(String),

    /// The SSID is outside 0-15.
    #[error("invalid ssid {0} (max 15)")]
    InvalidSsid(u8),

    /// The destination field claims to be the last address.
    #[error("destination address has the extension bit set")]
    DestinationExtensionBit,

    /// The header ended before any source address was read.
    #[error("no source address field is present")]
    NoSourceAddress,

    /// The address chain exceeds the configured digipeater bound.
    #[error("address chain exceeds {max} digipeaters")]
    TooManyAddresses { max: usize },

    /// No control byte follows the address chain.
    #[error("control field is missing")]
    TruncatedControl,

    /// The control byte category bits are `10`.
    #[error("frame type could not be determined from control byte {0:#04x}")]
    UnknownFrameType(u8),

    /// An information frame has no protocol identifier byte.
    #[error("information frame is missing its protocol identifier")]
    MissingProtocolIdentifier,
}

/// Errors returned by AX.25 decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ax25Error {
    /// The frame is malformed.
    #[error("frame format error: {0}")]
    Format(#[from] FormatError),

    /// The frame uses a feature this decoder does not support.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl Ax25Error {
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented(_))
    }
}

pub type Result<T> = std::result::Result<T, Ax25Error>;
