use std::fmt;

use tracing::trace;

use crate::error::{FormatError, Result};

/// Size of one on-air address field: 6 callsign bytes + 1 SSID byte.
pub const ADDRESS_FIELD_LEN: usize = 7;

/// Callsign length limit.
pub const MAX_CALLSIGN_LEN: usize = 6;

/// Digipeater bound for AX.25 v2.2.
pub const DEFAULT_MAX_DIGIPEATERS: usize = 8;

/// One decoded address subfield (destination, source or digipeater).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressFramePart {
    callsign: String,
    ssid: u8,
    command_or_repeated: bool,
    reserved5: bool,
    reserved6: bool,
}

impl AddressFramePart {
    /// Build a validated address. The callsign must be 1-6 characters of
    /// `[0-9A-Z]` and the SSID at most 15.
    pub fn new(
        callsign: impl Into<String>,
        ssid: u8,
        command_or_repeated: bool,
        reserved5: bool,
        reserved6: bool,
    ) -> std::result::Result<Self, FormatError> {
        let callsign = callsign.into();
        if !is_valid_callsign(&callsign) {
            return Err(FormatError::InvalidCallsign(callsign));
        }
        if ssid > 0x0F {
            return Err(FormatError::InvalidSsid(ssid));
        }
        Ok(Self {
            callsign,
            ssid,
            command_or_repeated,
            reserved5,
            reserved6,
        })
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    /// The C bit of a destination/source field, or the H bit of a digipeater.
    pub fn command_or_repeated(&self) -> bool {
        self.command_or_repeated
    }

    pub fn reserved5(&self) -> bool {
        self.reserved5
    }

    pub fn reserved6(&self) -> bool {
        self.reserved6
    }

    /// Encode as an on-air field; `last` sets the address extension bit.
    pub fn encode(&self, last: bool) -> [u8; ADDRESS_FIELD_LEN] {
        let mut field = [b' ' << 1; ADDRESS_FIELD_LEN];
        for (slot, byte) in field.iter_mut().zip(self.callsign.bytes()) {
            *slot = byte << 1;
        }
        field[6] = (u8::from(self.command_or_repeated) << 7)
            | (u8::from(self.reserved6) << 6)
            | (u8::from(self.reserved5) << 5)
            | (self.ssid << 1)
            | u8::from(last);
        field
    }
}

impl fmt::Display for AddressFramePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            f.write_str(&self.callsign)
        } else {
            write!(f, "{}-{}", self.callsign, self.ssid)
        }
    }
}

fn is_valid_callsign(callsign: &str) -> bool {
    !callsign.is_empty()
        && callsign.len() <= MAX_CALLSIGN_LEN
        && callsign
            .bytes()
            .all(|byte| byte.is_ascii_digit() || byte.is_ascii_uppercase())
}

/// Decode one address field from the first 7 bytes of `field`.
///
/// Returns the address and whether its extension bit marks it as the last
/// field of the chain.
pub fn decode_address_field(field: &[u8]) -> Result<(AddressFramePart, bool)> {
    let field = field
        .get(..ADDRESS_FIELD_LEN)
        .ok_or(FormatError::TruncatedAddress)?;

    let mut callsign = String::with_capacity(MAX_CALLSIGN_LEN);
    for (index, &byte) in field[..MAX_CALLSIGN_LEN].iter().enumerate() {
        if byte & 0x01 != 0 {
            return Err(FormatError::InteriorExtensionBit { index }.into());
        }
        callsign.push(char::from(byte >> 1));
    }
    let callsign = callsign.trim_end_matches(' ');

    let ssid_byte = field[6];
    let address = AddressFramePart::new(
        callsign,
        (ssid_byte >> 1) & 0x0F,
        ssid_byte & 0x80 != 0,
        ssid_byte & 0x20 != 0,
        ssid_byte & 0x40 != 0,
    )?;
    Ok((address, ssid_byte & 0x01 != 0))
}

/// The decoded destination, source and digipeater path of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressChain {
    pub destination: AddressFramePart,
    pub source: AddressFramePart,
    /// Digipeaters in transmitted order.
    pub digipeaters: Vec<AddressFramePart>,
}

impl AddressChain {
    /// Number of header bytes the chain occupies.
    pub fn len_bytes(&self) -> usize {
        (2 + self.digipeaters.len()) * ADDRESS_FIELD_LEN
    }

    /// Encode the chain, setting the extension bit on the final field.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len_bytes());
        out.extend_from_slice(&self.destination.encode(false));
        out.extend_from_slice(&self.source.encode(self.digipeaters.is_empty()));
        let count = self.digipeaters.len();
        for (i, digipeater) in self.digipeaters.iter().enumerate() {
            out.extend_from_slice(&digipeater.encode(i + 1 == count));
        }
        out
    }
}

/// Decode the address chain at the start of `bytes`.
///
/// At most `max_digipeaters` fields may follow the source.
pub fn decode_addresses(bytes: &[u8], max_digipeaters: usize) -> Result<AddressChain> {
    let (destination, last) = decode_address_field(bytes)?;
    if last {
        return Err(FormatError::DestinationExtensionBit.into());
    }

    let mut source = None;
    let mut digipeaters = Vec::new();
    let mut offset = ADDRESS_FIELD_LEN;

    loop {
        let Some(field) = bytes.get(offset..offset + ADDRESS_FIELD_LEN) else {
            return Err(match source {
                None => FormatError::NoSourceAddress,
                Some(_) => FormatError::TruncatedAddress,
            }
            .into());
        };
        let (address, last) = decode_address_field(field)?;
        offset += ADDRESS_FIELD_LEN;

        if source.is_none() {
            source = Some(address);
        } else if digipeaters.len() == max_digipeaters {
            return Err(FormatError::TooManyAddresses {
                max: max_digipeaters,
            }
            .into());
        } else {
            digipeaters.push(address);
        }

        if last {
            break;
        }
    }

    let source = source.ok_or(FormatError::NoSourceAddress)?;
    trace!(
        %destination,
        %source,
        digipeaters = digipeaters.len(),
        "decoded address chain"
    );
    Ok(AddressChain {
        destination,
        source,
        digipeaters,
    })
}
