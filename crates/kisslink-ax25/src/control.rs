use crate::error::{FormatError, Result};

/// Width of the control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// One control byte, modulo-8 sequence numbers.
    #[default]
    Basic,
    /// Two control bytes, modulo-128 sequence numbers. Not supported.
    Extended,
}

/// Supervisory frame subtype (control bits 2-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisoryKind {
    ReceiveReady = 0,
    ReceiveNotReady = 1,
    /// REJ.
    ImplicitReject = 2,
    /// SREJ.
    SelectiveReject = 3,
}

impl SupervisoryKind {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::ReceiveReady,
            1 => Self::ReceiveNotReady,
            2 => Self::ImplicitReject,
            _ => Self::SelectiveReject,
        }
    }

    /// Conventional mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::ReceiveReady => "RR",
            Self::ReceiveNotReady => "RNR",
            Self::ImplicitReject => "REJ",
            Self::SelectiveReject => "SREJ",
        }
    }
}

/// A decoded basic (modulo-8) control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Information {
        send_seq: u8,
        receive_seq: u8,
        poll_final: bool,
    },
    Supervisory {
        receive_seq: u8,
        poll_final: bool,
        kind: SupervisoryKind,
    },
    /// Modifier bits are not decoded.
    Unnumbered { poll_final: bool },
}

impl Control {
    pub fn poll_final(&self) -> bool {
        match *self {
            Self::Information { poll_final, .. }
            | Self::Supervisory { poll_final, .. }
            | Self::Unnumbered { poll_final } => poll_final,
        }
    }
}

/// Decode a basic control byte.
///
/// ```text
///   bit  7 6 5   4   3 2 1   0
///   I    N(R)   P/F  N(S)    0
///   S    N(R)   P/F  S S  0  1
///   U    M M M  P/F  M M  1  1
/// ```
pub fn decode_control(byte: u8) -> Result<Control> {
    let poll_final = byte & 0x10 != 0;
    let receive_seq = (byte >> 5) & 0x07;

    match byte & 0x03 {
        0b00 => Ok(Control::Information {
            send_seq: (byte >> 1) & 0x07,
            receive_seq,
            poll_final,
        }),
        0b01 => Ok(Control::Supervisory {
            receive_seq,
            poll_final,
            kind: SupervisoryKind::from_bits(byte >> 2),
        }),
        0b10 => Err(FormatError::UnknownFrameType(byte).into()),
        _ => Ok(Control::Unnumbered { poll_final }),
    }
}
