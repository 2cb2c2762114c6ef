use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crate::address::{decode_addresses, AddressFramePart, DEFAULT_MAX_DIGIPEATERS};
use crate::control::{decode_control, Control, ControlMode, SupervisoryKind};
use crate::error::{Ax25Error, FormatError, Result};
use crate::pid::ProtocolId;

/// Configuration for [`decode_frame`].
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Control field width. Default: [`ControlMode::Basic`].
    pub mode: ControlMode,
    /// Maximum digipeater fields after the source. Default: 8.
    pub max_digipeaters: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            mode: ControlMode::Basic,
            max_digipeaters: DEFAULT_MAX_DIGIPEATERS,
        }
    }
}

/// Frame category with its category-specific fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Information {
        send_seq: u8,
        receive_seq: u8,
        poll_final: bool,
        protocol: ProtocolId,
        info: Bytes,
    },
    Supervisory {
        receive_seq: u8,
        poll_final: bool,
        kind: SupervisoryKind,
    },
    Unnumbered {
        poll_final: bool,
        /// Everything after the control byte, undecoded.
        payload: Bytes,
    },
}

/// A decoded AX.25 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ax25Frame {
    pub destination: AddressFramePart,
    pub source: AddressFramePart,
    pub digipeaters: Vec<AddressFramePart>,
    pub kind: FrameKind,
}

impl Ax25Frame {
    pub fn poll_final(&self) -> bool {
        match self.kind {
            FrameKind::Information { poll_final, .. }
            | FrameKind::Supervisory { poll_final, .. }
            | FrameKind::Unnumbered { poll_final, .. } => poll_final,
        }
    }

    /// "I", "S" or "U".
    pub fn category(&self) -> &'static str {
        match self.kind {
            FrameKind::Information { .. } => "I",
            FrameKind::Supervisory { .. } => "S",
            FrameKind::Unnumbered { .. } => "U",
        }
    }

    /// The information field of an I frame, or the raw trailer of a U frame.
    pub fn payload(&self) -> Option<&Bytes> {
        match &self.kind {
            FrameKind::Information { info, .. } => Some(info),
            FrameKind::Unnumbered { payload, .. } => Some(payload),
            FrameKind::Supervisory { .. } => None,
        }
    }
}

impl fmt::Display for Ax25Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.source, self.destination)?;
        for digipeater in &self.digipeaters {
            write!(f, ",{digipeater}")?;
            if digipeater.command_or_repeated() {
                f.write_str("*")?;
            }
        }
        let pf = if self.poll_final() { " P/F" } else { "" };
        match &self.kind {
            FrameKind::Information {
                send_seq,
                receive_seq,
                protocol,
                info,
                ..
            } => write!(
                f,
                ": I N(S)={send_seq} N(R)={receive_seq}{pf} pid={protocol} len={}",
                info.len()
            ),
            FrameKind::Supervisory {
                receive_seq, kind, ..
            } => write!(f, ": {} N(R)={receive_seq}{pf}", kind.mnemonic()),
            FrameKind::Unnumbered { payload, .. } => {
                write!(f, ": U{pf} len={}", payload.len())
            }
        }
    }
}

/// Decode a complete AX.25 frame (header and body, no FCS).
///
/// Either every field validates and a frame is returned, or nothing is.
pub fn decode_frame(bytes: &[u8], config: &DecodeConfig) -> Result<Ax25Frame> {
    let chain = decode_addresses(bytes, config.max_digipeaters)?;
    let body = &bytes[chain.len_bytes()..];

    let (&control_byte, rest) = body.split_first().ok_or(FormatError::TruncatedControl)?;
    if config.mode == ControlMode::Extended {
        if rest.is_empty() {
            return Err(FormatError::TruncatedControl.into());
        }
        return Err(Ax25Error::NotImplemented("extended (modulo-128) control field"));
    }

    let kind = match decode_control(control_byte)? {
        Control::Information {
            send_seq,
            receive_seq,
            poll_final,
        } => {
            let (&pid, info) = rest
                .split_first()
                .ok_or(FormatError::MissingProtocolIdentifier)?;
            FrameKind::Information {
                send_seq,
                receive_seq,
                poll_final,
                protocol: ProtocolId::from(pid),
                info: Bytes::copy_from_slice(info),
            }
        }
        Control::Supervisory {
            receive_seq,
            poll_final,
            kind,
        } => FrameKind::Supervisory {
            receive_seq,
            poll_final,
            kind,
        },
        Control::Unnumbered { poll_final } => FrameKind::Unnumbered {
            poll_final,
            payload: Bytes::copy_from_slice(rest),
        },
    };

    let frame = Ax25Frame {
        destination: chain.destination,
        source: chain.source,
        digipeaters: chain.digipeaters,
        kind,
    };
    debug!(frame = %frame, "decoded ax.25 frame");
    Ok(frame)
}
