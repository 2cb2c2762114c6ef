use std::time::SystemTime;

use bytes::Bytes;

use crate::error::{KissError, Result};

/// A decoded KISS frame.
///
/// The first unescaped byte of a frame is split into the TNC port
/// (`address`, high nibble) and the `command` (low nibble); the rest is
/// `data`. Frames are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KissFrame {
    timestamp: SystemTime,
    address: u8,
    command: u8,
    data: Bytes,
}

impl KissFrame {
    /// Create a frame for transmission, timestamped now.
    ///
    /// `address` and `command` are masked to 4 bits.
    pub fn new(address: u8, command: u8, data: impl Into<Bytes>) -> Self {
        Self::with_timestamp(SystemTime::now(), address, command, data)
    }

    /// Create a frame with an explicit timestamp.
    pub fn with_timestamp(
        timestamp: SystemTime,
        address: u8,
        command: u8,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            timestamp,
            address: address & 0x0F,
            command: command & 0x0F,
            data: data.into(),
        }
    }

    /// Build a frame from an unescaped frame body (type byte + data).
    pub fn from_raw(timestamp: SystemTime, raw: Bytes) -> Result<Self> {
        let Some(&type_byte) = raw.first() else {
            return Err(KissError::EmptyFrame);
        };

        Ok(Self {
            timestamp,
            address: type_byte >> 4,
            command: type_byte & 0x0F,
            data: raw.slice(1..),
        })
    }

    /// When the frame was completed by a decoder (or created for sending).
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// TNC port / channel id (0-15).
    pub fn address(&self) -> u8 {
        self.address
    }

    /// KISS command code (0-15).
    pub fn command(&self) -> u8 {
        self.command
    }

    /// Frame payload, unescaped.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The combined type byte as sent on the wire.
    pub fn type_byte(&self) -> u8 {
        (self.address << 4) | self.command
    }

    /// Returns true if this is a data frame (command 0).
    pub fn is_data(&self) -> bool {
        crate::command::is_data(self.command)
    }
}
