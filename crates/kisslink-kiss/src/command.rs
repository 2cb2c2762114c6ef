//! KISS command codes.
//!
//! The low nibble of a frame's type byte selects the command; the high nibble
//! selects the TNC port. Only [`DATA`] frames carry over-the-air traffic.

/// Data frame to be sent on the radio.
pub const DATA: u8 = 0x0;

/// Transmitter keyup delay, in 10 ms units.
pub const TX_DELAY: u8 = 0x1;

/// Persistence parameter for p-persistent CSMA.
pub const PERSISTENCE: u8 = 0x2;

/// Slot interval, in 10 ms units.
pub const SLOT_TIME: u8 = 0x3;

/// Time to hold the transmitter after the frame, in 10 ms units.
pub const TX_TAIL: u8 = 0x4;

/// Full or half duplex selection.
pub const FULL_DUPLEX: u8 = 0x5;

/// Hardware-specific setting.
pub const SET_HARDWARE: u8 = 0x6;

/// Exit KISS mode (sent as the whole type byte `0xFF`).
pub const RETURN: u8 = 0xF;

/// Returns a human-readable name for a command code.
pub fn command_name(command: u8) -> &'static str {
    match command & 0x0F {
        DATA => "DATA",
        TX_DELAY => "TXDELAY",
        PERSISTENCE => "P",
        SLOT_TIME => "SLOTTIME",
        TX_TAIL => "TXTAIL",
        FULL_DUPLEX => "FULLDUPLEX",
        SET_HARDWARE => "SETHARDWARE",
        RETURN => "RETURN",
        _ => "UNKNOWN",
    }
}

/// Returns true if the command code carries radio traffic.
pub fn is_data(command: u8) -> bool {
    command & 0x0F == DATA
}
