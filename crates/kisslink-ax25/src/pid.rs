use std::fmt;

/// Layer-3 protocol identifier (PID) carried by information frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolId {
    /// ISO 8208 / CCITT X.25 PLP.
    X25Plp,
    /// Compressed TCP/IP (Van Jacobson, RFC 1144).
    CompressedTcpIp,
    /// Uncompressed TCP/IP (Van Jacobson, RFC 1144).
    UncompressedTcpIp,
    SegmentationFragment,
    Texnet,
    LinkQuality,
    Appletalk,
    AppletalkArp,
    Ip,
    Arp,
    FlexNet,
    NetRom,
    /// No layer 3 (APRS and plain text).
    NoLayer3,
    /// Escape: the next byte continues the PID.
    Escape,
    Other(u8),
}

impl ProtocolId {
    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::X25Plp => "x.25",
            Self::CompressedTcpIp => "vj-compressed",
            Self::UncompressedTcpIp => "vj-uncompressed",
            Self::SegmentationFragment => "segment",
            Self::Texnet => "texnet",
            Self::LinkQuality => "lqp",
            Self::Appletalk => "appletalk",
            Self::AppletalkArp => "appletalk-arp",
            Self::Ip => "ip",
            Self::Arp => "arp",
            Self::FlexNet => "flexnet",
            Self::NetRom => "netrom",
            Self::NoLayer3 => "none",
            Self::Escape => "escape",
            Self::Other(_) => "other",
        }
    }
}

impl From<u8> for ProtocolId {
    fn from(byte: u8) -> Self {
        match byte {
            0x01 => Self::X25Plp,
            0x06 => Self::CompressedTcpIp,
            0x07 => Self::UncompressedTcpIp,
            0x08 => Self::SegmentationFragment,
            0xC3 => Self::Texnet,
            0xC4 => Self::LinkQuality,
            0xCA => Self::Appletalk,
            0xCB => Self::AppletalkArp,
            0xCC => Self::Ip,
            0xCD => Self::Arp,
            0xCE => Self::FlexNet,
            0xCF => Self::NetRom,
            0xF0 => Self::NoLayer3,
            0xFF => Self::Escape,
            other => Self::Other(other),
        }
    }
}

impl From<ProtocolId> for u8 {
    fn from(pid: ProtocolId) -> Self {
        match pid {
            ProtocolId::X25Plp => 0x01,
            ProtocolId::CompressedTcpIp => 0x06,
            ProtocolId::UncompressedTcpIp => 0x07,
            ProtocolId::SegmentationFragment => 0x08,
            ProtocolId::Texnet => 0xC3,
            ProtocolId::LinkQuality => 0xC4,
            ProtocolId::Appletalk => 0xCA,
            ProtocolId::AppletalkArp => 0xCB,
            ProtocolId::Ip => 0xCC,
            ProtocolId::Arp => 0xCD,
            ProtocolId::FlexNet => 0xCE,
            ProtocolId::NetRom => 0xCF,
            ProtocolId::NoLayer3 => 0xF0,
            ProtocolId::Escape => 0xFF,
            ProtocolId::Other(byte) => byte,
        }
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), u8::from(*self))
    }
}
