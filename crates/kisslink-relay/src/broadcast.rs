use kisslink_kiss::KissFrame;

/// A frame collected from one peer, awaiting rebroadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Id of the connection the frame was received from.
    pub origin: u64,
    pub frame: KissFrame,
}

/// Select the frames to put on air and order them.
///
/// Only KISS data frames are relayed; TNC command frames are consumed.
/// Frames are ordered by local receipt time, oldest first, keeping
/// collection order for equal timestamps.
pub fn plan_broadcast(mut collected: Vec<Outbound>) -> Vec<Outbound> {
    collected.retain(|outbound| outbound.frame.is_data());
    collected.sort_by_key(|outbound| outbound.frame.timestamp());
    collected
}
