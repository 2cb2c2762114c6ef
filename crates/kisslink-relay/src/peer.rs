use std::sync::Arc;

use kisslink_kiss::{KissConfig, KissDecoder, KissEncoder, KissError, KissFrame};
use kisslink_transport::{KissStream, StreamConfig};
use tracing::{debug, warn};

use crate::error::Result;

/// One client of the virtual channel: a transport with its own running
/// KISS decoder and encoder.
pub struct PeerConnection {
    id: u64,
    label: String,
    stream: KissStream,
    decoder: KissDecoder<KissStream>,
    encoder: KissEncoder<KissStream>,
}

impl PeerConnection {
    /// Wrap an accepted stream and start both codec loops.
    ///
    /// Read and write timeouts are set to the codec poll interval so both
    /// loops can be stopped while the peer is silent or stalled.
    pub fn open(id: u64, stream: KissStream, config: &KissConfig) -> Result<Self> {
        stream.apply(&StreamConfig {
            read_timeout: Some(config.poll_interval),
            write_timeout: Some(config.poll_interval),
        })?;
        let label = stream.peer_label();

        let mut decoder = KissDecoder::with_config(stream.try_clone()?, config.clone());
        let mut encoder = KissEncoder::with_config(stream.try_clone()?, config.clone());
        decoder.start()?;
        encoder.start()?;
        debug!(id, peer = %label, "peer codec loops started");

        Ok(Self {
            id,
            label,
            stream,
            decoder,
            encoder,
        })
    }

    /// Registry-assigned identifier, unique for the channel's lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer address for diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// False once the transport closed or either codec loop ended.
    pub fn is_connected(&self) -> bool {
        self.decoder.is_connected() && self.decoder.is_running() && self.encoder.is_running()
    }

    /// Drain every frame decoded from this peer so far, oldest first.
    pub fn take_outstanding_frames(&self) -> Vec<KissFrame> {
        self.decoder.take_outstanding_frames()
    }

    /// Queue a frame for transmission to this peer.
    pub fn queue_frame(&self, frame: &KissFrame) {
        self.encoder.queue_frame(frame);
    }

    /// Stop both loops and close the transport.
    ///
    /// Returns the faults the loops ended with, decoder first.
    pub fn shutdown(mut self) -> Vec<Arc<KissError>> {
        let faults: Vec<Arc<KissError>> = [self.decoder.stop(), self.encoder.stop()]
            .into_iter()
            .flatten()
            .collect();

        if let Err(err) = self.stream.shutdown() {
            warn!(peer = %self.label, error = %err, "transport shutdown failed");
        }
        for fault in &faults {
            debug!(peer = %self.label, error = %fault, "peer loop fault");
        }
        faults
    }
}

impl std::fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("connected", &self.is_connected())
            .finish()
    }
}
