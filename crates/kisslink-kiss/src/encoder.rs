use std::io::{ErrorKind, Write};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{encode_frame, KissConfig};
use crate::error::{KissError, Result};
use crate::frame::KissFrame;
use crate::queue::OutboundQueue;
use crate::worker::{StopSignal, Worker};

/// Encodes KISS frames and writes them to any `Write` stream on a background
/// thread, in submission order.
pub struct KissEncoder<W> {
    writer: Arc<Mutex<W>>,
    outbound: OutboundQueue,
    config: KissConfig,
    worker: Worker<KissError>,
}

impl<W: Write + Send + 'static> KissEncoder<W> {
    /// Create a stopped encoder with default configuration.
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, KissConfig::default())
    }

    /// Create a stopped encoder with explicit configuration.
    pub fn with_config(writer: W, config: KissConfig) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            outbound: OutboundQueue::default(),
            config,
            worker: Worker::new("kiss-encoder"),
        }
    }

    /// Start the write loop. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<()> {
        let writer = Arc::clone(&self.writer);
        let outbound = self.outbound.clone();
        let config = self.config.clone();

        self.worker
            .start(move |signal| run_encode_loop(&writer, &outbound, &config, &signal))?;
        Ok(())
    }

    /// Stop the write loop, wait for it to exit and return its fault, if any.
    ///
    /// Frames still queued stay queued for the next [`start`](Self::start).
    pub fn stop(&mut self) -> Option<Arc<KissError>> {
        self.worker.stop()
    }

    /// Returns true while the write loop is active.
    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// The fault of a loop that has exited, if any. Never blocks.
    pub fn last_fault(&mut self) -> Option<Arc<KissError>> {
        self.worker.poll()
    }

    /// Serialize a frame and queue it for transmission.
    pub fn queue_frame(&self, frame: &KissFrame) {
        let mut wire = BytesMut::with_capacity(frame.data().len() + 4);
        encode_frame(frame, &mut wire);
        self.outbound.push(wire.freeze());
    }

    /// Queue bytes that are already KISS-encoded (delimiters included).
    pub fn queue_raw_frame(&self, raw: impl Into<Bytes>) -> Result<()> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(KissError::EmptyFrame);
        }
        self.outbound.push(raw);
        Ok(())
    }

    /// Number of encoded frames waiting to be written.
    pub fn pending(&self) -> usize {
        self.outbound.len()
    }

    /// Current encoder configuration.
    pub fn config(&self) -> &KissConfig {
        &self.config
    }
}

fn run_encode_loop<W: Write>(
    writer: &Mutex<W>,
    outbound: &OutboundQueue,
    config: &KissConfig,
    signal: &StopSignal,
) -> Result<()> {
    let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);

    while !signal.is_raised() {
        let Some(frame) = outbound.pop_timeout(config.poll_interval) else {
            continue;
        };
        write_frame(&mut *writer, &frame, signal)?;
        trace!(size = frame.len(), "wrote kiss frame");
    }

    Ok(())
}

fn write_frame<W: Write>(writer: &mut W, bytes: &[u8], signal: &StopSignal) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match writer.write(&bytes[offset..]) {
            Ok(0) => return Err(KissError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            // A stalled peer must not pin the loop past a stop request.
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                if signal.is_raised() {
                    return Err(KissError::Io(err));
                }
            }
            Err(err) => return Err(KissError::Io(err)),
        }
    }

    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock && !signal.is_raised() => continue,
            Err(err) => return Err(KissError::Io(err)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Read;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use kisslink_transport::KissStream;

    use super::*;
    use crate::codec::{Unstuffer, FEND, FESC, TFESC};
    use crate::command::DATA;

    #[derive(Clone, Default)]
    struct SharedSink {
        data: Arc<Mutex<Vec<u8>>>,
        flushed: Arc<AtomicBool>,
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not met in time");
    }

    #[test]
    fn writes_encoded_frame() {
        let sink = SharedSink::default();
        let mut encoder = KissEncoder::new(sink.clone());
        encoder.start().unwrap();

        encoder.queue_frame(&KissFrame::new(0, DATA, vec![0x41, FESC]));
        wait_for(|| !sink.data.lock().unwrap().is_empty());

        assert!(encoder.stop().is_none());
        assert_eq!(
            sink.data.lock().unwrap().as_slice(),
            &[FEND, 0x00, 0x41, FESC, TFESC, FEND]
        );
        assert!(sink.flushed.load(Ordering::SeqCst));
    }

    #[test]
    fn preserves_submission_order() {
        let sink = SharedSink::default();
        let mut encoder = KissEncoder::new(sink.clone());
        for i in 0..32u8 {
            encoder.queue_frame(&KissFrame::new(0, DATA, vec![i]));
        }
        assert_eq!(encoder.pending(), 32);

        encoder.start().unwrap();
        wait_for(|| encoder.pending() == 0);
        encoder.stop();

        let wire = sink.data.lock().unwrap().clone();
        let order: Vec<u8> = Unstuffer::new()
            .feed(&wire)
            .iter()
            .map(|raw| raw[1])
            .collect();
        assert_eq!(order, (0..32u8).collect::<Vec<_>>());
    }

    #[test]
    fn raw_frame_passes_through_and_empty_is_rejected() {
        let sink = SharedSink::default();
        let mut encoder = KissEncoder::new(sink.clone());

        assert!(matches!(
            encoder.queue_raw_frame(Bytes::new()),
            Err(KissError::EmptyFrame)
        ));
        encoder
            .queue_raw_frame(vec![FEND, 0x00, 0x7E, FEND])
            .unwrap();

        encoder.start().unwrap();
        wait_for(|| encoder.pending() == 0);
        encoder.stop();
        assert_eq!(
            sink.data.lock().unwrap().as_slice(),
            &[FEND, 0x00, 0x7E, FEND]
        );
    }

    #[test]
    fn write_returning_zero_is_fault() {
        let mut encoder = KissEncoder::new(ZeroWriter);
        encoder.queue_frame(&KissFrame::new(0, DATA, vec![1]));
        encoder.start().unwrap();
        wait_for(|| !encoder.is_running());

        let fault = encoder.stop().expect("fault should be captured");
        assert!(matches!(*fault, KissError::ConnectionClosed));
        assert!(encoder.stop().is_some());
    }

    #[test]
    fn interrupted_write_retries() {
        let mut encoder = KissEncoder::new(InterruptedOnce {
            interrupted: false,
            data: Arc::new(Mutex::new(Vec::new())),
        });
        encoder.queue_frame(&KissFrame::new(0, DATA, vec![9]));
        encoder.start().unwrap();
        wait_for(|| encoder.pending() == 0);
        assert!(encoder.stop().is_none());
    }

    #[test]
    fn stop_twice_is_safe() {
        let mut encoder = KissEncoder::new(SharedSink::default());
        encoder.start().unwrap();
        encoder.start().unwrap();
        assert!(encoder.stop().is_none());
        assert!(encoder.stop().is_none());
        assert!(!encoder.is_running());
    }

    #[test]
    fn roundtrip_over_stream_pair() {
        let (left, mut right) = KissStream::pair().unwrap();
        let mut encoder = KissEncoder::new(left);
        encoder.start().unwrap();
        encoder.queue_frame(&KissFrame::new(2, DATA, vec![FEND, 0x10]));

        let mut buf = [0u8; 6];
        right.read_exact(&mut buf).unwrap();
        encoder.stop();

        let raw = Unstuffer::new().feed(&buf);
        let frame = KissFrame::from_raw(std::time::SystemTime::now(), raw[0].clone()).unwrap();
        assert_eq!(frame.address(), 2);
        assert_eq!(frame.data().as_ref(), &[FEND, 0x10]);
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptedOnce {
        interrupted: bool,
        data: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
