use std::io::{ErrorKind, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use tracing::{debug, trace, warn};

use crate::codec::{KissConfig, Unstuffer};
use crate::error::{KissError, Result};
use crate::frame::KissFrame;
use crate::queue::FrameQueue;
use crate::worker::{StopSignal, Worker};

/// Result returned by a frame observer.
pub type ObserverResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Callback run synchronously on the decode thread for each completed frame.
pub type FrameObserver = Arc<dyn Fn(&KissFrame) -> ObserverResult + Send + Sync>;

/// Decodes KISS frames from any `Read` stream on a background thread.
///
/// Completed frames are appended to a [`FrameQueue`] that callers drain at
/// their own pace. The read loop exits when the stream reports end-of-stream
/// or an I/O error; either marks the decoder disconnected.
///
/// For a silent peer to observe [`stop`](Self::stop) promptly, the stream
/// should have a read timeout (see `KissStream::set_read_timeout`); timeouts
/// are treated as idle polls.
pub struct KissDecoder<R> {
    reader: Arc<Mutex<R>>,
    queue: FrameQueue,
    observers: Arc<Mutex<Vec<FrameObserver>>>,
    connected: Arc<AtomicBool>,
    config: KissConfig,
    worker: Worker<KissError>,
}

impl<R: Read + Send + 'static> KissDecoder<R> {
    /// Create a stopped decoder with default configuration.
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, KissConfig::default())
    }

    /// Create a stopped decoder with explicit configuration.
    pub fn with_config(reader: R, config: KissConfig) -> Self {
        Self {
            reader: Arc::new(Mutex::new(reader)),
            queue: FrameQueue::new(),
            observers: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
            config,
            worker: Worker::new("kiss-decoder"),
        }
    }

    /// Start the read loop. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<()> {
        let reader = Arc::clone(&self.reader);
        let queue = self.queue.clone();
        let observers = Arc::clone(&self.observers);
        let connected = Arc::clone(&self.connected);
        let config = self.config.clone();

        self.worker.start(move |signal| {
            run_decode_loop(&reader, &queue, &observers, &connected, &config, &signal)
        })?;
        Ok(())
    }

    /// Stop the read loop, wait for it to exit and return its fault, if any.
    ///
    /// Idempotent: repeated calls return the same last fault.
    pub fn stop(&mut self) -> Option<Arc<KissError>> {
        self.worker.stop()
    }

    /// Returns true while the read loop is active.
    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// The fault of a loop that has exited, if any. Never blocks.
    pub fn last_fault(&mut self) -> Option<Arc<KissError>> {
        self.worker.poll()
    }

    /// False once the stream reported end-of-stream or a read error.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Register a callback run for every completed frame.
    ///
    /// Frames are queued before observers run, so an observer may take them
    /// from the queue. An observer error or panic is logged and ignored.
    pub fn on_frame<F>(&self, observer: F)
    where
        F: Fn(&KissFrame) -> ObserverResult + Send + Sync + 'static,
    {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    /// The oldest undelivered frame, left in the queue.
    pub fn peek_next_frame(&self) -> Option<KissFrame> {
        self.queue.peek()
    }

    /// Remove and return the oldest undelivered frame.
    pub fn take_next_frame(&self) -> Option<KissFrame> {
        self.queue.take()
    }

    /// Remove and return every undelivered frame, oldest first.
    pub fn take_outstanding_frames(&self) -> Vec<KissFrame> {
        self.queue.take_all()
    }

    /// Copy of every undelivered frame, oldest first.
    pub fn outstanding_frames(&self) -> Vec<KissFrame> {
        self.queue.snapshot()
    }

    /// Shared handle to the decoded frame queue.
    pub fn queue(&self) -> FrameQueue {
        self.queue.clone()
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &KissConfig {
        &self.config
    }
}

fn run_decode_loop<R: Read>(
    reader: &Mutex<R>,
    queue: &FrameQueue,
    observers: &Mutex<Vec<FrameObserver>>,
    connected: &AtomicBool,
    config: &KissConfig,
    signal: &StopSignal,
) -> Result<()> {
    let mut reader = reader.lock().unwrap_or_else(PoisonError::into_inner);
    let mut unstuffer = Unstuffer::new();
    let mut chunk = vec![0u8; config.read_chunk_size.max(1)];

    while !signal.is_raised() {
        let read = match reader.read(&mut chunk) {
            Ok(0) => {
                debug!("kiss stream reached end-of-stream");
                connected.store(false, Ordering::SeqCst);
                return Ok(());
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                continue
            }
            Err(err) => {
                connected.store(false, Ordering::SeqCst);
                return Err(KissError::Io(err));
            }
        };

        for &byte in &chunk[..read] {
            let Some(raw) = unstuffer.push(byte) else {
                continue;
            };
            let frame = KissFrame::from_raw(SystemTime::now(), raw)?;
            trace!(
                address = frame.address(),
                command = frame.command(),
                size = frame.data().len(),
                "decoded kiss frame"
            );
            queue.push(frame.clone());
            notify(observers, &frame);
        }
    }

    Ok(())
}

fn notify(observers: &Mutex<Vec<FrameObserver>>, frame: &KissFrame) {
    let observers: Vec<FrameObserver> = observers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    for observer in observers {
        match catch_unwind(AssertUnwindSafe(|| observer(frame))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "frame observer failed"),
            Err(_) => warn!("frame observer panicked"),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Cursor, Write};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use kisslink_transport::KissStream;

    use super::*;
    use crate::codec::{FEND, FESC, TFEND};

    fn run_to_end(bytes: Vec<u8>) -> KissDecoder<Cursor<Vec<u8>>> {
        let mut decoder = KissDecoder::new(Cursor::new(bytes));
        decoder.start().unwrap();
        while decoder.is_running() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(decoder.stop().is_none());
        decoder
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
    fn decodes_single_frame() {
        let decoder = run_to_end(vec![FEND, 0x00, 0x41, 0x42, FEND]);

        let frames = decoder.take_outstanding_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].address(), 0);
        assert_eq!(frames[0].command(), 0);
        assert_eq!(frames[0].data().as_ref(), &[0x41, 0x42]);
    }

    #[test]
    fn decodes_escaped_delimiter() {
        let decoder = run_to_end(vec![FEND, 0x00, FESC, TFEND, FEND]);
        let frame = decoder.take_next_frame().unwrap();
        assert_eq!(frame.data().as_ref(), &[FEND]);
        assert!(decoder.take_next_frame().is_none());
    }

    #[test]
    fn empty_frame_yields_nothing() {
        let decoder = run_to_end(vec![FEND, FEND]);
        assert!(decoder.peek_next_frame().is_none());
    }

    #[test]
    fn end_of_stream_marks_disconnected() {
        let decoder = run_to_end(Vec::new());
        assert!(!decoder.is_connected());
    }

    #[test]
    fn frames_keep_arrival_order() {
        let mut wire = Vec::new();
        for i in 0..10u8 {
            wire.extend_from_slice(&[FEND, 0x00, i, FEND]);
        }
        let decoder = run_to_end(wire);

        assert_eq!(decoder.outstanding_frames().len(), 10);
        let order: Vec<u8> = decoder
            .take_outstanding_frames()
            .iter()
            .map(|frame| frame.data()[0])
            .collect();
        assert_eq!(order, (0..10u8).collect::<Vec<_>>());
    }

    #[test]
    fn observer_runs_and_failures_do_not_stop_decoding() {
        let mut decoder = KissDecoder::new(Cursor::new(vec![
            FEND, 0x00, 0x01, FEND, FEND, 0x00, 0x02, FEND,
        ]));
        let seen = Arc::new(AtomicUsize::new(0));

        decoder.on_frame(|_| Err("observer refused".into()));
        decoder.on_frame(|_| panic!("observer panicked"));
        {
            let seen = Arc::clone(&seen);
            decoder.on_frame(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        decoder.start().unwrap();
        wait_for(|| !decoder.is_running());

        assert!(decoder.stop().is_none());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(decoder.take_outstanding_frames().len(), 2);
    }

    #[test]
    fn read_error_is_captured_as_fault() {
        let mut decoder = KissDecoder::new(FailingReader);
        decoder.start().unwrap();
        wait_for(|| !decoder.is_running());

        let fault = decoder.last_fault().expect("read error should be captured");
        assert!(matches!(&*fault, KissError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
        assert!(!decoder.is_connected());

        let first = decoder.stop().unwrap();
        let second = decoder.stop().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn stop_interrupts_idle_stream_with_timeout() {
        let (left, mut right) = KissStream::pair().unwrap();
        left.set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();

        let mut decoder = KissDecoder::new(left);
        decoder.start().unwrap();
        decoder.start().unwrap();

        right.write_all(&[FEND, 0x00, 0x55, FEND]).unwrap();
        wait_for(|| decoder.peek_next_frame().is_some());

        assert!(decoder.stop().is_none());
        assert!(decoder.stop().is_none());
        assert!(!decoder.is_running());
        assert!(decoder.is_connected());
        assert_eq!(decoder.take_next_frame().unwrap().data().as_ref(), &[0x55]);
    }

    #[test]
    fn restarted_decoder_keeps_queue() {
        let (left, mut right) = KissStream::pair().unwrap();
        left.set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        let mut decoder = KissDecoder::new(left);

        decoder.start().unwrap();
        right.write_all(&[FEND, 0x00, 0x01, FEND]).unwrap();
        wait_for(|| decoder.queue().len() == 1);
        decoder.stop();

        decoder.start().unwrap();
        right.write_all(&[FEND, 0x00, 0x02, FEND]).unwrap();
        wait_for(|| decoder.queue().len() == 2);
        decoder.stop();
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}
