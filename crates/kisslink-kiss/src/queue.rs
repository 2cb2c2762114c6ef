use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use crate::frame::KissFrame;

/// Thread-safe FIFO of decoded frames.
///
/// One decode loop pushes; any number of consumers may peek, take or
/// snapshot concurrently. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    inner: Arc<Mutex<VecDeque<KissFrame>>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, frame: KissFrame) {
        self.lock().push_back(frame);
    }

    /// The oldest queued frame, left in place.
    pub fn peek(&self) -> Option<KissFrame> {
        self.lock().front().cloned()
    }

    /// Remove and return the oldest queued frame.
    pub fn take(&self) -> Option<KissFrame> {
        self.lock().pop_front()
    }

    /// Remove and return every queued frame, oldest first.
    pub fn take_all(&self) -> Vec<KissFrame> {
        self.lock().drain(..).collect()
    }

    /// Copy of every queued frame, oldest first, without consuming them.
    pub fn snapshot(&self) -> Vec<KissFrame> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<KissFrame>> {
        // Queue contents stay consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outbound queue of encoded frames feeding an encode loop.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutboundQueue {
    inner: Arc<(Mutex<VecDeque<Bytes>>, Condvar)>,
}

impl OutboundQueue {
    pub(crate) fn push(&self, bytes: Bytes) {
        let (lock, ready) = &*self.inner;
        lock.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(bytes);
        ready.notify_one();
    }

    /// Wait up to `timeout` for a frame, then dequeue without blocking.
    pub(crate) fn pop_timeout(&self, timeout: Duration) -> Option<Bytes> {
        let (lock, ready) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = ready
            .wait_timeout_while(guard, timeout, |queue| queue.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        guard.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
