//! Background loop handle with cooperative cancellation.
//!
//! Every long-running loop in kisslink (decode, encode, relay coordinator,
//! accept) runs on its own thread behind a [`Worker`]. Stopping is
//! cooperative: the loop body polls its [`StopSignal`] at iteration
//! boundaries. A loop's failure, including a panic, is captured at the
//! thread boundary and handed back to whoever stops or polls the worker.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::debug;

/// Error types that background loops may fail with.
pub trait LoopError: std::error::Error + Send + Sync + 'static {
    /// Build the error reported when the loop panicked.
    fn from_panic(message: String) -> Self;
}

/// Cooperative cancellation flag shared between a worker and its loop.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to exit at its next iteration boundary.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Owns at most one running loop thread and its last captured fault.
pub struct Worker<E> {
    name: String,
    signal: StopSignal,
    handle: Option<JoinHandle<Result<(), E>>>,
    last_fault: Option<Arc<E>>,
}

impl<E: LoopError> Worker<E> {
    /// Create an idle worker. `name` labels the thread and log events.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signal: StopSignal::new(),
            handle: None,
            last_fault: None,
        }
    }

    /// Spawn `body` on a new thread unless a loop is already running.
    ///
    /// Returns `Ok(false)` without doing anything when already running.
    /// Starting again clears the previous fault.
    pub fn start<F>(&mut self, body: F) -> std::io::Result<bool>
    where
        F: FnOnce(StopSignal) -> Result<(), E> + Send + 'static,
    {
        if self.is_running() {
            return Ok(false);
        }
        self.reap();

        let signal = StopSignal::new();
        let loop_signal = signal.clone();
        let handle = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || body(loop_signal))?;

        self.signal = signal;
        self.handle = Some(handle);
        self.last_fault = None;
        debug!(worker = %self.name, "loop started");
        Ok(true)
    }

    /// Returns true while the loop thread has not yet exited.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Collect the result of a loop that exited on its own.
    ///
    /// Returns the last captured fault, if any. Never blocks.
    pub fn poll(&mut self) -> Option<Arc<E>> {
        if self
            .handle
            .as_ref()
            .is_some_and(|handle| handle.is_finished())
        {
            self.reap();
        }
        self.last_fault.clone()
    }

    /// Signal the loop to stop, wait for it to exit, and return its fault.
    ///
    /// Safe to call repeatedly: once stopped, further calls return the same
    /// last fault without touching any thread.
    pub fn stop(&mut self) -> Option<Arc<E>> {
        self.signal.raise();
        self.reap();
        self.last_fault.clone()
    }

    /// The loop name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn reap(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let fault = match handle.join() {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => Some(E::from_panic(panic_message(payload.as_ref()))),
        };

        match &fault {
            Some(err) => debug!(worker = %self.name, error = %err, "loop exited with fault"),
            None => debug!(worker = %self.name, "loop exited"),
        }
        self.last_fault = fault.map(Arc::new);
    }
}

impl<E> Drop for Worker<E> {
    fn drop(&mut self) {
        // Detach rather than join: a loop blocked in I/O may never observe the signal.
        self.signal.raise();
    }
}

impl<E> std::fmt::Debug for Worker<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("active", &self.handle.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::KissError;

    fn idle_loop(signal: StopSignal) -> Result<(), KissError> {
        while !signal.is_raised() {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    #[test]
    fn start_is_idempotent() {
        let mut worker = Worker::<KissError>::new("test-idle");
        assert!(worker.start(idle_loop).unwrap());
        assert!(!worker.start(idle_loop).unwrap());
        assert!(worker.is_running());
        assert!(worker.stop().is_none());
        assert!(!worker.is_running());
    }

    #[test]
    fn stop_twice_without_fault() {
        let mut worker = Worker::<KissError>::new("test-twice");
        worker.start(idle_loop).unwrap();
        assert!(worker.stop().is_none());
        assert!(worker.stop().is_none());
        assert!(!worker.is_running());
    }

    #[test]
    fn stop_on_never_started_worker() {
        let mut worker = Worker::<KissError>::new("test-unstarted");
        assert!(worker.stop().is_none());
        assert!(!worker.is_running());
    }

    #[test]
    fn fault_is_returned_by_every_stop() {
        let mut worker = Worker::<KissError>::new("test-fault");
        worker
            .start(|_| Err(KissError::ConnectionClosed))
            .unwrap();

        let first = worker.stop().expect("fault should be captured");
        let second = worker.stop().expect("fault should be retained");
        assert!(matches!(*first, KissError::ConnectionClosed));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn panic_is_captured_as_fault() {
        let mut worker = Worker::<KissError>::new("test-panic");
        worker.start(|_| panic!("loop blew up")).unwrap();

        let fault = worker.stop().expect("panic should be captured");
        match &*fault {
            KissError::Panicked(message) => assert_eq!(message, "loop blew up"),
            other => panic!("unexpected fault: {other}"),
        }
    }

    #[test]
    fn poll_reaps_finished_loop() {
        let mut worker = Worker::<KissError>::new("test-poll");
        worker.start(|_| Err(KissError::EmptyFrame)).unwrap();

        while worker.is_running() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(matches!(worker.poll().as_deref(), Some(KissError::EmptyFrame)));
    }

    #[test]
    fn restart_clears_previous_fault() {
        let mut worker = Worker::<KissError>::new("test-restart");
        worker.start(|_| Err(KissError::EmptyFrame)).unwrap();
        assert!(worker.stop().is_some());

        worker.start(idle_loop).unwrap();
        assert!(worker.stop().is_none());
    }
}
