use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kisslink_kiss::{KissConfig, StopSignal, Worker};
use kisslink_transport::{TcpKissListener, TransportError};
use tracing::{debug, error, info, warn};

use crate::broadcast::plan_broadcast;
use crate::error::{RelayError, Result};
use crate::peer::PeerConnection;
use crate::registry::ConnectionRegistry;

/// Default TCP port of the virtual channel.
pub const DEFAULT_PORT: u16 = 8105;

/// Virtual channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Codec settings for every peer connection.
    pub codec: KissConfig,
    /// Pause after a coordinator cycle that moved no frames. Default: 2 ms.
    pub idle_backoff: Duration,
    /// Interval between accept attempts when no client is waiting.
    /// Default: 50 ms.
    pub accept_poll: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            codec: KissConfig::default(),
            idle_backoff: Duration::from_millis(2),
            accept_poll: Duration::from_millis(50),
        }
    }
}

/// What one coordinator cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Dead connections removed.
    pub removed: usize,
    /// Frames drained from live connections.
    pub collected: usize,
    /// Frames queued for rebroadcast, counted once per recipient.
    pub relayed: usize,
}

/// Run one coordinator pass over the registry.
///
/// Removes and shuts down dead connections, drains every live connection,
/// and rebroadcasts its data frames in timestamp order to every other
/// connection.
pub fn relay_cycle(registry: &ConnectionRegistry) -> CycleReport {
    let dead = registry.remove_dead();
    let removed = dead.len();
    for connection in dead {
        let label = connection.label().to_string();
        let faults = connection.shutdown();
        info!(
            peer = %label,
            connections = registry.len(),
            "connection lost"
        );
        for fault in faults {
            warn!(peer = %label, error = %fault, "peer loop ended with fault");
        }
    }

    let collected = registry.collect_frames();
    let collected_count = collected.len();
    if collected.is_empty() {
        return CycleReport {
            removed,
            ..CycleReport::default()
        };
    }

    let planned = plan_broadcast(collected);
    for outbound in &planned {
        debug!(
            origin = outbound.origin,
            address = outbound.frame.address(),
            size = outbound.frame.data().len(),
            "relaying frame"
        );
    }
    let relayed = registry.broadcast(&planned);

    CycleReport {
        removed,
        collected: collected_count,
        relayed,
    }
}

/// A TCP listener whose clients share one simulated broadcast medium.
///
/// Every data frame a client sends is relayed to every other client.
pub struct VirtualChannel {
    listener: Arc<TcpKissListener>,
    registry: ConnectionRegistry,
    config: ChannelConfig,
    next_id: Arc<AtomicU64>,
    coordinator: Worker<RelayError>,
    acceptor: Worker<RelayError>,
    started: bool,
}

impl VirtualChannel {
    /// Bind the channel's listener. No loop runs until [`start`](Self::start).
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug, config: ChannelConfig) -> Result<Self> {
        let listener = TcpKissListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener: Arc::new(listener),
            registry: ConnectionRegistry::new(),
            config,
            next_id: Arc::new(AtomicU64::new(1)),
            coordinator: Worker::new("relay-coordinator"),
            acceptor: Worker::new("relay-acceptor"),
            started: false,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Start the coordinator and accept loops. Idempotent.
    pub fn start(&mut self) -> Result<()> {
        let registry = self.registry.clone();
        let idle_backoff = self.config.idle_backoff;
        self.coordinator
            .start(move |signal| run_coordinator(&registry, idle_backoff, &signal))?;

        let listener = Arc::clone(&self.listener);
        let registry = self.registry.clone();
        let config = self.config.clone();
        let next_id = Arc::clone(&self.next_id);
        self.acceptor.start(move |signal| {
            run_acceptor(&listener, &registry, &config, &next_id, &signal)
        })?;

        self.started = true;
        Ok(())
    }

    /// Number of connections currently registered.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Fail if either loop has ended since [`start`](Self::start).
    ///
    /// Returns the loop's fault, or [`RelayError::LoopExited`] if it ended
    /// without one.
    pub fn check(&mut self) -> std::result::Result<(), Arc<RelayError>> {
        if !self.started {
            return Ok(());
        }
        for (worker, name) in [
            (&mut self.coordinator, "coordinator"),
            (&mut self.acceptor, "accept"),
        ] {
            if worker.is_running() {
                continue;
            }
            return Err(worker
                .poll()
                .unwrap_or_else(|| Arc::new(RelayError::LoopExited(name))));
        }
        Ok(())
    }

    /// Stop both loops and shut down every remaining connection.
    ///
    /// Returns the coordinator's fault, else the accept loop's.
    pub fn stop(&mut self) -> Option<Arc<RelayError>> {
        let accept_fault = self.acceptor.stop();
        let coordinator_fault = self.coordinator.stop();
        self.started = false;

        for connection in self.registry.drain_all() {
            let label = connection.label().to_string();
            for fault in connection.shutdown() {
                warn!(peer = %label, error = %fault, "peer loop ended with fault");
            }
        }
        debug!("virtual channel stopped");
        coordinator_fault.or(accept_fault)
    }

    /// Run until `running` is cleared or a loop fails.
    ///
    /// Always stops the channel before returning.
    pub fn run_until(&mut self, running: &AtomicBool) -> std::result::Result<(), Arc<RelayError>> {
        self.start().map_err(Arc::new)?;
        let mut outcome = Ok(());
        while running.load(Ordering::SeqCst) {
            if let Err(fault) = self.check() {
                error!(error = %fault, "relay loop failed");
                outcome = Err(fault);
                break;
            }
            std::thread::sleep(self.config.accept_poll);
        }

        match (self.stop(), outcome) {
            (_, Err(fault)) => Err(fault),
            (Some(fault), Ok(())) => Err(fault),
            (None, Ok(())) => Ok(()),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

impl Drop for VirtualChannel {
    fn drop(&mut self) {
        if self.started {
            self.stop();
        }
    }
}

fn run_coordinator(
    registry: &ConnectionRegistry,
    idle_backoff: Duration,
    signal: &StopSignal,
) -> Result<()> {
    while !signal.is_raised() {
        let report = relay_cycle(registry);
        if report.collected == 0 {
            std::thread::sleep(idle_backoff);
        } else {
            std::thread::yield_now();
        }
    }
    Ok(())
}

fn run_acceptor(
    listener: &TcpKissListener,
    registry: &ConnectionRegistry,
    config: &ChannelConfig,
    next_id: &AtomicU64,
    signal: &StopSignal,
) -> Result<()> {
    while !signal.is_raised() {
        let stream = match listener.try_accept() {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                std::thread::sleep(config.accept_poll);
                continue;
            }
            Err(TransportError::Accept(err)) if is_transient_accept_error(&err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let id = next_id.fetch_add(1, Ordering::Relaxed);
        match PeerConnection::open(id, stream, &config.codec) {
            Ok(connection) => {
                let label = connection.label().to_string();
                let count = registry.add(connection);
                info!(peer = %label, connections = count, "connection established");
            }
            Err(err) => warn!(error = %err, "failed to open peer connection"),
        }
    }
    Ok(())
}

fn is_transient_accept_error(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        err.kind(),
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::TimedOut
    )
}
