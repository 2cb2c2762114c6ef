use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::broadcast::Outbound;
use crate::peer::PeerConnection;

/// Connections on the virtual channel, shared by the accept and
/// coordinator loops.
///
/// Every operation holds the lock for its whole duration, so an append from
/// the accept loop never interleaves with a coordinator pass.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<Vec<PeerConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a connection and return the new connection count.
    pub fn add(&self, connection: PeerConnection) -> usize {
        let mut connections = self.lock();
        connections.push(connection);
        connections.len()
    }

    /// Detach every connection that is no longer connected.
    ///
    /// The caller shuts them down outside the lock.
    pub fn remove_dead(&self) -> Vec<PeerConnection> {
        let mut connections = self.lock();
        let (live, dead): (Vec<_>, Vec<_>) = connections
            .drain(..)
            .partition(PeerConnection::is_connected);
        *connections = live;
        dead
    }

    /// Drain the decoded frames of every connection, tagged with their origin.
    pub fn collect_frames(&self) -> Vec<Outbound> {
        self.lock()
            .iter()
            .flat_map(|connection| {
                let origin = connection.id();
                connection
                    .take_outstanding_frames()
                    .into_iter()
                    .map(move |frame| Outbound { origin, frame })
            })
            .collect()
    }

    /// Queue each frame on every connection except the one it came from.
    ///
    /// Returns the number of deliveries queued.
    pub fn broadcast(&self, planned: &[Outbound]) -> usize {
        let connections = self.lock();
        let mut delivered = 0;
        for outbound in planned {
            for connection in connections.iter() {
                if connection.id() == outbound.origin {
                    continue;
                }
                connection.queue_frame(&outbound.frame);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Detach every connection.
    pub fn drain_all(&self) -> Vec<PeerConnection> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PeerConnection>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::time::Duration;

    use kisslink_kiss::{KissConfig, Unstuffer, FEND};
    use kisslink_transport::KissStream;

    use super::*;

    fn config() -> KissConfig {
        KissConfig {
            poll_interval: Duration::from_millis(10),
            ..KissConfig::default()
        }
    }

    fn open_pair(registry: &ConnectionRegistry, id: u64) -> KissStream {
        let (local, remote) = KissStream::pair().unwrap();
        remote
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        registry.add(PeerConnection::open(id, local, &config()).unwrap());
        remote
    }

    fn wait_for<F: FnMut() -> bool>(mut condition: F) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not met in time");
    }

    #[test]
    fn add_reports_count() {
        let registry = ConnectionRegistry::new();
        let _a = open_pair(&registry, 1);
        let _b = open_pair(&registry, 2);
        assert_eq!(registry.len(), 2);

        for connection in registry.drain_all() {
            connection.shutdown();
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_dead_detaches_closed_peers() {
        let registry = ConnectionRegistry::new();
        let keep = open_pair(&registry, 1);
        let gone = open_pair(&registry, 2);

        drop(gone);
        let mut dead = Vec::new();
        wait_for(|| {
            dead.extend(registry.remove_dead());
            !dead.is_empty()
        });
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id(), 2);
        assert_eq!(registry.len(), 1);

        for connection in dead.into_iter().chain(registry.drain_all()) {
            connection.shutdown();
        }
        drop(keep);
    }

    #[test]
    fn collect_tags_origin_and_broadcast_skips_it() {
        let registry = ConnectionRegistry::new();
        let mut a = open_pair(&registry, 1);
        let mut b = open_pair(&registry, 2);

        a.write_all(&[FEND, 0x00, 0x61, FEND]).unwrap();
        let mut collected = Vec::new();
        wait_for(|| {
            collected.extend(registry.collect_frames());
            !collected.is_empty()
        });
        assert_eq!(collected[0].origin, 1);

        assert_eq!(registry.broadcast(&collected), 1);

        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(Unstuffer::new().feed(&buf)[0].as_ref(), &[0x00, 0x61]);

        a.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        assert!(a.read(&mut buf).is_err());

        for connection in registry.drain_all() {
            connection.shutdown();
        }
    }
}
