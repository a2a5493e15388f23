//! In-process adapter pair.
//!
//! [`MemoryAdapter`] is the gateway side; [`MemoryPeer`] plays the daemon. The
//! peer can inject inbound frames, observe written frames, and simulate an
//! unreachable or flaky daemon.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use meshgate_core::Network;
use tokio::sync::{Mutex, mpsc};

use crate::error::AdapterError;
use crate::shutdown::ShutdownToken;
use crate::traits::Adapter;

const CHANNEL_DEPTH: usize = 256;

#[derive(Default)]
struct Faults {
    failing_writes: AtomicU32,
    unreachable: AtomicBool,
}

impl Faults {
    fn take_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn refused() -> AdapterError {
        AdapterError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "daemon unreachable",
        ))
    }
}

pub struct MemoryAdapter {
    name: String,
    network: Network,
    mtu: usize,
    shutdown: ShutdownToken,
    inbound: Mutex<mpsc::Receiver<Vec<u8>>>,
    outbound: mpsc::Sender<Vec<u8>>,
    faults: Arc<Faults>,
}

/// The daemon end of a [`MemoryAdapter`].
pub struct MemoryPeer {
    inbound: mpsc::Sender<Vec<u8>>,
    outbound: mpsc::Receiver<Vec<u8>>,
    faults: Arc<Faults>,
}

impl MemoryAdapter {
    pub fn pair(name: impl Into<String>, network: Network, mtu: usize) -> (Self, MemoryPeer) {
        let (in_tx, in_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_DEPTH);
        let faults = Arc::new(Faults::default());
        let adapter = Self {
            name: name.into(),
            network,
            mtu,
            shutdown: ShutdownToken::new(),
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
            faults: Arc::clone(&faults),
        };
        let peer = MemoryPeer {
            inbound: in_tx,
            outbound: out_rx,
            faults,
        };
        (adapter, peer)
    }
}

impl MemoryPeer {
    /// Deliver a frame to the gateway as if the daemon had received it.
    pub async fn send(&self, frame: Vec<u8>) -> Result<(), AdapterError> {
        self.inbound
            .send(frame)
            .await
            .map_err(|_| AdapterError::Stopped)
    }

    /// Next frame the gateway wrote, or `None` once the adapter is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.try_recv().ok()
    }

    /// Make the next `count` writes fail with a transient error.
    pub fn fail_next_writes(&self, count: u32) {
        self.faults.failing_writes.store(count, Ordering::SeqCst);
    }

    /// An unreachable daemon refuses every write and probe.
    pub fn set_reachable(&self, reachable: bool) {
        self.faults.unreachable.store(!reachable, Ordering::SeqCst);
    }
}

impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn network(&self) -> Network {
        self.network
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn is_connected(&self) -> bool {
        self.shutdown.is_connected()
    }

    async fn start(&self) -> Result<(), AdapterError> {
        if self.shutdown.is_stopped() {
            return Err(AdapterError::Stopped);
        }
        self.shutdown.set_connected(true);
        Ok(())
    }

    async fn stop(&self) -> Result<(), AdapterError> {
        self.shutdown.signal_stop();
        Ok(())
    }

    async fn write_frame(&self, frame: &[u8]) -> Result<(), AdapterError> {
        if self.shutdown.is_stopped() {
            return Err(AdapterError::Stopped);
        }
        if !self.is_connected() {
            return Err(AdapterError::NotConnected);
        }
        if frame.len() > self.mtu {
            return Err(AdapterError::TransmitFailed(format!(
                "frame of {} bytes exceeds mtu {}",
                frame.len(),
                self.mtu
            )));
        }
        if self.faults.unreachable.load(Ordering::SeqCst) {
            return Err(Faults::refused());
        }
        if self.faults.take_failure() {
            return Err(AdapterError::TransmitFailed("injected write failure".into()));
        }
        self.outbound
            .send(frame.to_vec())
            .await
            .map_err(|_| AdapterError::NotConnected)
    }

    async fn read_frame(&self) -> Result<Option<Vec<u8>>, AdapterError> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            _ = self.shutdown.stopped() => Ok(None),
            frame = inbound.recv() => Ok(frame),
        }
    }

    async fn probe(&self) -> Result<(), AdapterError> {
        if self.shutdown.is_stopped() {
            return Err(AdapterError::Stopped);
        }
        if self.faults.unreachable.load(Ordering::SeqCst) {
            return Err(Faults::refused());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn pair() -> (MemoryAdapter, MemoryPeer) {
        MemoryAdapter::pair("radio-test", Network::RadioMesh, 64)
    }

    #[tokio::test]
    async fn conformance() {
        let (adapter, _peer) = pair();
        testing::assert_pre_start_conformance(&adapter).await;
        adapter.start().await.unwrap();
        assert!(adapter.is_connected());
        testing::assert_stop_conformance(&adapter).await;
        testing::assert_read_after_stop_ends(&adapter).await;
    }

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (adapter, mut peer) = pair();
        adapter.start().await.unwrap();

        adapter.write_frame(&[1, 2, 3]).await.unwrap();
        assert_eq!(peer.recv().await, Some(vec![1, 2, 3]));

        peer.send(vec![9; 20]).await.unwrap();
        assert_eq!(adapter.read_frame().await.unwrap(), Some(vec![9; 20]));
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_counted() {
        let (adapter, mut peer) = pair();
        adapter.start().await.unwrap();
        peer.fail_next_writes(2);

        for _ in 0..2 {
            let err = adapter.write_frame(&[1]).await.unwrap_err();
            assert!(err.is_transient());
        }
        adapter.write_frame(&[2]).await.unwrap();
        assert_eq!(peer.try_recv(), Some(vec![2]));
    }

    #[tokio::test]
    async fn unreachable_daemon_fails_probe_and_writes() {
        let (adapter, peer) = pair();
        adapter.start().await.unwrap();
        peer.set_reachable(false);
        assert!(adapter.probe().await.is_err());
        assert!(matches!(
            adapter.write_frame(&[1]).await,
            Err(AdapterError::Io(_))
        ));
        peer.set_reachable(true);
        adapter.probe().await.unwrap();
    }

    #[tokio::test]
    async fn oversize_frame_rejected() {
        let (adapter, _peer) = pair();
        adapter.start().await.unwrap();
        assert!(matches!(
            adapter.write_frame(&[0; 65]).await,
            Err(AdapterError::TransmitFailed(_))
        ));
    }

    #[tokio::test]
    async fn dropped_peer_ends_reads() {
        let (adapter, peer) = pair();
        adapter.start().await.unwrap();
        drop(peer);
        assert_eq!(adapter.read_frame().await.unwrap(), None);
    }
}
