//! The adapter trait.

use std::future::Future;

use meshgate_core::Network;

use crate::error::AdapterError;

/// Frame size assumed when an adapter does not declare one.
pub const DEFAULT_MTU: usize = 500;

/// Async trait implemented by every daemon adapter.
///
/// All methods take `&self` so one adapter can be shared between a reader
/// worker and a writer worker.
pub trait Adapter: Send + Sync {
    /// Human-readable name, e.g. `"radio-mesh[127.0.0.1:4403]"`.
    fn name(&self) -> &str;

    /// Which mesh this adapter talks to.
    fn network(&self) -> Network;

    /// Largest gateway frame the daemon accepts.
    fn mtu(&self) -> usize {
        DEFAULT_MTU
    }

    fn is_connected(&self) -> bool;

    /// Connect and spawn any background read loops.
    fn start(&self) -> impl Future<Output = Result<(), AdapterError>> + Send;

    /// Stop background work. Idempotent.
    fn stop(&self) -> impl Future<Output = Result<(), AdapterError>> + Send;

    /// Write one complete gateway frame.
    fn write_frame(&self, frame: &[u8]) -> impl Future<Output = Result<(), AdapterError>> + Send;

    /// Next complete inbound frame. `Ok(None)` means the adapter has stopped
    /// for good; errors are per-read and the caller may keep reading.
    fn read_frame(&self) -> impl Future<Output = Result<Option<Vec<u8>>, AdapterError>> + Send;

    /// Lightweight reachability check against the daemon.
    fn probe(&self) -> impl Future<Output = Result<(), AdapterError>> + Send;
}
