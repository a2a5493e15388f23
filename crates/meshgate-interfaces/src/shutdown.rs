//! Cancellation shared between an adapter and its background tasks.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Stop signal, connection flag and background task handles for one adapter.
///
/// Background loops hold a receiver from [`subscribe`](Self::subscribe) and
/// exit when it flips to `true`; `stop()` implementations call
/// [`signal_stop`](Self::signal_stop) and then [`join_all`](Self::join_all).
pub struct ShutdownToken {
    stop_tx: watch::Sender<bool>,
    connected: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx,
            connected: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Resolves once the stop signal has been sent.
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub async fn add_task(&self, handle: JoinHandle<()>) {
        self.tasks.lock().await.push(handle);
    }

    /// Idempotent.
    pub fn signal_stop(&self) {
        self.stop_tx.send_replace(true);
        self.set_connected(false);
    }

    /// Await every registered task. Panicked tasks are ignored.
    pub async fn join_all(&self) {
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}
