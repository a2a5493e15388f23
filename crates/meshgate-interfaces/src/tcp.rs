//! TCP adapter with selectable stream framing and automatic reconnection.

use std::sync::Arc;
use std::time::Duration;

use meshgate_core::Network;
use meshgate_core::constants::{DEFAULT_CRYPTO_FRAME_SIZE, DEFAULT_RADIO_FRAME_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::AdapterError;
use crate::framing::StreamFraming;
use crate::shutdown::ShutdownToken;
use crate::traits::Adapter;

/// Delay between reconnection attempts.
pub const RECONNECT_WAIT: Duration = Duration::from_secs(5);

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Size of the read buffer for `TcpStream::read`.
pub const TCP_RECV_BUFFER: usize = 4096;

const CHANNEL_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct TcpAdapterConfig {
    pub name: String,
    pub network: Network,
    /// `host:port` of the daemon.
    pub target: String,
    pub framing: StreamFraming,
    pub mtu: usize,
    pub connect_timeout: Duration,
    pub reconnect_wait: Duration,
    /// `None` keeps reconnecting forever.
    pub max_reconnect_tries: Option<u32>,
}

impl TcpAdapterConfig {
    /// Defaults follow the daemon on each side: HDLC towards the crypto mesh,
    /// length-prefixed stream framing towards radio firmware.
    pub fn new(name: impl Into<String>, network: Network, target: impl Into<String>) -> Self {
        let (framing, mtu) = match network {
            Network::CryptoMesh => (StreamFraming::Hdlc, DEFAULT_CRYPTO_FRAME_SIZE),
            Network::RadioMesh => (StreamFraming::Stream, DEFAULT_RADIO_FRAME_SIZE),
        };
        Self {
            name: name.into(),
            network,
            target: target.into(),
            framing,
            mtu,
            connect_timeout: CONNECT_TIMEOUT,
            reconnect_wait: RECONNECT_WAIT,
            max_reconnect_tries: None,
        }
    }
}

type Inbound = Result<Vec<u8>, AdapterError>;

struct TcpInner {
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Frames and connection errors from the background loop.
    rx_sender: mpsc::Sender<Inbound>,
    shutdown: ShutdownToken,
}

impl TcpInner {
    /// Connection errors are advisory; drop them when nobody is reading.
    fn report(&self, err: AdapterError) {
        let _ = self.rx_sender.try_send(Err(err));
    }
}

pub struct TcpAdapter {
    config: TcpAdapterConfig,
    inner: Arc<TcpInner>,
    rx_receiver: Mutex<mpsc::Receiver<Inbound>>,
}

impl TcpAdapter {
    pub fn new(config: TcpAdapterConfig) -> Result<Self, AdapterError> {
        if config.target.trim().is_empty() {
            return Err(AdapterError::Configuration(format!(
                "{}: tcp adapter needs a target address",
                config.name
            )));
        }
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        Ok(Self {
            config,
            inner: Arc::new(TcpInner {
                writer: Mutex::new(None),
                rx_sender: tx,
                shutdown: ShutdownToken::new(),
            }),
            rx_receiver: Mutex::new(rx),
        })
    }

    pub fn config(&self) -> &TcpAdapterConfig {
        &self.config
    }

    async fn connect(target: &str, timeout: Duration) -> Result<TcpStream, AdapterError> {
        match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                Ok(stream)
            }
            Ok(Err(e)) => Err(AdapterError::Io(e)),
            Err(_) => Err(AdapterError::Timeout(timeout)),
        }
    }

    /// Connect, read until the connection drops, wait, repeat.
    async fn connect_and_run(
        inner: Arc<TcpInner>,
        config: TcpAdapterConfig,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let name = config.name.as_str();
        let mut failures: u32 = 0;

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let stream = match Self::connect(&config.target, config.connect_timeout).await {
                Ok(stream) => {
                    info!(adapter = name, target = %config.target, "connected to daemon");
                    failures = 0;
                    stream
                }
                Err(e) => {
                    debug!(adapter = name, error = %e, "connection attempt failed");
                    inner.report(e);
                    failures += 1;
                    if let Some(max) = config.max_reconnect_tries
                        && failures > max
                    {
                        warn!(adapter = name, max, "giving up after repeated connection failures");
                        break;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(config.reconnect_wait) => {}
                        _ = stop_rx.changed() => break,
                    }
                    continue;
                }
            };

            let (reader, writer) = stream.into_split();
            *inner.writer.lock().await = Some(writer);
            inner.shutdown.set_connected(true);

            Self::read_loop(&inner, reader, config.framing, stop_rx.clone(), name).await;

            *inner.writer.lock().await = None;
            inner.shutdown.set_connected(false);

            if *stop_rx.borrow() {
                break;
            }
            info!(
                adapter = name,
                wait_secs = config.reconnect_wait.as_secs(),
                "disconnected from daemon, will reconnect"
            );
            tokio::select! {
                _ = tokio::time::sleep(config.reconnect_wait) => {}
                _ = stop_rx.changed() => break,
            }
        }
    }

    async fn read_loop(
        inner: &TcpInner,
        mut reader: OwnedReadHalf,
        framing: StreamFraming,
        mut stop_rx: watch::Receiver<bool>,
        name: &str,
    ) {
        let mut acc = framing.accumulator();
        let mut buf = vec![0u8; TCP_RECV_BUFFER];

        loop {
            let n = tokio::select! {
                result = reader.read(&mut buf) => match result {
                    Ok(0) => {
                        debug!(adapter = name, "daemon closed the connection");
                        inner.report(AdapterError::ReceiveFailed("connection closed by daemon".into()));
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        debug!(adapter = name, error = %e, "read error");
                        inner.report(AdapterError::Io(e));
                        break;
                    }
                },
                _ = stop_rx.changed() => break,
            };

            for frame in acc.feed(&buf[..n]) {
                if inner.rx_sender.send(Ok(frame)).await.is_err() {
                    return;
                }
            }
        }
    }
}

impl Adapter for TcpAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn network(&self) -> Network {
        self.config.network
    }

    fn mtu(&self) -> usize {
        self.config.mtu
    }

    fn is_connected(&self) -> bool {
        self.inner.shutdown.is_connected()
    }

    async fn start(&self) -> Result<(), AdapterError> {
        if self.inner.shutdown.is_stopped() {
            return Err(AdapterError::Stopped);
        }
        let inner = Arc::clone(&self.inner);
        let config = self.config.clone();
        let stop_rx = self.inner.shutdown.subscribe();
        let handle = tokio::spawn(Self::connect_and_run(inner, config, stop_rx));
        self.inner.shutdown.add_task(handle).await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AdapterError> {
        self.inner.shutdown.signal_stop();
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.inner.shutdown.join_all().await;
        Ok(())
    }

    async fn write_frame(&self, frame: &[u8]) -> Result<(), AdapterError> {
        if self.inner.shutdown.is_stopped() {
            return Err(AdapterError::Stopped);
        }
        if !self.is_connected() {
            return Err(AdapterError::NotConnected);
        }
        if frame.len() > self.config.mtu {
            return Err(AdapterError::TransmitFailed(format!(
                "frame of {} bytes exceeds mtu {}",
                frame.len(),
                self.config.mtu
            )));
        }

        let framed = self.config.framing.frame(frame)?;
        let mut guard = self.inner.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => writer.write_all(&framed).await.map_err(AdapterError::Io),
            None => Err(AdapterError::NotConnected),
        }
    }

    async fn read_frame(&self) -> Result<Option<Vec<u8>>, AdapterError> {
        let mut rx = self.rx_receiver.lock().await;
        tokio::select! {
            biased;
            _ = self.inner.shutdown.stopped() => Ok(None),
            item = rx.recv() => item.transpose(),
        }
    }

    async fn probe(&self) -> Result<(), AdapterError> {
        if self.inner.shutdown.is_stopped() {
            return Err(AdapterError::Stopped);
        }
        if self.is_connected() {
            return Ok(());
        }
        // The reconnect loop owns the real connection; this one only proves
        // the daemon is listening.
        Self::connect(&self.config.target, self.config.connect_timeout)
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use meshgate_core::framing::hdlc::hdlc_frame;
    use meshgate_core::framing::stream::stream_frame;
    use tokio::net::TcpListener;

    fn config(network: Network, target: String) -> TcpAdapterConfig {
        let mut config = TcpAdapterConfig::new("tcp-test", network, target);
        config.reconnect_wait = Duration::from_millis(100);
        config
    }

    async fn wait_connected(adapter: &TcpAdapter, connected: bool) {
        for _ in 0..100 {
            if adapter.is_connected() == connected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("adapter never reached connected={connected}");
    }

    #[test]
    fn test_empty_target_rejected() {
        let result = TcpAdapter::new(TcpAdapterConfig::new("x", Network::RadioMesh, " "));
        assert!(matches!(result, Err(AdapterError::Configuration(_))));
    }

    #[test]
    fn test_framing_defaults_per_network() {
        let crypto = TcpAdapterConfig::new("c", Network::CryptoMesh, "127.0.0.1:1");
        let radio = TcpAdapterConfig::new("r", Network::RadioMesh, "127.0.0.1:1");
        assert_eq!(crypto.framing, StreamFraming::Hdlc);
        assert_eq!(radio.framing, StreamFraming::Stream);
        assert_eq!(radio.mtu, 220);
    }

    #[tokio::test]
    async fn hdlc_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let adapter = TcpAdapter::new(config(Network::CryptoMesh, addr.to_string())).unwrap();
        testing::assert_pre_start_conformance(&adapter).await;
        adapter.start().await.unwrap();

        let (mut peer, _) = listener.accept().await.unwrap();
        wait_connected(&adapter, true).await;

        let payload = vec![0x42; 30];
        adapter.write_frame(&payload).await.unwrap();
        let mut buf = vec![0u8; 256];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &hdlc_frame(&payload)[..]);

        let inbound = vec![0x55; 25];
        peer.write_all(&hdlc_frame(&inbound)).await.unwrap();
        assert_eq!(adapter.read_frame().await.unwrap(), Some(inbound));

        testing::assert_stop_conformance(&adapter).await;
        testing::assert_read_after_stop_ends(&adapter).await;
    }

    #[tokio::test]
    async fn stream_framing_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let adapter = TcpAdapter::new(config(Network::RadioMesh, addr.to_string())).unwrap();
        adapter.start().await.unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();
        wait_connected(&adapter, true).await;

        let payload = vec![0x11; 40];
        adapter.write_frame(&payload).await.unwrap();
        let mut buf = vec![0u8; 256];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &stream_frame(&payload).unwrap()[..]);

        let inbound = vec![0x22; 50];
        peer.write_all(&stream_frame(&inbound).unwrap()).await.unwrap();
        assert_eq!(adapter.read_frame().await.unwrap(), Some(inbound));

        adapter.stop().await.unwrap();
    }

    #[tokio::test]
    async fn write_when_disconnected() {
        let adapter =
            TcpAdapter::new(config(Network::RadioMesh, "127.0.0.1:1".into())).unwrap();
        assert!(matches!(
            adapter.write_frame(&[0x01; 20]).await,
            Err(AdapterError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_is_reported_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let adapter = TcpAdapter::new(config(Network::CryptoMesh, addr.to_string())).unwrap();
        adapter.start().await.unwrap();

        let (first, _) = listener.accept().await.unwrap();
        wait_connected(&adapter, true).await;
        drop(first);

        let err = adapter.read_frame().await.unwrap_err();
        assert!(err.is_transient());

        let (_second, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("timed out waiting for reconnect")
            .unwrap();
        wait_connected(&adapter, true).await;
        adapter.stop().await.unwrap();
    }

    #[tokio::test]
    async fn probe_reflects_daemon_reachability() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let adapter = TcpAdapter::new(config(Network::RadioMesh, addr.to_string())).unwrap();
        adapter.probe().await.unwrap();

        drop(listener);
        assert!(adapter.probe().await.is_err());
    }
}
