//! The gateway runtime.
//!
//! One reader worker per adapter feeds raw frames into a shared event
//! channel. A single router loop owns the [`MessageRouter`] and is the only
//! writer of translator, tracker and codec state; it turns router actions into
//! jobs for one outbound worker per network, events for subscribers, and
//! mapping snapshots for the persistence writer.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use meshgate_core::constants::HEADER_MAXSIZE;
use meshgate_core::{MessageId, Network};
use meshgate_interfaces::AdapterError;
use meshgate_transport::{
    AddressMapping, DeliveryOutcome, FailureReason, GatewayEvent, LocalIdentity, MessageRouter,
    RouterAction, RouterConfig, SendOutcome, SubmitOutcome, Ticket,
};

use crate::adapter_enum::AnyAdapter;
use crate::api::{Command, GatewayHandle, SourceFilter, Subscription};
use crate::config::{GatewayConfig, parse_path};
use crate::error::NodeError;
use crate::storage::Storage;

const COMMAND_DEPTH: usize = 256;
const EVENT_DEPTH: usize = 1024;
/// Outbound slots beyond the router's message limit, for acks and announces.
const CONTROL_HEADROOM: usize = 256;

/// Router clock. Follows tokio's clock so paused-time tests stay deterministic.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Shrink the configured frame size for the adapter's network to what the
/// adapter can carry in one write.
fn fit_frame_size(config: &mut RouterConfig, adapter: &AnyAdapter) -> Result<(), NodeError> {
    let network = adapter.network();
    let mtu = adapter.mtu();
    if mtu <= HEADER_MAXSIZE {
        return Err(NodeError::Config(format!(
            "adapter {} has mtu {mtu}, too small for a frame header",
            adapter.name()
        )));
    }
    let size = match network {
        Network::CryptoMesh => &mut config.crypto_frame_size,
        Network::RadioMesh => &mut config.radio_frame_size,
    };
    if *size > mtu {
        tracing::warn!(
            %network,
            adapter = adapter.name(),
            configured = *size,
            mtu,
            "frame size exceeds adapter mtu, using the mtu"
        );
        *size = mtu;
    }
    Ok(())
}

/// Inputs from adapter workers to the router loop.
#[derive(Debug)]
enum RuntimeEvent {
    Frame {
        network: Network,
        raw: Vec<u8>,
    },
    ReadFailed {
        network: Network,
        error: AdapterError,
    },
    AdapterClosed {
        network: Network,
    },
    WriteFailed {
        network: Network,
    },
    SendResult {
        network: Network,
        ticket: Ticket,
        outcome: SendOutcome,
    },
    ProbeResult {
        network: Network,
        ok: bool,
    },
}

/// Work for an outbound worker.
#[derive(Debug)]
enum OutboundJob {
    Message {
        ticket: Ticket,
        frames: Vec<Vec<u8>>,
    },
    Control(Vec<u8>),
    Probe,
}

struct Subscriber {
    filter: SourceFilter,
    events: mpsc::Sender<GatewayEvent>,
}

/// A gateway bridging one crypto-mesh adapter and one radio-mesh adapter.
pub struct Gateway {
    config: GatewayConfig,
    router_config: RouterConfig,
    router: MessageRouter,
    crypto: Arc<AnyAdapter>,
    radio: Arc<AnyAdapter>,
    storage: Option<Arc<Storage>>,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
    events_tx: mpsc::Sender<RuntimeEvent>,
    events_rx: mpsc::Receiver<RuntimeEvent>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    outbound: HashMap<Network, mpsc::Sender<OutboundJob>>,
    persist_tx: Option<watch::Sender<Vec<AddressMapping>>>,
    persist_worker: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    waiters: HashMap<MessageId, oneshot::Sender<DeliveryOutcome>>,
    subscribers: Vec<Subscriber>,
    running: bool,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway over two already-built adapters.
    pub fn new(
        config: GatewayConfig,
        crypto: impl Into<AnyAdapter>,
        radio: impl Into<AnyAdapter>,
    ) -> Result<Self, NodeError> {
        let crypto = crypto.into();
        let radio = radio.into();
        for (adapter, expected) in [(&crypto, Network::CryptoMesh), (&radio, Network::RadioMesh)] {
            if adapter.network() != expected {
                return Err(NodeError::Config(format!(
                    "adapter {} talks to {} but was given as the {expected} adapter",
                    adapter.name(),
                    adapter.network()
                )));
            }
        }

        let mut router_config = config.to_router_config()?;
        for adapter in [&crypto, &radio] {
            fit_frame_size(&mut router_config, adapter)?;
        }
        let storage = if config.gateway.enable_storage {
            let storage = match &config.gateway.storage_path {
                Some(path) => Storage::new(parse_path(path))?,
                None => Storage::default_path()?,
            };
            tracing::debug!(path = %storage.base_dir().display(), "storage ready");
            Some(Arc::new(storage))
        } else {
            None
        };

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_DEPTH);
        let (events_tx, events_rx) = mpsc::channel(EVENT_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            router: MessageRouter::new(router_config.clone(), Vec::new()),
            router_config,
            config,
            crypto: Arc::new(crypto),
            radio: Arc::new(radio),
            storage,
            commands_tx,
            commands_rx,
            events_tx,
            events_rx,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            outbound: HashMap::new(),
            persist_tx: None,
            persist_worker: None,
            workers: Vec::new(),
            waiters: HashMap::new(),
            subscribers: Vec::new(),
            running: false,
        })
    }

    /// Create a gateway with the adapters described in `[adapters]`.
    pub fn from_config(config: GatewayConfig) -> Result<Self, NodeError> {
        let build = |network: Network| {
            let entry = config.adapters.entry(network).ok_or_else(|| {
                NodeError::Config(format!("missing [adapters.{network}] section"))
            })?;
            AnyAdapter::from_entry(network, entry)
        };
        let crypto = build(Network::CryptoMesh)?;
        let radio = build(Network::RadioMesh)?;
        Self::new(config, crypto, radio)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The gateway's own address pair.
    pub fn local_identity(&self) -> LocalIdentity {
        self.router_config.local
    }

    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle::new(self.commands_tx.clone(), Arc::clone(&self.shutdown_tx))
    }

    fn adapter(&self, network: Network) -> &Arc<AnyAdapter> {
        match network {
            Network::CryptoMesh => &self.crypto,
            Network::RadioMesh => &self.radio,
        }
    }

    /// Load persisted mappings, start both adapters and spawn the workers.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.running {
            return Err(NodeError::AlreadyRunning);
        }

        let mappings = self.load_mappings().await?;
        if !mappings.is_empty() {
            tracing::info!(count = mappings.len(), "loaded confirmed address mappings");
        }
        self.router = MessageRouter::new(self.router_config.clone(), mappings);

        for network in Network::ALL {
            let adapter = Arc::clone(self.adapter(network));
            if let Err(e) = adapter.start().await {
                tracing::error!(adapter = %adapter.name(), "failed to start adapter: {e}");
                return Err(NodeError::Adapter(e));
            }
            tracing::info!(adapter = %adapter.name(), %network, "adapter started");
        }

        let local = self.router_config.local;
        tracing::info!(
            crypto = %local.crypto,
            radio = %local.radio,
            name = %self.router_config.display_name,
            "gateway started"
        );

        self.spawn_workers();
        self.running = true;
        Ok(())
    }

    async fn load_mappings(&self) -> Result<Vec<AddressMapping>, NodeError> {
        let Some(storage) = &self.storage else {
            return Ok(Vec::new());
        };
        match storage.load_mappings().await {
            Ok(mappings) => Ok(mappings),
            Err(crate::storage::StorageError::Deserialize(e)) => {
                tracing::warn!(
                    path = %storage.mappings_path().display(),
                    "ignoring unreadable mapping file, it will be rewritten: {e}"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn spawn_workers(&mut self) {
        let io_timeout = self.config.io_timeout();
        let depth = self.router_config.max_pending_messages.max(1) + CONTROL_HEADROOM;

        for network in Network::ALL {
            let adapter = Arc::clone(self.adapter(network));

            let reader = tokio::spawn(reader_worker(
                Arc::clone(&adapter),
                self.events_tx.clone(),
                self.shutdown_rx.clone(),
            ));
            self.workers.push(reader);

            let (jobs_tx, jobs_rx) = mpsc::channel(depth);
            let writer = tokio::spawn(outbound_worker(
                adapter,
                jobs_rx,
                self.events_tx.clone(),
                io_timeout,
                self.shutdown_rx.clone(),
            ));
            self.outbound.insert(network, jobs_tx);
            self.workers.push(writer);
        }

        if let Some(storage) = &self.storage {
            let (tx, rx) = watch::channel(Vec::new());
            self.persist_worker = Some(tokio::spawn(persistence_writer(Arc::clone(storage), rx)));
            self.persist_tx = Some(tx);
        }
    }

    /// Run the router loop until shutdown is signalled.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        if !self.running {
            return Err(NodeError::NotStarted);
        }

        let mut tick = tokio::time::interval(self.config.tick_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("entering router loop");

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    tracing::info!("shutdown signal received");
                    break;
                }

                Some(command) = self.commands_rx.recv() => {
                    self.handle_command(command);
                }

                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }

                _ = tick.tick() => {
                    let actions = self.router.tick(now());
                    self.dispatch(actions);
                }
            }
        }
        Ok(())
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit {
                request,
                outcome,
                reply,
            } => {
                let destination = request.destination;
                match self.router.submit(request) {
                    Ok(SubmitOutcome::Accepted(id)) => {
                        tracing::debug!(message_id = %id, %destination, "message submitted");
                        self.waiters.insert(id, outcome);
                        let _ = reply.send(Ok(id));
                        let actions = self.router.pump(now());
                        self.dispatch(actions);
                    }
                    Ok(SubmitOutcome::Duplicate(id)) => {
                        tracing::debug!(message_id = %id, "duplicate submission ignored");
                        let _ = outcome.send(DeliveryOutcome::Duplicate);
                        let _ = reply.send(Ok(id));
                    }
                    Err(e) => {
                        tracing::debug!(%destination, "submission rejected: {e}");
                        let _ = reply.send(Err(e.into()));
                    }
                }
            }
            Command::Subscribe { filter, reply } => {
                let (subscription, events) = Subscription::new(filter);
                if reply.send(subscription).is_ok() {
                    self.subscribers.push(Subscriber { filter, events });
                }
            }
            Command::ListNodes { reply } => {
                let _ = reply.send(self.router.nodes());
            }
            Command::Health { network, reply } => {
                let _ = reply.send(self.router.health(network));
            }
            Command::Anomalies { reply } => {
                let _ = reply.send(self.router.anomalies());
            }
            Command::DeliveryState { message_id, reply } => {
                let state = self
                    .router
                    .outbound_state(message_id)
                    .map(|s| s.delivery_state());
                let _ = reply.send(state);
            }
        }
    }

    fn handle_event(&mut self, event: RuntimeEvent) {
        let now = now();
        let actions = match event {
            RuntimeEvent::Frame { network, raw } => self.router.handle_frame(network, &raw, now),
            RuntimeEvent::ReadFailed { network, error } => {
                tracing::warn!(%network, "adapter read failed: {error}");
                if error.is_transient() {
                    self.router.handle_io_failure(network, now);
                }
                Vec::new()
            }
            RuntimeEvent::AdapterClosed { network } => {
                tracing::warn!(%network, "adapter stopped delivering frames");
                Vec::new()
            }
            RuntimeEvent::WriteFailed { network } => {
                self.router.handle_io_failure(network, now);
                Vec::new()
            }
            RuntimeEvent::SendResult {
                network,
                ticket,
                outcome,
            } => self.router.handle_send_result(network, ticket, outcome, now),
            RuntimeEvent::ProbeResult { network, ok } => {
                self.router.handle_probe_result(network, ok, now)
            }
        };
        self.dispatch(actions);
    }

    /// Carry out router actions. Actions the runtime cannot hand off are fed
    /// back to the router as failures, which may produce more actions.
    fn dispatch(&mut self, actions: Vec<RouterAction>) {
        let mut pending: VecDeque<RouterAction> = actions.into();
        while let Some(action) = pending.pop_front() {
            match action {
                RouterAction::Transmit {
                    network,
                    ticket,
                    message_id,
                    frames,
                } => {
                    tracing::trace!(%network, message_id = %message_id, %ticket, frames = frames.len(), "transmit");
                    let job = OutboundJob::Message { ticket, frames };
                    if let Err(e) = self.enqueue(network, job) {
                        let outcome = SendOutcome::Failed {
                            detail: format!("outbound queue unavailable: {e}"),
                        };
                        pending.extend(self.router.handle_send_result(
                            network,
                            ticket,
                            outcome,
                            now(),
                        ));
                    }
                }
                RouterAction::TransmitControl { network, frame } => {
                    if let Err(e) = self.enqueue(network, OutboundJob::Control(frame)) {
                        tracing::debug!(%network, "dropping control frame: {e}");
                    }
                }
                RouterAction::Probe { network } => {
                    if let Err(e) = self.enqueue(network, OutboundJob::Probe) {
                        tracing::debug!(%network, "cannot schedule probe: {e}");
                        pending.extend(self.router.handle_probe_result(network, false, now()));
                    }
                }
                RouterAction::Publish(event) => self.publish(event),
                RouterAction::Report {
                    message_id,
                    outcome,
                } => self.report(message_id, outcome),
                RouterAction::PersistMappings(snapshot) => match &self.persist_tx {
                    Some(tx) => {
                        tracing::debug!(count = snapshot.len(), "queueing mapping snapshot");
                        tx.send_replace(snapshot);
                    }
                    None => tracing::trace!("storage disabled, mapping snapshot discarded"),
                },
            }
        }
    }

    fn enqueue(&self, network: Network, job: OutboundJob) -> Result<(), String> {
        let Some(tx) = self.outbound.get(&network) else {
            return Err("no outbound worker".into());
        };
        tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => "queue full".to_string(),
            TrySendError::Closed(_) => "worker stopped".to_string(),
        })
    }

    fn publish(&mut self, event: GatewayEvent) {
        self.subscribers.retain(|sub| {
            if !sub.filter.matches(&event) {
                return true;
            }
            match sub.events.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(source = %event.source(), "subscriber lagging, event dropped");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
    }

    fn report(&mut self, message_id: MessageId, outcome: DeliveryOutcome) {
        match &outcome {
            DeliveryOutcome::Failed(reason) => {
                tracing::debug!(message_id = %message_id, "delivery failed: {reason}");
            }
            _ => tracing::debug!(message_id = %message_id, ?outcome, "delivery finished"),
        }
        if let Some(waiter) = self.waiters.remove(&message_id) {
            let _ = waiter.send(outcome);
        }
    }

    /// Stop workers and adapters, fail whatever is still queued, and flush
    /// the mapping table one last time.
    pub async fn shutdown(mut self) {
        tracing::info!("shutting down gateway");
        self.shutdown_tx.send_replace(true);
        self.events_rx.close();

        self.commands_rx.close();
        while let Ok(command) = self.commands_rx.try_recv() {
            if let Command::Submit { reply, .. } = command {
                let _ = reply.send(Err(crate::error::GatewayError::Stopped));
            }
        }

        let actions = self.router.drain();
        self.dispatch(actions);
        for (_, waiter) in self.waiters.drain() {
            let _ = waiter.send(DeliveryOutcome::Failed(FailureReason::Shutdown));
        }

        if let Some(tx) = self.persist_tx.take() {
            tx.send_replace(self.router.translator().confirmed_mappings());
        }
        self.outbound.clear();
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
        if let Some(handle) = self.persist_worker.take() {
            let _ = handle.await;
        }

        for network in Network::ALL {
            let adapter = self.adapter(network);
            if let Err(e) = adapter.stop().await {
                tracing::warn!(adapter = %adapter.name(), "error stopping adapter: {e}");
            }
        }

        self.subscribers.clear();
        self.running = false;
        tracing::info!("gateway shutdown complete");
    }
}

/// Forward every inbound frame from one adapter to the router loop.
async fn reader_worker(
    adapter: Arc<AnyAdapter>,
    events: mpsc::Sender<RuntimeEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let network = adapter.network();
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            result = adapter.read_frame() => match result {
                Ok(Some(raw)) => RuntimeEvent::Frame { network, raw },
                Ok(None) => {
                    let _ = events.send(RuntimeEvent::AdapterClosed { network }).await;
                    break;
                }
                Err(AdapterError::Stopped) => break,
                Err(error) => RuntimeEvent::ReadFailed { network, error },
            },
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
    tracing::debug!(%network, "reader worker stopped");
}

/// Write jobs for one network in order. Every write is bounded by `io_timeout`.
async fn outbound_worker(
    adapter: Arc<AnyAdapter>,
    mut jobs: mpsc::Receiver<OutboundJob>,
    events: mpsc::Sender<RuntimeEvent>,
    io_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let network = adapter.network();
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let event = match job {
            OutboundJob::Message { ticket, frames } => {
                let outcome = match write_all(&adapter, &frames, io_timeout).await {
                    Ok(()) => SendOutcome::Written,
                    Err(e) => SendOutcome::Failed {
                        detail: e.to_string(),
                    },
                };
                Some(RuntimeEvent::SendResult {
                    network,
                    ticket,
                    outcome,
                })
            }
            OutboundJob::Control(frame) => match write_one(&adapter, &frame, io_timeout).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::debug!(%network, "control frame write failed: {e}");
                    e.is_transient().then_some(RuntimeEvent::WriteFailed { network })
                }
            },
            OutboundJob::Probe => {
                let ok = probe_adapter(&adapter, io_timeout).await;
                Some(RuntimeEvent::ProbeResult { network, ok })
            }
        };

        if let Some(event) = event
            && events.send(event).await.is_err()
        {
            break;
        }
    }
    tracing::debug!(%network, "outbound worker stopped");
}

async fn write_one(
    adapter: &AnyAdapter,
    frame: &[u8],
    io_timeout: Duration,
) -> Result<(), AdapterError> {
    tokio::time::timeout(io_timeout, adapter.write_frame(frame))
        .await
        .map_err(|_| AdapterError::Timeout(io_timeout))?
}

/// Write every frame of one message; stop at the first failure.
async fn write_all(
    adapter: &AnyAdapter,
    frames: &[Vec<u8>],
    io_timeout: Duration,
) -> Result<(), AdapterError> {
    for frame in frames {
        write_one(adapter, frame, io_timeout).await?;
    }
    Ok(())
}

async fn probe_adapter(adapter: &AnyAdapter, io_timeout: Duration) -> bool {
    match tokio::time::timeout(io_timeout, adapter.probe()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(adapter = %adapter.name(), "probe failed: {e}");
            false
        }
        Err(_) => {
            tracing::debug!(adapter = %adapter.name(), "probe timed out");
            false
        }
    }
}

/// Single writer for the mapping file. Snapshots that arrive while a write
/// is in progress collapse into the latest one.
async fn persistence_writer(
    storage: Arc<Storage>,
    mut snapshots: watch::Receiver<Vec<AddressMapping>>,
) {
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        match storage.save_mappings(&snapshot).await {
            Ok(()) => tracing::debug!(count = snapshot.len(), "mapping table written"),
            Err(e) => tracing::warn!("failed to persist mapping table: {e}"),
        }
    }
}
