//! Handle-side API used by local clients.
//!
//! Every call is a message to the gateway's router loop; nothing here touches
//! router state directly. Query results are snapshots.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use meshgate_core::{Address, MessageId, Network};
use meshgate_transport::{
    CircuitState, DeliveryOutcome, DeliveryState, FailureReason, GatewayEvent, MappingAnomaly,
    MeshNode, SubmitRequest,
};

use crate::error::GatewayError;

/// Buffered events per subscriber before new ones are dropped.
pub const SUBSCRIPTION_DEPTH: usize = 1024;

/// Which inbound traffic a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
    Any,
    /// Traffic that arrived from one mesh.
    Network(Network),
    /// Traffic from one sender.
    Address(Address),
}

impl SourceFilter {
    pub fn matches(&self, event: &GatewayEvent) -> bool {
        match self {
            SourceFilter::Any => true,
            SourceFilter::Network(network) => match event {
                GatewayEvent::Message(msg) => msg.origin == *network,
                GatewayEvent::Expired { source, .. } => source.network() == *network,
            },
            SourceFilter::Address(address) => event.source() == address,
        }
    }
}

/// Requests carried from a [`GatewayHandle`] to the router loop.
pub(crate) enum Command {
    Submit {
        request: SubmitRequest,
        outcome: oneshot::Sender<DeliveryOutcome>,
        reply: oneshot::Sender<Result<MessageId, GatewayError>>,
    },
    Subscribe {
        filter: SourceFilter,
        reply: oneshot::Sender<Subscription>,
    },
    ListNodes {
        reply: oneshot::Sender<Vec<MeshNode>>,
    },
    Health {
        network: Network,
        reply: oneshot::Sender<CircuitState>,
    },
    Anomalies {
        reply: oneshot::Sender<Vec<MappingAnomaly>>,
    },
    DeliveryState {
        message_id: MessageId,
        reply: oneshot::Sender<Option<DeliveryState>>,
    },
}

/// Pending result of one submission.
#[derive(Debug)]
pub struct DeliveryReceipt {
    pub message_id: MessageId,
    outcome: oneshot::Receiver<DeliveryOutcome>,
}

impl DeliveryReceipt {
    /// Wait for the terminal outcome. A gateway that stops first reports
    /// [`FailureReason::Shutdown`].
    pub async fn wait(self) -> DeliveryOutcome {
        self.outcome
            .await
            .unwrap_or(DeliveryOutcome::Failed(FailureReason::Shutdown))
    }
}

/// Ordered stream of inbound events matching a [`SourceFilter`].
#[derive(Debug)]
pub struct Subscription {
    filter: SourceFilter,
    events: mpsc::Receiver<GatewayEvent>,
}

impl Subscription {
    pub(crate) fn new(filter: SourceFilter) -> (Self, mpsc::Sender<GatewayEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_DEPTH);
        (Self { filter, events: rx }, tx)
    }

    pub fn filter(&self) -> SourceFilter {
        self.filter
    }

    /// Next event, or `None` once the gateway has shut down.
    pub async fn recv(&mut self) -> Option<GatewayEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<GatewayEvent> {
        self.events.try_recv().ok()
    }
}

/// Cloneable client handle to a running gateway.
#[derive(Clone)]
pub struct GatewayHandle {
    commands: mpsc::Sender<Command>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl GatewayHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>, shutdown: Arc<watch::Sender<bool>>) -> Self {
        Self { commands, shutdown }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| GatewayError::Stopped)?;
        rx.await.map_err(|_| GatewayError::Stopped)
    }

    /// Queue `payload` for `destination` with a content-derived id.
    ///
    /// Structural problems (empty or oversized payload, the gateway's own
    /// address, a full queue) are returned here; everything else resolves
    /// through the receipt.
    pub async fn submit(
        &self,
        destination: Address,
        payload: impl Into<Vec<u8>>,
    ) -> Result<DeliveryReceipt, GatewayError> {
        self.submit_request(SubmitRequest::new(destination, payload.into()))
            .await
    }

    /// Like [`submit`](Self::submit) with a caller-chosen id, for sending
    /// identical content more than once.
    pub async fn submit_with_id(
        &self,
        destination: Address,
        payload: impl Into<Vec<u8>>,
        message_id: MessageId,
    ) -> Result<DeliveryReceipt, GatewayError> {
        self.submit_request(SubmitRequest::new(destination, payload.into()).with_id(message_id))
            .await
    }

    async fn submit_request(&self, request: SubmitRequest) -> Result<DeliveryReceipt, GatewayError> {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let message_id = self
            .request(|reply| Command::Submit {
                request,
                outcome: outcome_tx,
                reply,
            })
            .await??;
        Ok(DeliveryReceipt {
            message_id,
            outcome: outcome_rx,
        })
    }

    /// Subscribe to inbound messages and reassembly expiries.
    pub async fn subscribe(&self, filter: SourceFilter) -> Result<Subscription, GatewayError> {
        self.request(|reply| Command::Subscribe { filter, reply })
            .await
    }

    pub async fn list_nodes(&self) -> Result<Vec<MeshNode>, GatewayError> {
        self.request(|reply| Command::ListNodes { reply }).await
    }

    pub async fn health(&self, network: Network) -> Result<CircuitState, GatewayError> {
        self.request(|reply| Command::Health { network, reply })
            .await
    }

    /// Recent mapping conflicts seen in announces.
    pub async fn mapping_anomalies(&self) -> Result<Vec<MappingAnomaly>, GatewayError> {
        self.request(|reply| Command::Anomalies { reply }).await
    }

    /// Coarse state of a message the router still remembers.
    pub async fn delivery_state(
        &self,
        message_id: MessageId,
    ) -> Result<Option<DeliveryState>, GatewayError> {
        self.request(|reply| Command::DeliveryState { message_id, reply })
            .await
    }

    /// Ask the gateway to stop. Returns immediately.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}
