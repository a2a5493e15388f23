//! Router inputs, outputs and configuration.

use std::fmt;
use std::time::{Duration, Instant};

use meshgate_core::constants::{DEFAULT_CRYPTO_FRAME_SIZE, DEFAULT_RADIO_FRAME_SIZE};
use meshgate_core::{Address, MessageId, Network};

use crate::codec::CodecConfig;
use crate::dedup::DEFAULT_ROTATION_THRESHOLD;
use crate::error::FailureReason;
use crate::health::HealthConfig;
use crate::retry::RetryPolicy;
use crate::route_plan::LocalIdentity;
use crate::tracker::DEFAULT_NODE_TTL;
use crate::translator::AddressMapping;

/// Options consumed by the router. Built from the gateway configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub local: LocalIdentity,
    /// Name carried in the gateway's own announces.
    pub display_name: String,
    pub radio_frame_size: usize,
    pub crypto_frame_size: usize,
    pub codec: CodecConfig,
    pub retry: RetryPolicy,
    pub health: HealthConfig,
    pub node_ttl: Duration,
    /// How long a message may wait for its destination to become routable.
    pub address_wait: Duration,
    /// Keep each message at the head of its queue until the destination acks.
    pub require_ack: bool,
    pub ack_timeout: Duration,
    pub max_pending_messages: usize,
    pub dedup_capacity: usize,
    /// `None` disables the gateway's own announces.
    pub announce_interval: Option<Duration>,
}

impl RouterConfig {
    pub fn new(local: LocalIdentity) -> Self {
        Self {
            local,
            display_name: "meshgate".into(),
            radio_frame_size: DEFAULT_RADIO_FRAME_SIZE,
            crypto_frame_size: DEFAULT_CRYPTO_FRAME_SIZE,
            codec: CodecConfig::default(),
            retry: RetryPolicy::default(),
            health: HealthConfig::default(),
            node_ttl: DEFAULT_NODE_TTL,
            address_wait: Duration::from_secs(60),
            require_ack: false,
            ack_timeout: Duration::from_secs(30),
            max_pending_messages: 1024,
            dedup_capacity: DEFAULT_ROTATION_THRESHOLD,
            announce_interval: Some(Duration::from_secs(10 * 60)),
        }
    }

    pub fn frame_size(&self, network: Network) -> usize {
        match network {
            Network::CryptoMesh => self.crypto_frame_size,
            Network::RadioMesh => self.radio_frame_size,
        }
    }
}

/// A message handed to the gateway by a local client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub destination: Address,
    pub payload: Vec<u8>,
    /// Explicit id; content-derived when absent.
    pub message_id: Option<MessageId>,
}

impl SubmitRequest {
    pub fn new(destination: Address, payload: Vec<u8>) -> Self {
        Self {
            destination,
            payload,
            message_id: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(MessageId),
    /// The id was seen recently; nothing new will be sent.
    Duplicate(MessageId),
}

impl SubmitOutcome {
    pub fn message_id(&self) -> MessageId {
        match self {
            SubmitOutcome::Accepted(id) | SubmitOutcome::Duplicate(id) => *id,
        }
    }
}

/// Router-assigned handle for one queued outbound message.
///
/// Wire ids are only unique per sender, so a forwarded message and a local
/// submission can share a [`MessageId`]. Send results are matched by ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub(crate) const fn new(n: u64) -> Self {
        Self(n)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-message state while the router owns an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundState {
    Submitted,
    AddressUnknown,
    Fragmenting,
    Sending,
    AwaitingAck,
    Delivered,
    Failed,
    Expired,
}

/// Coarse delivery state exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Fragmented,
    Delivered,
    Failed,
    Expired,
}

impl OutboundState {
    pub fn delivery_state(self) -> DeliveryState {
        match self {
            OutboundState::Submitted | OutboundState::AddressUnknown => DeliveryState::Pending,
            OutboundState::Fragmenting | OutboundState::Sending | OutboundState::AwaitingAck => {
                DeliveryState::Fragmented
            }
            OutboundState::Delivered => DeliveryState::Delivered,
            OutboundState::Failed => DeliveryState::Failed,
            OutboundState::Expired => DeliveryState::Expired,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OutboundState::Delivered | OutboundState::Failed | OutboundState::Expired
        )
    }
}

/// Final answer for a submitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Duplicate,
    Failed(FailureReason),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered | DeliveryOutcome::Duplicate)
    }
}

/// A fully reassembled message received from either mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub source: Address,
    pub destination: Address,
    pub payload: Vec<u8>,
    pub origin: Network,
    pub received_at: Instant,
}

/// Published to subscribers in per-source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Message(InboundMessage),
    /// A partially received message timed out before completing.
    Expired {
        source: Address,
        message_id: MessageId,
    },
}

impl GatewayEvent {
    pub fn source(&self) -> &Address {
        match self {
            GatewayEvent::Message(m) => &m.source,
            GatewayEvent::Expired { source, .. } => source,
        }
    }
}

/// Result of writing one message's frames to an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Written,
    Failed { detail: String },
}

/// Work the runtime must carry out on the router's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterAction {
    /// Write every frame of one message, in order, then report back with
    /// `handle_send_result` using the same ticket.
    Transmit {
        network: Network,
        ticket: Ticket,
        message_id: MessageId,
        frames: Vec<Vec<u8>>,
    },
    /// Write a single ack or announce frame; no result is expected.
    TransmitControl { network: Network, frame: Vec<u8> },
    /// Check daemon reachability, then report with `handle_probe_result`.
    Probe { network: Network },
    Publish(GatewayEvent),
    /// Final outcome of a local submission. Forwarded traffic has no
    /// submitter and is never reported.
    Report {
        message_id: MessageId,
        outcome: DeliveryOutcome,
    },
    /// The confirmed mapping set changed; persist this snapshot.
    PersistMappings(Vec<AddressMapping>),
}
