//! The message router state machine.
//!
//! Outbound messages wait in one FIFO queue per destination; only the head of
//! a queue is ever in flight, so a message that needs retries holds back the
//! ones submitted after it. Every input returns the actions the runtime must
//! perform, and every transition is visible through [`MessageRouter::outbound_state`].
//!
//! Queued messages are keyed by [`Ticket`]. Local submissions are deduplicated
//! by id; forwarded traffic by `(original source, id)`, since independent
//! senders may reuse ids.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use meshgate_core::{
    Address, AnnounceEvent, CryptoIdentity, Frame, FrameKind, MessageId, Network, RadioNodeId,
};

use crate::codec::{AcceptOutcome, PacketCodec};
use crate::dedup::MessageIdList;
use crate::error::{CodecError, ExhaustionCause, FailureReason, RouterError};
use crate::health::{CircuitState, HealthMonitor};
use crate::route_plan::{Route, RouteDecision, plan_forward, plan_route};
use crate::router::types::{
    DeliveryOutcome, GatewayEvent, InboundMessage, OutboundState, RouterAction, RouterConfig,
    SendOutcome, SubmitOutcome, SubmitRequest, Ticket,
};
use crate::tracker::{MappingAnomaly, MeshNode, NodeTracker};
use crate::translator::{AddressMapping, AddressTranslator};

/// Finished messages remembered for state inspection and late acks.
const HISTORY_LIMIT: usize = 1024;

struct OutboundMessage {
    id: MessageId,
    ticket: Ticket,
    destination: Address,
    payload: Vec<u8>,
    state: OutboundState,
    attempts: u32,
    /// Original sender of forwarded traffic; `None` for local submissions.
    forwarded_from: Option<Address>,
    /// Set for forwarded traffic, whose route was decided on arrival.
    fixed_route: Option<Route>,
    route: Option<Route>,
    /// The destination acked before the write was reported.
    acked: bool,
    not_before: Option<Instant>,
    address_deadline: Option<Instant>,
    first_attempt_at: Option<Instant>,
    ack_deadline: Option<Instant>,
}

impl OutboundMessage {
    fn is_local(&self) -> bool {
        self.forwarded_from.is_none()
    }
}

struct FinishedMessage {
    id: MessageId,
    local: bool,
    state: OutboundState,
    route: Option<Route>,
}

enum Step {
    Finished,
    Blocked,
}

pub struct MessageRouter {
    config: RouterConfig,
    codec: PacketCodec,
    translator: AddressTranslator,
    tracker: NodeTracker,
    health: HealthMonitor,
    submitted: MessageIdList<MessageId>,
    forwarded: MessageIdList<(Address, MessageId)>,
    messages: HashMap<Ticket, OutboundMessage>,
    queues: HashMap<Address, VecDeque<Ticket>>,
    history: VecDeque<FinishedMessage>,
    next_ticket: u64,
    next_announce_at: Option<Instant>,
    announce_counter: u32,
}

impl MessageRouter {
    pub fn new(config: RouterConfig, mappings: Vec<AddressMapping>) -> Self {
        Self {
            codec: PacketCodec::new(config.codec.clone()),
            translator: AddressTranslator::from_mappings(mappings),
            tracker: NodeTracker::new(config.node_ttl),
            health: HealthMonitor::new(config.health.clone()),
            submitted: MessageIdList::with_threshold(config.dedup_capacity),
            forwarded: MessageIdList::with_threshold(config.dedup_capacity),
            messages: HashMap::new(),
            queues: HashMap::new(),
            history: VecDeque::new(),
            next_ticket: 0,
            next_announce_at: None,
            announce_counter: 0,
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn translator(&self) -> &AddressTranslator {
        &self.translator
    }

    pub fn tracker(&self) -> &NodeTracker {
        &self.tracker
    }

    pub fn codec(&self) -> &PacketCodec {
        &self.codec
    }

    pub fn nodes(&self) -> Vec<MeshNode> {
        self.tracker.query()
    }

    pub fn health(&self, network: Network) -> CircuitState {
        self.health.state(network)
    }

    pub fn anomalies(&self) -> Vec<MappingAnomaly> {
        self.tracker.anomalies()
    }

    pub fn pending_messages(&self) -> usize {
        self.messages.len()
    }

    /// Current state of a local submission, including recently finished ones.
    pub fn outbound_state(&self, id: MessageId) -> Option<OutboundState> {
        self.local_ticket(id)
            .and_then(|t| self.messages.get(&t))
            .map(|m| m.state)
            .or_else(|| {
                self.history
                    .iter()
                    .rev()
                    .find(|f| f.local && f.id == id)
                    .map(|f| f.state)
            })
    }

    fn local_ticket(&self, id: MessageId) -> Option<Ticket> {
        self.messages
            .values()
            .find(|m| m.is_local() && m.id == id)
            .map(|m| m.ticket)
    }

    /// Ids queued for `destination`, head first.
    pub fn queued_for(&self, destination: &Address) -> Vec<MessageId> {
        self.queues
            .get(destination)
            .map(|q| {
                q.iter()
                    .filter_map(|t| self.messages.get(t).map(|m| m.id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Smallest per-frame body any route to `destination` could offer.
    fn worst_case_capacity(&self, destination: &Address) -> Result<usize, CodecError> {
        let local = &self.config.local;
        let radio = PacketCodec::body_capacity(
            &local.address_on(Network::RadioMesh),
            &Address::Radio(RadioNodeId::BROADCAST),
            self.config.radio_frame_size,
        )?;
        match destination {
            Address::Radio(_) => Ok(radio),
            Address::Crypto(_) => {
                let crypto = PacketCodec::body_capacity(
                    &local.address_on(Network::CryptoMesh),
                    destination,
                    self.config.crypto_frame_size,
                )?;
                Ok(radio.min(crypto))
            }
        }
    }

    /// Accept a message for delivery. Call [`pump`](Self::pump) afterwards to
    /// get the resulting transmissions.
    pub fn submit(&mut self, request: SubmitRequest) -> Result<SubmitOutcome, RouterError> {
        if request.payload.is_empty() {
            return Err(RouterError::EmptyPayload);
        }
        if self.config.local.is_local(&request.destination) {
            return Err(RouterError::LocalDestination);
        }

        let id = request.message_id.unwrap_or_else(|| {
            let source = self
                .config
                .local
                .address_on(request.destination.network());
            MessageId::derive(&source, &request.destination, &request.payload)
        });
        if self.submitted.contains(&id) || self.local_ticket(id).is_some() {
            tracing::debug!(message_id = %id, "duplicate submission ignored");
            return Ok(SubmitOutcome::Duplicate(id));
        }

        let capacity = self.worst_case_capacity(&request.destination)?;
        self.codec
            .fragments_needed(request.payload.len(), capacity)?;

        if self.messages.len() >= self.config.max_pending_messages {
            return Err(RouterError::QueueFull {
                limit: self.config.max_pending_messages,
            });
        }

        self.submitted.insert(id);
        tracing::debug!(
            message_id = %id,
            destination = %request.destination,
            bytes = request.payload.len(),
            "message submitted"
        );
        self.enqueue(id, request.destination, request.payload, None, None);
        Ok(SubmitOutcome::Accepted(id))
    }

    fn enqueue(
        &mut self,
        id: MessageId,
        destination: Address,
        payload: Vec<u8>,
        forwarded_from: Option<Address>,
        fixed_route: Option<Route>,
    ) -> Ticket {
        let ticket = Ticket::new(self.next_ticket);
        self.next_ticket += 1;
        self.messages.insert(
            ticket,
            OutboundMessage {
                id,
                ticket,
                destination,
                payload,
                state: OutboundState::Submitted,
                attempts: 0,
                forwarded_from,
                fixed_route,
                route: None,
                acked: false,
                not_before: None,
                address_deadline: None,
                first_attempt_at: None,
                ack_deadline: None,
            },
        );
        self.queues.entry(destination).or_default().push_back(ticket);
        ticket
    }

    /// Advance every destination queue as far as health and backoff allow.
    pub fn pump(&mut self, now: Instant) -> Vec<RouterAction> {
        let mut actions = Vec::new();
        let mut heads: Vec<(Ticket, Address)> = self
            .queues
            .iter()
            .filter_map(|(dest, q)| q.front().map(|t| (*t, *dest)))
            .collect();
        heads.sort_unstable();

        for (_, dest) in heads {
            while let Some(&ticket) = self.queues.get(&dest).and_then(|q| q.front()) {
                match self.advance(ticket, now, &mut actions) {
                    Step::Finished => continue,
                    Step::Blocked => break,
                }
            }
        }
        self.queues.retain(|_, q| !q.is_empty());
        actions
    }

    fn advance(&mut self, ticket: Ticket, now: Instant, actions: &mut Vec<RouterAction>) -> Step {
        let Some(msg) = self.messages.get(&ticket) else {
            self.detach(ticket);
            return Step::Finished;
        };
        let id = msg.id;

        match msg.state {
            OutboundState::Sending | OutboundState::AwaitingAck | OutboundState::Fragmenting => {
                return Step::Blocked;
            }
            OutboundState::Delivered | OutboundState::Failed | OutboundState::Expired => {
                self.detach(ticket);
                return Step::Finished;
            }
            OutboundState::Submitted | OutboundState::AddressUnknown => {}
        }

        if let Some(first) = msg.first_attempt_at
            && now.saturating_duration_since(first) >= self.config.retry.overall_deadline
        {
            let attempts = msg.attempts;
            self.finish(
                ticket,
                OutboundState::Expired,
                FailureReason::DeliveryExhausted {
                    attempts,
                    cause: ExhaustionCause::DeadlineExceeded,
                },
                actions,
            );
            return Step::Finished;
        }
        if msg.not_before.is_some_and(|at| now < at) {
            return Step::Blocked;
        }

        let decision = match msg.fixed_route {
            Some(route) => RouteDecision::Send(route),
            None => plan_route(
                &msg.destination,
                &self.translator,
                &self.tracker,
                &self.config.local,
            ),
        };

        let route = match decision {
            RouteDecision::Send(route) => route,
            RouteDecision::AwaitAddress | RouteDecision::Local => {
                return self.await_address(ticket, now, actions);
            }
        };

        if !self.health.allows_send(route.network) {
            tracing::trace!(message_id = %id, network = %route.network, "held while circuit is not closed");
            return Step::Blocked;
        }

        let want_ack = self.config.require_ack
            || route
                .mapping
                .and_then(|(c, _)| self.translator.get(&c))
                .is_some_and(|m| !m.confirmed);
        let frame_size = self.config.frame_size(route.network);

        let Some(msg) = self.messages.get_mut(&ticket) else {
            return Step::Finished;
        };
        msg.state = OutboundState::Fragmenting;
        let frames = self.codec.fragment(
            id,
            route.source,
            route.destination,
            &msg.payload,
            frame_size,
            want_ack,
        );
        let frames = match frames {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(message_id = %id, error = %e, "message cannot be encoded for its route");
                self.finish(ticket, OutboundState::Failed, FailureReason::Encoding(e), actions);
                return Step::Finished;
            }
        };

        msg.attempts += 1;
        msg.first_attempt_at.get_or_insert(now);
        msg.route = Some(route);
        msg.not_before = None;
        msg.state = OutboundState::Sending;
        msg.acked = false;
        tracing::debug!(
            message_id = %id,
            %ticket,
            network = %route.network,
            destination = %route.destination,
            attempt = msg.attempts,
            fragments = frames.len(),
            "sending message"
        );
        actions.push(RouterAction::Transmit {
            network: route.network,
            ticket,
            message_id: id,
            frames: frames.iter().map(Frame::encode).collect(),
        });
        Step::Blocked
    }

    fn await_address(
        &mut self,
        ticket: Ticket,
        now: Instant,
        actions: &mut Vec<RouterAction>,
    ) -> Step {
        let wait = self.config.address_wait;
        let Some(msg) = self.messages.get_mut(&ticket) else {
            return Step::Finished;
        };
        let id = msg.id;
        let deadline = *msg.address_deadline.get_or_insert(now + wait);
        if msg.state != OutboundState::AddressUnknown {
            msg.state = OutboundState::AddressUnknown;
            tracing::debug!(
                message_id = %id,
                destination = %msg.destination,
                "destination unknown, waiting for an announce"
            );
        }
        if now < deadline {
            return Step::Blocked;
        }
        let attempts = msg.attempts;
        tracing::warn!(message_id = %id, destination = %msg.destination, "no route to destination");
        self.finish(
            ticket,
            OutboundState::Failed,
            FailureReason::DeliveryExhausted {
                attempts,
                cause: ExhaustionCause::AddressUnresolved,
            },
            actions,
        );
        Step::Finished
    }

    fn detach(&mut self, ticket: Ticket) {
        for queue in self.queues.values_mut() {
            queue.retain(|q| *q != ticket);
        }
    }

    /// Take a message out of the router and keep a history record of it.
    fn retire(&mut self, ticket: Ticket, state: OutboundState) -> Option<OutboundMessage> {
        let msg = self.messages.remove(&ticket)?;
        if let Some(queue) = self.queues.get_mut(&msg.destination) {
            queue.retain(|q| *q != ticket);
        }
        if self.history.len() >= HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(FinishedMessage {
            id: msg.id,
            local: msg.is_local(),
            state,
            route: msg.route,
        });
        Some(msg)
    }

    fn finish(
        &mut self,
        ticket: Ticket,
        state: OutboundState,
        reason: FailureReason,
        actions: &mut Vec<RouterAction>,
    ) {
        let Some(msg) = self.retire(ticket, state) else {
            return;
        };
        match msg.forwarded_from {
            None => {
                // A failed submission may be retried with the same id.
                self.submitted.remove(&msg.id);
                actions.push(RouterAction::Report {
                    message_id: msg.id,
                    outcome: DeliveryOutcome::Failed(reason),
                });
            }
            Some(source) => {
                tracing::warn!(
                    message_id = %msg.id,
                    %source,
                    destination = %msg.destination,
                    "forwarded message not delivered: {reason}"
                );
            }
        }
    }

    fn deliver(&mut self, ticket: Ticket, actions: &mut Vec<RouterAction>) {
        let Some(msg) = self.retire(ticket, OutboundState::Delivered) else {
            return;
        };
        tracing::debug!(message_id = %msg.id, attempts = msg.attempts, "message delivered");
        if msg.is_local() {
            actions.push(RouterAction::Report {
                message_id: msg.id,
                outcome: DeliveryOutcome::Delivered,
            });
        }
    }

    fn retry_or_fail(
        &mut self,
        ticket: Ticket,
        now: Instant,
        cause: ExhaustionCause,
        actions: &mut Vec<RouterAction>,
    ) {
        let Some(msg) = self.messages.get_mut(&ticket) else {
            return;
        };
        let id = msg.id;
        if self.config.retry.exhausted(msg.attempts) {
            let attempts = msg.attempts;
            tracing::warn!(message_id = %id, attempts, %cause, "delivery exhausted");
            self.finish(
                ticket,
                OutboundState::Failed,
                FailureReason::DeliveryExhausted { attempts, cause },
                actions,
            );
            return;
        }
        let delay = self.config.retry.backoff(msg.attempts);
        msg.state = OutboundState::Submitted;
        msg.ack_deadline = None;
        msg.not_before = Some(now + delay);
        tracing::debug!(
            message_id = %id,
            attempt = msg.attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling whole-message resend"
        );
    }

    /// The runtime finished writing (or failed to write) a `Transmit`.
    pub fn handle_send_result(
        &mut self,
        network: Network,
        ticket: Ticket,
        outcome: SendOutcome,
        now: Instant,
    ) -> Vec<RouterAction> {
        let mut actions = Vec::new();
        match outcome {
            SendOutcome::Written => {
                if self.health.breaker_mut(network).record_success().is_some() {
                    tracing::info!(%network, "circuit closed after successful write");
                }
                let require_ack = self.config.require_ack;
                let ack_timeout = self.config.ack_timeout;
                match self.messages.get_mut(&ticket) {
                    Some(msg) if msg.state == OutboundState::Sending => {
                        if require_ack && !msg.acked {
                            msg.state = OutboundState::AwaitingAck;
                            msg.ack_deadline = Some(now + ack_timeout);
                        } else {
                            self.deliver(ticket, &mut actions);
                        }
                    }
                    _ => tracing::trace!(%ticket, "send result for message no longer sending"),
                }
            }
            SendOutcome::Failed { detail } => {
                tracing::debug!(%ticket, %network, %detail, "write failed");
                self.record_io_failure(network, now);
                if self
                    .messages
                    .get(&ticket)
                    .is_some_and(|m| m.state == OutboundState::Sending)
                {
                    self.retry_or_fail(ticket, now, ExhaustionCause::RetriesExhausted, &mut actions);
                }
            }
        }
        actions.extend(self.pump(now));
        actions
    }

    fn record_io_failure(&mut self, network: Network, now: Instant) {
        if self.health.breaker_mut(network).record_failure(now) == Some(CircuitState::Open) {
            tracing::warn!(%network, "circuit opened after repeated I/O failures, holding sends");
        }
    }

    /// An adapter read failed outside of any send.
    pub fn handle_io_failure(&mut self, network: Network, now: Instant) {
        self.record_io_failure(network, now);
    }

    pub fn handle_probe_result(
        &mut self,
        network: Network,
        ok: bool,
        now: Instant,
    ) -> Vec<RouterAction> {
        match self.health.breaker_mut(network).record_probe(ok, now) {
            Some(CircuitState::Closed) => {
                tracing::info!(%network, "probe succeeded, circuit closed, draining held messages");
            }
            Some(CircuitState::Open) => {
                let cooldown = self.health.breaker(network).current_cooldown();
                tracing::warn!(
                    %network,
                    cooldown_secs = cooldown.as_secs(),
                    "probe failed, circuit open"
                );
            }
            _ => {}
        }
        self.pump(now)
    }

    /// Periodic scheduler tick: sweeps, probes, timeouts, announces.
    pub fn tick(&mut self, now: Instant) -> Vec<RouterAction> {
        let mut actions = Vec::new();

        for expired in self.codec.sweep(now) {
            tracing::info!(
                source = %expired.source,
                message_id = %expired.message_id,
                received = expired.received,
                total = expired.total,
                "reassembly timed out"
            );
            actions.push(RouterAction::Publish(GatewayEvent::Expired {
                source: expired.source,
                message_id: expired.message_id,
            }));
        }

        let evicted = self.tracker.sweep(now);
        if evicted > 0 {
            tracing::debug!(evicted, "node sweep");
        }

        for network in Network::ALL {
            if self.health.breaker_mut(network).poll(now) {
                tracing::debug!(%network, "cooldown elapsed, probing daemon");
                actions.push(RouterAction::Probe { network });
            }
        }

        let mut timed_out: Vec<Ticket> = self
            .messages
            .values()
            .filter(|m| {
                m.state == OutboundState::AwaitingAck && m.ack_deadline.is_some_and(|d| now >= d)
            })
            .map(|m| m.ticket)
            .collect();
        timed_out.sort_unstable();
        for ticket in timed_out {
            tracing::debug!(%ticket, "ack timeout");
            self.retry_or_fail(ticket, now, ExhaustionCause::AckTimeout, &mut actions);
        }

        self.maybe_announce(now, &mut actions);
        actions.extend(self.pump(now));
        actions
    }

    fn maybe_announce(&mut self, now: Instant, actions: &mut Vec<RouterAction>) {
        let Some(interval) = self.config.announce_interval else {
            return;
        };
        if self.next_announce_at.is_some_and(|at| now < at) {
            return;
        }
        self.next_announce_at = Some(now + interval);

        let local = self.config.local;
        let body = AnnounceEvent::Bridged {
            identity: local.crypto,
            node: local.radio,
            display_name: self.config.display_name.clone(),
            link_quality: None,
        }
        .encode();
        self.announce_counter = self.announce_counter.wrapping_add(1);
        let id = MessageId::new(self.announce_counter);
        for network in Network::ALL {
            if !self.health.allows_send(network) {
                continue;
            }
            let frame = Frame::announce(
                id,
                local.address_on(network),
                Address::Radio(RadioNodeId::BROADCAST),
                body.clone(),
            );
            actions.push(RouterAction::TransmitControl {
                network,
                frame: frame.encode(),
            });
        }
    }

    /// Process one raw frame read from `network`.
    pub fn handle_frame(&mut self, network: Network, raw: &[u8], now: Instant) -> Vec<RouterAction> {
        let frame = match Frame::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%network, error = %e, len = raw.len(), "dropping undecodable frame");
                return Vec::new();
            }
        };
        if self.config.local.is_local(&frame.source) {
            tracing::trace!(%network, "ignoring echo of our own frame");
            return Vec::new();
        }
        tracing::trace!(
            %network,
            kind = ?frame.kind,
            message_id = %frame.message_id,
            sequence = frame.sequence,
            total = frame.total,
            "frame received"
        );

        let mut actions = Vec::new();
        match frame.kind {
            FrameKind::Ack => self.handle_ack(network, &frame, &mut actions),
            FrameKind::Announce => self.handle_announce(network, &frame, now),
            FrameKind::Data => self.handle_data(network, frame, now, &mut actions),
        }
        actions.extend(self.pump(now));
        actions
    }

    fn handle_ack(&mut self, network: Network, frame: &Frame, actions: &mut Vec<RouterAction>) {
        let id = frame.message_id;
        let matches_route = |route: &Option<Route>| {
            route.is_some_and(|r| r.network == network && r.destination == frame.source)
        };

        let in_flight = self.messages.values_mut().find(|m| {
            m.id == id
                && matches_route(&m.route)
                && matches!(m.state, OutboundState::AwaitingAck | OutboundState::Sending)
        });

        let mut confirmed_route = None;
        if let Some(msg) = in_flight {
            confirmed_route = msg.route;
            if msg.state == OutboundState::AwaitingAck {
                let ticket = msg.ticket;
                self.deliver(ticket, actions);
            } else {
                // Finished once the write is reported.
                msg.acked = true;
            }
        } else if let Some(done) = self
            .history
            .iter()
            .rev()
            .find(|f| f.id == id && f.state == OutboundState::Delivered)
            && matches_route(&done.route)
        {
            confirmed_route = done.route;
        }

        match confirmed_route.and_then(|r| r.mapping) {
            Some((crypto, radio)) => self.confirm_mapping(crypto, radio, actions),
            None if confirmed_route.is_none() => {
                tracing::trace!(message_id = %id, %network, "ack for unknown message");
            }
            None => {}
        }
    }

    fn confirm_mapping(
        &mut self,
        crypto: CryptoIdentity,
        radio: RadioNodeId,
        actions: &mut Vec<RouterAction>,
    ) {
        if self.translator.confirm(&crypto, &radio) {
            tracing::info!(%crypto, %radio, "mapping confirmed by end-to-end ack");
            actions.push(RouterAction::PersistMappings(
                self.translator.confirmed_mappings(),
            ));
        }
    }

    fn handle_announce(&mut self, network: Network, frame: &Frame, now: Instant) {
        if !frame.verify_checksum() {
            tracing::debug!(%network, "dropping announce with bad checksum");
            return;
        }
        let event = match AnnounceEvent::decode(&frame.body) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%network, error = %e, "dropping malformed announce");
                return;
            }
        };
        let outcome = self
            .tracker
            .observe(&event, network, now, &mut self.translator);
        tracing::debug!(
            %network,
            crypto = ?event.crypto_identity(),
            radio = ?event.radio_node(),
            created = outcome.created,
            "announce observed"
        );
    }

    fn handle_data(
        &mut self,
        network: Network,
        frame: Frame,
        now: Instant,
        actions: &mut Vec<RouterAction>,
    ) {
        self.tracker.touch(&frame.source, network, now);
        let (source, destination, id) = (frame.source, frame.destination, frame.message_id);

        match self.codec.accept(frame, now) {
            Ok(AcceptOutcome::Complete(msg)) => {
                if msg.want_ack {
                    self.push_ack(network, id, destination, source, actions);
                }
                tracing::debug!(
                    %network,
                    message_id = %id,
                    %source,
                    bytes = msg.payload.len(),
                    "message reassembled"
                );
                if let Some(route) = plan_forward(
                    network,
                    &msg.source,
                    &msg.destination,
                    &self.translator,
                    &self.config.local,
                ) {
                    self.enqueue_forward(msg.source, id, route, msg.payload.clone());
                }
                actions.push(RouterAction::Publish(GatewayEvent::Message(InboundMessage {
                    message_id: msg.message_id,
                    source: msg.source,
                    destination: msg.destination,
                    payload: msg.payload,
                    origin: network,
                    received_at: now,
                })));
            }
            Ok(AcceptOutcome::Redelivered { want_ack }) => {
                if want_ack {
                    self.push_ack(network, id, destination, source, actions);
                }
            }
            Ok(AcceptOutcome::Pending { received, total }) => {
                tracing::trace!(message_id = %id, received, total, "fragment stored");
            }
            Ok(AcceptOutcome::Duplicate) => {
                tracing::trace!(message_id = %id, "duplicate fragment ignored");
            }
            Err(e) => {
                tracing::debug!(%network, message_id = %id, error = %e, "fragment dropped");
            }
        }

        for expired in self.codec.take_evicted() {
            actions.push(RouterAction::Publish(GatewayEvent::Expired {
                source: expired.source,
                message_id: expired.message_id,
            }));
        }
    }

    fn push_ack(
        &self,
        network: Network,
        id: MessageId,
        from: Address,
        to: Address,
        actions: &mut Vec<RouterAction>,
    ) {
        actions.push(RouterAction::TransmitControl {
            network,
            frame: Frame::ack(id, from, to).encode(),
        });
    }

    fn enqueue_forward(&mut self, source: Address, id: MessageId, route: Route, payload: Vec<u8>) {
        if self.messages.len() >= self.config.max_pending_messages {
            tracing::warn!(message_id = %id, %source, "router full, not forwarding message");
            return;
        }
        if !self.forwarded.insert((source, id)) {
            tracing::debug!(message_id = %id, %source, "message already forwarded");
            return;
        }
        let ticket = self.enqueue(id, route.destination, payload, Some(source), Some(route));
        tracing::debug!(
            message_id = %id,
            %ticket,
            %source,
            network = %route.network,
            destination = %route.destination,
            "forwarding to opposite network"
        );
    }

    /// Fail everything still queued. Used on shutdown.
    pub fn drain(&mut self) -> Vec<RouterAction> {
        let mut actions = Vec::new();
        let mut tickets: Vec<Ticket> = self.messages.keys().copied().collect();
        tickets.sort_unstable();
        for ticket in tickets {
            self.finish(ticket, OutboundState::Failed, FailureReason::Shutdown, &mut actions);
        }
        self.queues.clear();
        actions
    }
}
