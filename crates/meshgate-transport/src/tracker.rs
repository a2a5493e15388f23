//! Unified inventory of nodes seen on either mesh.
//!
//! Records are keyed internally by a slot number and indexed by whichever
//! identities they carry. A bridged announce links a crypto record and a
//! radio record into one node once the translator accepts the pairing.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use meshgate_core::{Address, AnnounceEvent, CryptoIdentity, Network, RadioNodeId};

use crate::error::TranslatorError;
use crate::translator::{AddressTranslator, LearnOutcome, unix_now};

/// Default silence TTL before a node is evicted.
pub const DEFAULT_NODE_TTL: Duration = Duration::from_secs(15 * 60);

/// How many mapping anomalies are retained for inspection.
pub const MAX_ANOMALIES: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub crypto_identity: Option<CryptoIdentity>,
    pub radio_node_id: Option<RadioNodeId>,
    pub display_name: String,
    pub last_seen: Instant,
    pub link_quality: Option<f32>,
    /// Network that last announced or carried traffic from this node.
    pub origin: Network,
}

impl MeshNode {
    pub fn is_bridged(&self) -> bool {
        self.crypto_identity.is_some() && self.radio_node_id.is_some()
    }
}

/// A mapping conflict surfaced while observing announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingAnomaly {
    pub network: Network,
    pub observed_at: Instant,
    pub conflict: TranslatorError,
}

/// What an observation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOutcome {
    pub created: bool,
    /// Result of correlating a bridged announce with the translator.
    pub mapping: Option<Result<LearnOutcome, TranslatorError>>,
}

type Slot = u64;

pub struct NodeTracker {
    ttl: Duration,
    nodes: HashMap<Slot, MeshNode>,
    by_crypto: HashMap<CryptoIdentity, Slot>,
    by_radio: HashMap<RadioNodeId, Slot>,
    next_slot: Slot,
    anomalies: VecDeque<MappingAnomaly>,
}

impl NodeTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            nodes: HashMap::new(),
            by_crypto: HashMap::new(),
            by_radio: HashMap::new(),
            next_slot: 0,
            anomalies: VecDeque::new(),
        }
    }

    fn slot_for(&self, crypto: Option<CryptoIdentity>, radio: Option<RadioNodeId>) -> Option<Slot> {
        crypto
            .and_then(|c| self.by_crypto.get(&c).copied())
            .or_else(|| radio.and_then(|r| self.by_radio.get(&r).copied()))
    }

    fn insert(&mut self, node: MeshNode) -> Slot {
        let slot = self.next_slot;
        self.next_slot += 1;
        if let Some(c) = node.crypto_identity {
            self.by_crypto.insert(c, slot);
        }
        if let Some(r) = node.radio_node_id {
            self.by_radio.insert(r, slot);
        }
        self.nodes.insert(slot, node);
        slot
    }

    fn remove(&mut self, slot: Slot) -> Option<MeshNode> {
        let node = self.nodes.remove(&slot)?;
        if let Some(c) = node.crypto_identity {
            self.by_crypto.remove(&c);
        }
        if let Some(r) = node.radio_node_id {
            self.by_radio.remove(&r);
        }
        Some(node)
    }

    /// Create or refresh a record for a single identity.
    fn refresh(
        &mut self,
        crypto: Option<CryptoIdentity>,
        radio: Option<RadioNodeId>,
        display_name: Option<&str>,
        link_quality: Option<f32>,
        network: Network,
        now: Instant,
    ) -> bool {
        match self.slot_for(crypto, radio).and_then(|s| self.nodes.get_mut(&s)) {
            Some(node) => {
                node.last_seen = now;
                node.origin = network;
                if let Some(name) = display_name.filter(|n| !n.is_empty()) {
                    node.display_name = name.to_string();
                }
                if link_quality.is_some() {
                    node.link_quality = link_quality;
                }
                false
            }
            None => {
                self.insert(MeshNode {
                    crypto_identity: crypto,
                    radio_node_id: radio,
                    display_name: display_name.unwrap_or_default().to_string(),
                    last_seen: now,
                    link_quality,
                    origin: network,
                });
                true
            }
        }
    }

    /// Fold the records for `crypto` and `radio` into one bridged record.
    fn link(&mut self, crypto: CryptoIdentity, radio: RadioNodeId) {
        let crypto_slot = self.by_crypto.get(&crypto).copied();
        let radio_slot = self.by_radio.get(&radio).copied();
        match (crypto_slot, radio_slot) {
            (Some(a), Some(b)) if a == b => {}
            (Some(a), Some(b)) => {
                let Some(other) = self.remove(b) else { return };
                if let Some(node) = self.nodes.get_mut(&a) {
                    node.radio_node_id = Some(radio);
                    if other.last_seen > node.last_seen {
                        node.last_seen = other.last_seen;
                        node.origin = other.origin;
                    }
                    if node.display_name.is_empty() {
                        node.display_name = other.display_name;
                    }
                    if node.link_quality.is_none() {
                        node.link_quality = other.link_quality;
                    }
                }
                self.by_radio.insert(radio, a);
            }
            (Some(a), None) => {
                if let Some(node) = self.nodes.get_mut(&a) {
                    node.radio_node_id = Some(radio);
                }
                self.by_radio.insert(radio, a);
            }
            (None, Some(b)) => {
                if let Some(node) = self.nodes.get_mut(&b) {
                    node.crypto_identity = Some(crypto);
                }
                self.by_crypto.insert(crypto, b);
            }
            (None, None) => {}
        }
    }

    /// Record an announce heard on `network`.
    ///
    /// A bridged announce is offered to the translator as a provisional
    /// mapping. If the translator reports a conflict the anomaly is kept and
    /// the two identities stay in separate records.
    pub fn observe(
        &mut self,
        event: &AnnounceEvent,
        network: Network,
        now: Instant,
        translator: &mut AddressTranslator,
    ) -> ObserveOutcome {
        let name = Some(event.display_name());
        let quality = event.link_quality();

        match event {
            AnnounceEvent::Crypto { identity, .. } => {
                let created = self.refresh(Some(*identity), None, name, quality, network, now);
                ObserveOutcome {
                    created,
                    mapping: None,
                }
            }
            AnnounceEvent::Radio { node, .. } => {
                let created = self.refresh(None, Some(*node), name, quality, network, now);
                ObserveOutcome {
                    created,
                    mapping: None,
                }
            }
            AnnounceEvent::Bridged { identity, node, .. } => {
                let result = translator.learn(*identity, *node, false, unix_now());
                match &result {
                    Ok(_) => {
                        let known = self.slot_for(Some(*identity), Some(*node)).is_some();
                        self.refresh(Some(*identity), None, name, quality, network, now);
                        self.link(*identity, *node);
                        self.refresh(None, Some(*node), name, quality, network, now);
                        ObserveOutcome {
                            created: !known,
                            mapping: Some(result),
                        }
                    }
                    Err(conflict) => {
                        tracing::warn!(
                            %network,
                            error = %conflict,
                            "bridged announce conflicts with known mapping"
                        );
                        self.record_anomaly(MappingAnomaly {
                            network,
                            observed_at: now,
                            conflict: conflict.clone(),
                        });
                        let known = self.slot_for(Some(*identity), None).is_some();
                        self.refresh(Some(*identity), None, name, quality, network, now);
                        ObserveOutcome {
                            created: !known,
                            mapping: Some(result),
                        }
                    }
                }
            }
        }
    }

    /// Refresh presence for the sender of ordinary traffic.
    pub fn touch(&mut self, address: &Address, network: Network, now: Instant) -> bool {
        match address {
            Address::Crypto(c) => self.refresh(Some(*c), None, None, None, network, now),
            Address::Radio(r) if !r.is_broadcast() => {
                self.refresh(None, Some(*r), None, None, network, now)
            }
            Address::Radio(_) => false,
        }
    }

    pub fn record_anomaly(&mut self, anomaly: MappingAnomaly) {
        if self.anomalies.len() >= MAX_ANOMALIES {
            self.anomalies.pop_front();
        }
        self.anomalies.push_back(anomaly);
    }

    pub fn anomalies(&self) -> Vec<MappingAnomaly> {
        self.anomalies.iter().cloned().collect()
    }

    /// Network the node owning `address` was last heard on.
    pub fn origin_of(&self, address: &Address) -> Option<Network> {
        let slot = match address {
            Address::Crypto(c) => self.by_crypto.get(c),
            Address::Radio(r) => self.by_radio.get(r),
        }?;
        self.nodes.get(slot).map(|n| n.origin)
    }

    /// Evict nodes silent for longer than the TTL; returns how many.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let stale: Vec<Slot> = self
            .nodes
            .iter()
            .filter(|(_, n)| now.saturating_duration_since(n.last_seen) > ttl)
            .map(|(s, _)| *s)
            .collect();
        for slot in &stale {
            if let Some(node) = self.remove(*slot) {
                tracing::debug!(
                    crypto = ?node.crypto_identity,
                    radio = ?node.radio_node_id,
                    "node evicted after silence"
                );
            }
        }
        stale.len()
    }

    /// Owned snapshot of every known node, most recently seen first.
    pub fn query(&self) -> Vec<MeshNode> {
        let mut all: Vec<MeshNode> = self.nodes.values().cloned().collect();
        all.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        all
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for NodeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_TTL)
    }
}
