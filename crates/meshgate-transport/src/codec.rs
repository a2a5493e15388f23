//! Packet codec: fragmentation and reassembly of gateway messages.
//!
//! Outbound payloads are split into self-describing frames no larger than the
//! target network's frame size. Inbound fragments are collected per
//! `(source, message_id)` until every sequence number has arrived, in any
//! order. Assemblies older than the reassembly timeout are discarded, never
//! delivered.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use meshgate_core::constants::{DEFAULT_MAX_FRAGMENTS, MAX_FRAGMENTS_LIMIT};
use meshgate_core::{Address, Frame, MessageId};

use crate::dedup::MessageIdList;
use crate::error::CodecError;

#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Largest number of fragments a single message may use.
    pub max_fragments: usize,
    pub reassembly_timeout: Duration,
    /// Concurrent inbound assemblies; the oldest is evicted beyond this.
    pub max_pending_assemblies: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_fragments: DEFAULT_MAX_FRAGMENTS,
            reassembly_timeout: Duration::from_secs(120),
            max_pending_assemblies: 64,
        }
    }
}

/// A complete inbound message rebuilt from its fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledMessage {
    pub message_id: MessageId,
    pub source: Address,
    pub destination: Address,
    pub payload: Vec<u8>,
    pub want_ack: bool,
}

/// An assembly that was discarded before completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredAssembly {
    pub source: Address,
    pub message_id: MessageId,
    pub received: usize,
    pub total: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    Complete(ReassembledMessage),
    Pending { received: usize, total: u8 },
    /// The sequence number was already held; the frame changed nothing.
    Duplicate,
    /// The message this frame belongs to was already reassembled. The sender
    /// is probably retransmitting because it missed an ack.
    Redelivered { want_ack: bool },
}

struct FragmentAssembly {
    destination: Address,
    total: u8,
    want_ack: bool,
    fragments: BTreeMap<u8, Vec<u8>>,
    started_at: Instant,
}

impl FragmentAssembly {
    fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.started_at) > timeout
    }
}

type AssemblyKey = (Address, MessageId);

pub struct PacketCodec {
    config: CodecConfig,
    assemblies: HashMap<AssemblyKey, FragmentAssembly>,
    completed: MessageIdList<AssemblyKey>,
    evicted: Vec<ExpiredAssembly>,
}

impl PacketCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            assemblies: HashMap::new(),
            completed: MessageIdList::new(),
            evicted: Vec::new(),
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn fragment_limit(&self) -> usize {
        self.config.max_fragments.clamp(1, MAX_FRAGMENTS_LIMIT)
    }

    /// Body bytes available per frame for this address pair.
    pub fn body_capacity(
        source: &Address,
        destination: &Address,
        max_frame_size: usize,
    ) -> Result<usize, CodecError> {
        let header = Frame::header_len(source, destination);
        match max_frame_size.checked_sub(header) {
            Some(capacity) if capacity > 0 => Ok(capacity),
            _ => Err(CodecError::FrameSizeTooSmall {
                frame_size: max_frame_size,
                header,
            }),
        }
    }

    /// Number of fragments `payload_len` bytes would need, or `PayloadTooLarge`.
    pub fn fragments_needed(
        &self,
        payload_len: usize,
        body_capacity: usize,
    ) -> Result<usize, CodecError> {
        let needed = payload_len.div_ceil(body_capacity).max(1);
        let max = self.fragment_limit();
        if needed > max {
            return Err(CodecError::PayloadTooLarge {
                size: payload_len,
                needed,
                max,
            });
        }
        Ok(needed)
    }

    /// Split `payload` into data frames of at most `max_frame_size` bytes each.
    ///
    /// Deterministic: identical inputs produce byte-identical frames.
    pub fn fragment(
        &self,
        message_id: MessageId,
        source: Address,
        destination: Address,
        payload: &[u8],
        max_frame_size: usize,
        want_ack: bool,
    ) -> Result<Vec<Frame>, CodecError> {
        let capacity = Self::body_capacity(&source, &destination, max_frame_size)?;
        let needed = self.fragments_needed(payload.len(), capacity)?;
        let total = needed as u8;

        if payload.is_empty() {
            return Ok(vec![
                Frame::data(message_id, 0, 1, source, destination, Vec::new())
                    .with_want_ack(want_ack),
            ]);
        }

        Ok(payload
            .chunks(capacity)
            .enumerate()
            .map(|(i, chunk)| {
                Frame::data(
                    message_id,
                    i as u8,
                    total,
                    source,
                    destination,
                    chunk.to_vec(),
                )
                .with_want_ack(want_ack)
            })
            .collect())
    }

    /// Feed one inbound data frame.
    ///
    /// A checksum mismatch drops the frame but leaves the assembly intact so a
    /// retransmission can still complete it.
    pub fn accept(&mut self, frame: Frame, now: Instant) -> Result<AcceptOutcome, CodecError> {
        if !frame.verify_checksum() {
            return Err(CodecError::ChecksumMismatch {
                expected: frame.checksum,
                computed: meshgate_core::checksum::crc16(&frame.body),
            });
        }

        let key = (frame.source, frame.message_id);
        let timeout = self.config.reassembly_timeout;

        if self.completed.contains(&key) {
            return Ok(AcceptOutcome::Redelivered {
                want_ack: frame.want_ack,
            });
        }

        if let Some(existing) = self.assemblies.get(&key)
            && existing.is_expired(now, timeout)
        {
            self.expire(key);
        }

        if frame.total == 1 {
            self.completed.insert(key);
            return Ok(AcceptOutcome::Complete(ReassembledMessage {
                message_id: frame.message_id,
                source: frame.source,
                destination: frame.destination,
                payload: frame.body,
                want_ack: frame.want_ack,
            }));
        }

        if !self.assemblies.contains_key(&key) {
            if self.assemblies.len() >= self.config.max_pending_assemblies.max(1) {
                self.evict_oldest();
            }
            self.assemblies.insert(
                key,
                FragmentAssembly {
                    destination: frame.destination,
                    total: frame.total,
                    want_ack: frame.want_ack,
                    fragments: BTreeMap::new(),
                    started_at: now,
                },
            );
        }

        let Some(assembly) = self.assemblies.get_mut(&key) else {
            return Ok(AcceptOutcome::Duplicate);
        };

        if assembly.total != frame.total {
            return Err(CodecError::InconsistentFragment {
                sequence: frame.sequence,
                total: frame.total,
                expected: assembly.total,
            });
        }
        if assembly.fragments.contains_key(&frame.sequence) {
            return Ok(AcceptOutcome::Duplicate);
        }
        assembly.want_ack |= frame.want_ack;
        assembly.fragments.insert(frame.sequence, frame.body);

        let received = assembly.fragments.len();
        if received < usize::from(assembly.total) {
            return Ok(AcceptOutcome::Pending {
                received,
                total: assembly.total,
            });
        }

        let Some(assembly) = self.assemblies.remove(&key) else {
            return Ok(AcceptOutcome::Duplicate);
        };
        self.completed.insert(key);
        let payload = assembly.fragments.into_values().flatten().collect();
        Ok(AcceptOutcome::Complete(ReassembledMessage {
            message_id: frame.message_id,
            source: frame.source,
            destination: assembly.destination,
            payload,
            want_ack: assembly.want_ack,
        }))
    }

    fn expire(&mut self, key: AssemblyKey) {
        if let Some(assembly) = self.assemblies.remove(&key) {
            self.evicted.push(ExpiredAssembly {
                source: key.0,
                message_id: key.1,
                received: assembly.fragments.len(),
                total: assembly.total,
            });
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .assemblies
            .iter()
            .min_by_key(|(_, a)| a.started_at)
            .map(|(k, _)| *k);
        if let Some(key) = oldest {
            tracing::debug!(
                source = %key.0,
                message_id = %key.1,
                "evicting oldest reassembly to make room"
            );
            self.expire(key);
        }
    }

    /// Assemblies discarded by eviction since the last call.
    pub fn take_evicted(&mut self) -> Vec<ExpiredAssembly> {
        std::mem::take(&mut self.evicted)
    }

    /// Remove every assembly older than the reassembly timeout, returning
    /// those and any evicted since the last call.
    pub fn sweep(&mut self, now: Instant) -> Vec<ExpiredAssembly> {
        let timeout = self.config.reassembly_timeout;
        let expired: Vec<AssemblyKey> = self
            .assemblies
            .iter()
            .filter(|(_, a)| a.is_expired(now, timeout))
            .map(|(k, _)| *k)
            .collect();
        for key in expired {
            self.expire(key);
        }
        self.take_evicted()
    }

    pub fn pending_assemblies(&self) -> usize {
        self.assemblies.len()
    }
}
