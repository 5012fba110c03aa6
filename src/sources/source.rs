//! Per-source state
//!
//! A [`Source`] is one sender (identified by CID) contributing to the
//! receiver's universe. Sequence numbers are compared on a ring of 256 so
//! that the 255 -> 0 wraparound is accepted while stale retransmits and
//! reordered duplicates are rejected.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::codec::DataPacket;
use crate::protocol::{Cid, DMX_SLOTS, PRIORITY_DEFAULT};

/// Trailing window of the sequence ring treated as "recent past"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceWindow(u8);

impl SequenceWindow {
    /// Half the ring: anything not strictly ahead of the last sequence is stale
    pub const HALF_RING: SequenceWindow = SequenceWindow(128);

    /// Create a window; callers validate the range (1-128)
    pub const fn new(size: u8) -> Self {
        Self(size)
    }

    pub fn size(&self) -> u8 {
        self.0
    }

    /// Whether `next` may follow `last`
    ///
    /// `next` is rejected when `(last - next) mod 256` lands inside the window,
    /// which covers exact duplicates and packets that arrived late.
    pub fn accepts(&self, last: u8, next: u8) -> bool {
        last.wrapping_sub(next) as u16 >= self.0 as u16
    }
}

impl Default for SequenceWindow {
    fn default() -> Self {
        Self::HALF_RING
    }
}

/// A sender currently contributing to the universe
#[derive(Debug, Clone)]
pub struct Source {
    cid: Cid,
    name: String,
    address: Option<SocketAddr>,
    levels: [u8; DMX_SLOTS],
    /// Number of slots carried by the last accepted packet
    slot_count: usize,
    priority: u8,
    last_sequence: u8,
    last_seen_at: Instant,
    packets_accepted: u64,
}

impl Source {
    /// Create a source from its first accepted packet
    pub fn from_packet(packet: &DataPacket, address: Option<SocketAddr>, now: Instant) -> Self {
        let mut source = Self {
            cid: packet.cid,
            name: String::new(),
            address,
            levels: [0; DMX_SLOTS],
            slot_count: 0,
            priority: PRIORITY_DEFAULT,
            last_sequence: packet.sequence,
            last_seen_at: now,
            packets_accepted: 0,
        };
        source.apply(packet, address, now);
        source
    }

    /// Overwrite levels, priority, sequence and timestamp from an accepted packet
    ///
    /// Slots beyond the packet's slot count become unset.
    pub(crate) fn apply(&mut self, packet: &DataPacket, address: Option<SocketAddr>, now: Instant) {
        let count = packet.levels.len().min(DMX_SLOTS);
        self.levels[..count].copy_from_slice(&packet.levels[..count]);
        self.levels[count..].fill(0);
        self.slot_count = count;
        self.priority = packet.priority;
        self.last_sequence = packet.sequence;
        self.last_seen_at = now;
        self.packets_accepted += 1;
        if self.name != packet.source_name {
            self.name = packet.source_name.clone();
        }
        if address.is_some() {
            self.address = address;
        }
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn last_sequence(&self) -> u8 {
        self.last_sequence
    }

    pub fn last_seen_at(&self) -> Instant {
        self.last_seen_at
    }

    pub fn packets_accepted(&self) -> u64 {
        self.packets_accepted
    }

    /// All 512 slot values; slots beyond [`Source::slot_count`] read 0
    pub fn levels(&self) -> &[u8; DMX_SLOTS] {
        &self.levels
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Level for a zero-based slot, if the last accepted packet carried it
    pub fn level(&self, slot: usize) -> Option<u8> {
        (slot < self.slot_count).then(|| self.levels[slot])
    }

    /// Whether the source has been silent for longer than `timeout`
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen_at) > timeout
    }
}
