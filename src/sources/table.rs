//! Source table
//!
//! Owns every [`Source`] tracked for one universe, keyed by CID. Eviction is
//! a map removal; nothing outside the table keeps a handle to a source.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use crate::codec::DataPacket;
use crate::error::SourceError;
use crate::protocol::Cid;
use crate::sources::source::{SequenceWindow, Source};

/// Result of offering a packet to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First packet from a new CID
    Created,
    /// Existing source updated
    Updated,
    /// Duplicate or late packet; state left unchanged
    OutOfSequence { last: u8, received: u8 },
}

impl UpsertOutcome {
    /// Whether the packet changed table state
    pub fn is_accepted(&self) -> bool {
        !matches!(self, UpsertOutcome::OutOfSequence { .. })
    }
}

/// Result of offering a stream-terminated packet to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// The source was tracked and has been evicted
    Removed,
    /// Late or duplicate termination; the source stays
    OutOfSequence { last: u8, received: u8 },
    /// No source with this CID is tracked
    Unknown,
}

/// Keyed collection of sources for a single universe
#[derive(Debug)]
pub struct SourceTable {
    sources: HashMap<Cid, Source>,
    source_limit: usize,
    sequence_window: SequenceWindow,
}

impl SourceTable {
    /// Create an empty table holding at most `source_limit` sources
    pub fn new(source_limit: usize, sequence_window: SequenceWindow) -> Self {
        Self {
            sources: HashMap::with_capacity(source_limit),
            source_limit,
            sequence_window,
        }
    }

    /// Apply a packet, creating the source if its CID is new
    ///
    /// A new CID arriving while the table is full is rejected without
    /// touching any state.
    pub fn upsert(
        &mut self,
        packet: &DataPacket,
        address: Option<SocketAddr>,
        now: Instant,
    ) -> Result<UpsertOutcome, SourceError> {
        if let Some(source) = self.sources.get_mut(&packet.cid) {
            let last = source.last_sequence();
            if !self.sequence_window.accepts(last, packet.sequence) {
                return Ok(UpsertOutcome::OutOfSequence {
                    last,
                    received: packet.sequence,
                });
            }
            source.apply(packet, address, now);
            return Ok(UpsertOutcome::Updated);
        }

        if self.is_full() {
            return Err(SourceError::LimitReached(self.source_limit));
        }

        self.sources
            .insert(packet.cid, Source::from_packet(packet, address, now));
        Ok(UpsertOutcome::Created)
    }

    /// Evict the packet's source if its termination passes the sequence check
    pub fn terminate(&mut self, packet: &DataPacket) -> TerminateOutcome {
        let Some(source) = self.sources.get(&packet.cid) else {
            return TerminateOutcome::Unknown;
        };
        let last = source.last_sequence();
        if !self.sequence_window.accepts(last, packet.sequence) {
            return TerminateOutcome::OutOfSequence {
                last,
                received: packet.sequence,
            };
        }
        self.sources.remove(&packet.cid);
        TerminateOutcome::Removed
    }

    /// Evict a source
    pub fn remove(&mut self, cid: &Cid) -> Option<Source> {
        self.sources.remove(cid)
    }

    /// Read-only view of all tracked sources, ordered by CID
    pub fn snapshot(&self) -> Vec<&Source> {
        let mut sources: Vec<&Source> = self.sources.values().collect();
        sources.sort_by_key(|source| source.cid());
        sources
    }

    /// Remove every source matching `predicate`, returning their CIDs in order
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Cid>
    where
        F: FnMut(&Source) -> bool,
    {
        let mut removed: Vec<Cid> = self
            .sources
            .values()
            .filter(|source| predicate(source))
            .map(Source::cid)
            .collect();
        removed.sort();
        for cid in &removed {
            self.sources.remove(cid);
        }
        removed
    }

    pub fn get(&self, cid: &Cid) -> Option<&Source> {
        self.sources.get(cid)
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.sources.contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Whether another new source would exceed the limit
    pub fn is_full(&self) -> bool {
        self.sources.len() >= self.source_limit
    }

    pub fn source_limit(&self) -> usize {
        self.source_limit
    }

    /// Drop every source
    pub fn clear(&mut self) {
        self.sources.clear();
    }
}
