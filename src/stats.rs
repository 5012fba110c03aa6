//! Receive statistics
//!
//! Silently dropped datagrams are never reported as events; these counters
//! are the only record of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared between the receive path and readers
#[derive(Debug, Default)]
pub struct ReceiverStats {
    datagrams_received: AtomicU64,
    bytes_received: AtomicU64,
    malformed_packets: AtomicU64,
    ignored_packets: AtomicU64,
    filtered_packets: AtomicU64,
    out_of_sequence: AtomicU64,
    packets_accepted: AtomicU64,
    sources_rejected: AtomicU64,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_datagram(&self, bytes: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Alternate start code or foreign universe
    pub fn record_ignored(&self) {
        self.ignored_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Preview data or excluded CID
    pub fn record_filtered(&self) {
        self.filtered_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_sequence(&self) {
        self.out_of_sequence.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.packets_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_rejected(&self) {
        self.sources_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            malformed_packets: self.malformed_packets.load(Ordering::Relaxed),
            ignored_packets: self.ignored_packets.load(Ordering::Relaxed),
            filtered_packets: self.filtered_packets.load(Ordering::Relaxed),
            out_of_sequence: self.out_of_sequence.load(Ordering::Relaxed),
            packets_accepted: self.packets_accepted.load(Ordering::Relaxed),
            sources_rejected: self.sources_rejected.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        for counter in [
            &self.datagrams_received,
            &self.bytes_received,
            &self.malformed_packets,
            &self.ignored_packets,
            &self.filtered_packets,
            &self.out_of_sequence,
            &self.packets_accepted,
            &self.sources_rejected,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Thread-safe handle to receiver statistics
pub type SharedStats = Arc<ReceiverStats>;

/// Receiver statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub malformed_packets: u64,
    pub ignored_packets: u64,
    pub filtered_packets: u64,
    pub out_of_sequence: u64,
    pub packets_accepted: u64,
    pub sources_rejected: u64,
}

impl StatsSnapshot {
    /// Fraction of datagrams that were accepted into the source table
    pub fn acceptance_rate(&self) -> f32 {
        if self.datagrams_received == 0 {
            0.0
        } else {
            self.packets_accepted as f32 / self.datagrams_received as f32
        }
    }
}
