//! Source expiry
//!
//! A periodic sweep evicts sources that have been silent for longer than the
//! data-loss timeout. A source that resumes after eviction starts over as a
//! new table entry.

use std::time::{Duration, Instant};

use crate::protocol::Cid;
use crate::sources::SourceTable;

/// Evicts silent sources from a [`SourceTable`]
#[derive(Debug, Clone, Copy)]
pub struct ExpiryMonitor {
    timeout: Duration,
    interval: Duration,
}

impl ExpiryMonitor {
    /// `interval` is the sweep period and should be shorter than `timeout`
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Remove expired sources, returning the CIDs lost on this sweep
    pub fn sweep(&self, table: &mut SourceTable, now: Instant) -> Vec<Cid> {
        let timeout = self.timeout;
        let lost = table.remove_where(|source| source.is_expired(now, timeout));
        for cid in &lost {
            tracing::debug!("Source {} timed out after {:?}", cid, timeout);
        }
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DataPacket;
    use crate::sources::SequenceWindow;

    fn packet(id: u8, sequence: u8) -> DataPacket {
        DataPacket {
            cid: Cid::from_bytes([id; 16]),
            source_name: String::new(),
            priority: 100,
            sync_address: 0,
            sequence,
            is_preview: false,
            is_terminated: false,
            force_sync: false,
            universe: 1,
            start_code: 0,
            levels: vec![1; 8],
        }
    }

    #[test]
    fn test_sweep_evicts_only_silent_sources() {
        let monitor = ExpiryMonitor::new(Duration::from_millis(2500), Duration::from_millis(250));
        let mut table = SourceTable::new(4, SequenceWindow::default());
        let start = Instant::now();

        table.upsert(&packet(1, 0), None, start).unwrap();
        table.upsert(&packet(2, 0), None, start).unwrap();
        table
            .upsert(&packet(2, 1), None, start + Duration::from_millis(2000))
            .unwrap();

        assert!(monitor.sweep(&mut table, start + Duration::from_millis(2500)).is_empty());

        let lost = monitor.sweep(&mut table, start + Duration::from_millis(3000));
        assert_eq!(lost, vec![Cid::from_bytes([1; 16])]);
        assert_eq!(table.len(), 1);

        // Already evicted sources are not reported twice
        assert!(monitor.sweep(&mut table, start + Duration::from_millis(3100)).is_empty());
    }

    #[test]
    fn test_resumed_source_gets_fresh_sequence_baseline() {
        let monitor = ExpiryMonitor::new(Duration::from_millis(100), Duration::from_millis(10));
        let mut table = SourceTable::new(4, SequenceWindow::default());
        let start = Instant::now();

        table.upsert(&packet(1, 200), None, start).unwrap();
        monitor.sweep(&mut table, start + Duration::from_millis(500));
        assert!(table.is_empty());

        // Sequence 199 would be stale against 200, but the entry is new
        let outcome = table
            .upsert(&packet(1, 199), None, start + Duration::from_millis(600))
            .unwrap();
        assert_eq!(outcome, crate::sources::UpsertOutcome::Created);
    }
}
