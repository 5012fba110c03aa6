//! Highest-Takes-Precedence merge
//!
//! Each slot is resolved independently: among online sources that have set
//! the slot, the highest priority wins, and within that priority the highest
//! level wins. Slots nobody has set resolve to 0.

use serde::{Deserialize, Serialize};

use crate::error::ReceiverError;
use crate::protocol::{Cid, DMX_SLOTS};
use crate::sources::Source;

/// Merged output for one universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedResult {
    /// Resolved value of slots 1-512 (index 0 is address 1)
    pub levels: Vec<u8>,
    /// Source that owns each slot, `None` where no source has set it
    pub winners: Vec<Option<Cid>>,
    /// Every online source, ordered by CID
    pub active_sources: Vec<Cid>,
    pub source_count: usize,
}

impl MergedResult {
    /// Result with no contributing sources
    pub fn empty() -> Self {
        Self {
            levels: vec![0; DMX_SLOTS],
            winners: vec![None; DMX_SLOTS],
            active_sources: Vec::new(),
            source_count: 0,
        }
    }

    /// Value at a 1-based DMX address; 0 outside 1-512
    pub fn channel_value(&self, address: u16) -> u8 {
        match address {
            1..=512 => self.levels[address as usize - 1],
            _ => 0,
        }
    }

    /// Value at a 1-based address as a fraction of full
    pub fn channel_percentage(&self, address: u16) -> f64 {
        self.channel_value(address) as f64 / 255.0
    }

    /// Levels for an address range
    pub fn range_levels(&self, range: AddressRange) -> &[u8] {
        &self.levels[range.start as usize - 1..range.end as usize]
    }
}

/// Merge a snapshot of online sources
pub fn merge(sources: &[&Source]) -> MergedResult {
    let mut levels = vec![0u8; DMX_SLOTS];
    let mut winners: Vec<Option<Cid>> = vec![None; DMX_SLOTS];
    // (priority, level) of the current winner per slot
    let mut best: Vec<Option<(u8, u8)>> = vec![None; DMX_SLOTS];

    for source in sources {
        let priority = source.priority();
        let cid = source.cid();
        for (slot, &level) in source.levels()[..source.slot_count()].iter().enumerate() {
            let candidate = (priority, level);
            let wins = match best[slot] {
                None => true,
                Some(current) if candidate > current => true,
                // Identical contributions: lowest CID owns the slot so the
                // result does not depend on snapshot order
                Some(current) if candidate == current => {
                    winners[slot].map_or(true, |owner| cid < owner)
                }
                Some(_) => false,
            };
            if wins {
                best[slot] = Some(candidate);
                levels[slot] = level;
                winners[slot] = Some(cid);
            }
        }
    }

    let mut active_sources: Vec<Cid> = sources.iter().map(|source| source.cid()).collect();
    active_sources.sort();
    active_sources.dedup();
    let source_count = active_sources.len();

    MergedResult {
        levels,
        winners,
        active_sources,
        source_count,
    }
}

/// Inclusive range of 1-based DMX addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAddressRange")]
pub struct AddressRange {
    start: u16,
    end: u16,
}

/// Unvalidated wire form of [`AddressRange`]
#[derive(Deserialize)]
struct RawAddressRange {
    start: u16,
    end: u16,
}

impl TryFrom<RawAddressRange> for AddressRange {
    type Error = ReceiverError;

    fn try_from(raw: RawAddressRange) -> Result<Self, Self::Error> {
        AddressRange::new(raw.start, raw.end)
    }
}

impl AddressRange {
    /// Every address in the universe
    pub const FULL: AddressRange = AddressRange { start: 1, end: 512 };

    /// Create a range; both ends must lie in 1-512 with `start <= end`
    pub fn new(start: u16, end: u16) -> Result<Self, ReceiverError> {
        if start == 0 || end as usize > DMX_SLOTS || start > end {
            return Err(ReceiverError::InvalidAddressRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn contains(&self, address: u16) -> bool {
        (self.start..=self.end).contains(&address)
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn addresses(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl Default for AddressRange {
    fn default() -> Self {
        Self::FULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DataPacket;
    use proptest::prelude::*;
    use std::time::Instant;

    fn source(id: u8, priority: u8, levels: Vec<u8>) -> Source {
        let packet = DataPacket {
            cid: Cid::from_bytes([id; 16]),
            source_name: String::new(),
            priority,
            sync_address: 0,
            sequence: 0,
            is_preview: false,
            is_terminated: false,
            force_sync: false,
            universe: 1,
            start_code: 0,
            levels,
        };
        Source::from_packet(&packet, None, Instant::now())
    }

    fn sparse(entries: &[(usize, u8)]) -> Vec<u8> {
        let len = entries.iter().map(|(slot, _)| slot + 1).max().unwrap_or(0);
        let mut levels = vec![0; len];
        for &(slot, level) in entries {
            levels[slot] = level;
        }
        levels
    }

    #[test]
    fn test_empty_merge() {
        let result = merge(&[]);
        assert_eq!(result, MergedResult::empty());
    }

    #[test]
    fn test_disjoint_sources() {
        let a = source(1, 100, vec![10, 20]);
        let mut b_levels = vec![0; 4];
        b_levels[2] = 30;
        b_levels[3] = 40;
        // b only meaningfully owns slots 2 and 3, but also sets 0 and 1 to zero
        let b = source(2, 100, b_levels);

        let result = merge(&[&a, &b]);
        assert_eq!(&result.levels[..4], &[10, 20, 30, 40]);
        assert_eq!(result.winners[0], Some(a.cid()));
        assert_eq!(result.winners[3], Some(b.cid()));
        assert_eq!(result.winners[4], None);
        assert_eq!(result.source_count, 2);
        assert_eq!(result.active_sources, vec![a.cid(), b.cid()]);
    }

    #[test]
    fn test_priority_beats_level() {
        let low = source(1, 100, vec![255]);
        let high = source(2, 150, vec![10]);

        for order in [[&low, &high], [&high, &low]] {
            let result = merge(&order);
            assert_eq!(result.levels[0], 10);
            assert_eq!(result.winners[0], Some(high.cid()));
        }
    }

    #[test]
    fn test_highest_level_wins_at_equal_priority() {
        let a = source(1, 100, vec![50]);
        let b = source(2, 100, vec![200]);

        for order in [[&a, &b], [&b, &a]] {
            let result = merge(&order);
            assert_eq!(result.levels[0], 200);
            assert_eq!(result.winners[0], Some(b.cid()));
        }
    }

    #[test]
    fn test_low_priority_source_still_active() {
        let low = source(1, 50, vec![1]);
        let high = source(2, 200, vec![2]);
        let result = merge(&[&low, &high]);
        assert_eq!(result.source_count, 2);
        assert!(result.winners.iter().all(|w| *w != Some(low.cid())));
    }

    #[test]
    fn test_unset_slots_fall_back_to_lower_priority() {
        // High priority source only covers slot 0
        let high = source(1, 200, vec![5]);
        let low = source(2, 100, sparse(&[(0, 90), (1, 80)]));
        let result = merge(&[&high, &low]);
        assert_eq!(result.levels[0], 5);
        assert_eq!(result.levels[1], 80);
    }

    #[test]
    fn test_address_helpers() {
        let a = source(1, 100, sparse(&[(0, 255), (9, 51)]));
        let result = merge(&[&a]);
        assert_eq!(result.channel_value(1), 255);
        assert_eq!(result.channel_value(0), 0);
        assert_eq!(result.channel_value(513), 0);
        assert!((result.channel_percentage(10) - 0.2).abs() < f64::EPSILON);

        let range = AddressRange::new(1, 10).unwrap();
        assert_eq!(range.len(), 10);
        assert_eq!(result.range_levels(range).len(), 10);
        assert_eq!(result.range_levels(range)[9], 51);
        assert_eq!(result.range_levels(AddressRange::FULL).len(), 512);
    }

    #[test]
    fn test_invalid_address_range() {
        assert!(AddressRange::new(0, 10).is_err());
        assert!(AddressRange::new(10, 9).is_err());
        assert!(AddressRange::new(1, 513).is_err());
        assert!(AddressRange::new(512, 512).is_ok());
    }

    #[test]
    fn test_address_range_deserialize_validates() {
        let range: AddressRange = serde_json::from_str(r#"{"start":10,"end":20}"#).unwrap();
        assert_eq!(range, AddressRange::new(10, 20).unwrap());

        assert!(serde_json::from_str::<AddressRange>(r#"{"start":0,"end":5}"#).is_err());
        assert!(serde_json::from_str::<AddressRange>(r#"{"start":9,"end":3}"#).is_err());
        assert!(serde_json::from_str::<AddressRange>(r#"{"start":1,"end":600}"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_merge_is_order_independent(
            specs in prop::collection::vec((0u8..=200, prop::collection::vec(any::<u8>(), 0..16)), 1..6)
        ) {
            let sources: Vec<Source> = specs
                .into_iter()
                .enumerate()
                .map(|(i, (priority, levels))| source(i as u8 + 1, priority, levels))
                .collect();
            let forward: Vec<&Source> = sources.iter().collect();
            let reverse: Vec<&Source> = sources.iter().rev().collect();
            prop_assert_eq!(merge(&forward), merge(&reverse));
        }

        #[test]
        fn prop_winner_has_max_priority(
            specs in prop::collection::vec((0u8..=200, any::<u8>()), 1..6)
        ) {
            let sources: Vec<Source> = specs
                .iter()
                .enumerate()
                .map(|(i, &(priority, level))| source(i as u8 + 1, priority, vec![level]))
                .collect();
            let refs: Vec<&Source> = sources.iter().collect();
            let result = merge(&refs);

            let top = specs.iter().map(|(p, _)| *p).max().unwrap();
            let expected = specs.iter().filter(|(p, _)| *p == top).map(|(_, l)| *l).max().unwrap();
            prop_assert_eq!(result.levels[0], expected);
        }
    }
}
