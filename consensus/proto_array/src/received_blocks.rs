use serde_derive::{Deserialize, Serialize};
use types::{Hash256, Slot};

/// Records the slots of recently received blocks in a ring buffer of one epoch, along with the
/// highest-slot block received so far.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedBlocks {
    slots: Vec<Slot>,
    highest: Option<(Slot, Hash256)>,
}

impl ReceivedBlocks {
    pub fn new(slots_per_epoch: u64) -> Self {
        Self {
            slots: vec![Slot::new(0); std::cmp::max(slots_per_epoch, 1) as usize],
            highest: None,
        }
    }

    pub fn record(&mut self, slot: Slot, block_root: Hash256) {
        let len = self.slots.len() as u64;
        // A late block never replaces a later slot at the same position.
        if let Some(entry) = self.slots.get_mut((slot.as_u64() % len) as usize) {
            if slot > *entry {
                *entry = slot;
            }
        }

        if self
            .highest
            .map_or(true, |(highest_slot, _)| slot > highest_slot)
        {
            self.highest = Some((slot, block_root));
        }
    }

    /// Forget the highest block, e.g. because it was pruned from the tree.
    pub fn reset_highest(&mut self, highest: Option<(Slot, Hash256)>) {
        self.highest = highest;
    }

    pub fn highest_slot(&self) -> Slot {
        self.highest.map_or(Slot::new(0), |(slot, _)| slot)
    }

    pub fn highest_root(&self) -> Hash256 {
        self.highest.map_or_else(Hash256::zero, |(_, root)| root)
    }

    pub fn highest(&self) -> Option<(Slot, Hash256)> {
        self.highest
    }

    /// The number of blocks received in the epoch preceding `current_slot`.
    ///
    /// Blocks at slot 0 are never counted.
    pub fn count_last_epoch(&self, current_slot: Slot) -> u64 {
        let lower_bound = current_slot.saturating_sub(self.slots.len() as u64);
        self.slots
            .iter()
            .filter(|slot| **slot != 0 && **slot >= lower_bound)
            .count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(i: u64) -> Hash256 {
        Hash256::from_low_u64_be(i)
    }

    #[test]
    fn counts_blocks_within_one_epoch() {
        let mut received = ReceivedBlocks::new(8);

        for slot in [1, 2, 3, 5] {
            received.record(Slot::new(slot), root(slot));
        }
        assert_eq!(received.count_last_epoch(Slot::new(5)), 4);
        // Slot 10 overwrites slot 2.
        received.record(Slot::new(10), root(10));
        assert_eq!(received.count_last_epoch(Slot::new(10)), 3);
        assert_eq!(received.count_last_epoch(Slot::new(12)), 2);
        assert_eq!(received.count_last_epoch(Slot::new(100)), 0);
    }

    #[test]
    fn late_block_keeps_later_slot() {
        let mut received = ReceivedBlocks::new(8);

        received.record(Slot::new(10), root(10));
        received.record(Slot::new(2), root(2));
        assert_eq!(received.count_last_epoch(Slot::new(12)), 1);
        assert_eq!(received.highest(), Some((Slot::new(10), root(10))));
    }

    #[test]
    fn slot_zero_is_ignored() {
        let mut received = ReceivedBlocks::new(8);
        received.record(Slot::new(0), root(0));

        assert_eq!(received.count_last_epoch(Slot::new(1)), 0);
        assert_eq!(received.highest_slot(), Slot::new(0));
        assert_eq!(received.highest_root(), root(0));
    }

    #[test]
    fn tracks_highest_block() {
        let mut received = ReceivedBlocks::new(8);
        assert_eq!(received.highest_root(), Hash256::zero());

        received.record(Slot::new(4), root(4));
        received.record(Slot::new(3), root(3));
        received.record(Slot::new(4), root(44));

        assert_eq!(received.highest(), Some((Slot::new(4), root(4))));
    }
}
