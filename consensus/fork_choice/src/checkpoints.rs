use types::{Checkpoint, Hash256, Slot};

/// The checkpoints of the fork choice store, guarded together by a single lock.
///
/// Justified, best-justified and finalized are "realized": they are what head resolution
/// enforces. The unrealized pair is computed eagerly from post-block states and only applied when
/// realized at an epoch boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkChoiceCheckpoints {
    pub justified: Checkpoint,
    pub best_justified: Checkpoint,
    pub finalized: Checkpoint,
    pub unrealized_justified: Checkpoint,
    pub unrealized_finalized: Checkpoint,
    /// The root of the block the tree was anchored at. Checkpoints with a zero root refer to it.
    pub origin_root: Hash256,
    /// The latest slot seen by `ForkChoice::on_tick`.
    pub time: Slot,
}

/// What changed as a result of a checkpoint update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CheckpointUpdate {
    pub justified: bool,
    pub finalized: bool,
}

impl CheckpointUpdate {
    pub fn any(&self) -> bool {
        self.justified || self.finalized
    }
}

impl ForkChoiceCheckpoints {
    pub fn new(justified: Checkpoint, finalized: Checkpoint) -> Self {
        Self {
            justified,
            best_justified: justified,
            finalized,
            unrealized_justified: justified,
            unrealized_finalized: finalized,
            origin_root: Hash256::zero(),
            time: Slot::new(0),
        }
    }

    /// Replace a zero root with the origin root.
    pub fn resolve(&self, checkpoint: Checkpoint) -> Checkpoint {
        if checkpoint.root.is_zero() {
            Checkpoint::new(checkpoint.epoch, self.origin_root)
        } else {
            checkpoint
        }
    }

    pub fn set_justified(&mut self, justified: Checkpoint) {
        if justified.epoch > self.best_justified.epoch {
            self.best_justified = justified;
        }
        self.justified = justified;
    }

    /// Apply checkpoints learned from a block: justification advances when its epoch is higher
    /// and finalization always brings its justification along.
    pub fn update(&mut self, justified: Checkpoint, finalized: Checkpoint) -> CheckpointUpdate {
        let mut update = CheckpointUpdate::default();

        if justified.epoch > self.justified.epoch {
            self.set_justified(justified);
            update.justified = true;
        }

        if finalized.epoch > self.finalized.epoch {
            self.finalized = finalized;
            self.set_justified(justified);
            update.justified = true;
            update.finalized = true;
        }

        update
    }

    /// Advance the unrealized checkpoints if `justified`/`finalized` are newer.
    pub fn update_unrealized(&mut self, justified: Checkpoint, finalized: Checkpoint) {
        if justified.epoch > self.unrealized_justified.epoch {
            self.unrealized_justified = justified;
        }
        if finalized.epoch > self.unrealized_finalized.epoch {
            self.unrealized_justified = justified;
            self.unrealized_finalized = finalized;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Epoch;

    fn checkpoint(epoch: u64, root: u64) -> Checkpoint {
        Checkpoint::new(Epoch::new(epoch), Hash256::from_low_u64_be(root))
    }

    #[test]
    fn justification_advances_best_justified() {
        let mut checkpoints = ForkChoiceCheckpoints::new(checkpoint(1, 1), checkpoint(0, 0));

        let update = checkpoints.update(checkpoint(2, 2), checkpoint(0, 0));
        assert_eq!(
            update,
            CheckpointUpdate {
                justified: true,
                finalized: false
            }
        );
        assert_eq!(checkpoints.justified, checkpoint(2, 2));
        assert_eq!(checkpoints.best_justified, checkpoint(2, 2));

        assert!(!checkpoints.update(checkpoint(1, 3), checkpoint(0, 0)).any());
        assert_eq!(checkpoints.justified, checkpoint(2, 2));
    }

    #[test]
    fn finalization_forces_justification() {
        let mut checkpoints = ForkChoiceCheckpoints::new(checkpoint(3, 3), checkpoint(1, 1));

        let update = checkpoints.update(checkpoint(2, 2), checkpoint(2, 2));
        assert!(update.finalized);
        assert_eq!(checkpoints.finalized, checkpoint(2, 2));
        assert_eq!(checkpoints.justified, checkpoint(2, 2));
        assert_eq!(checkpoints.best_justified, checkpoint(3, 3));
    }

    #[test]
    fn finalization_never_leaves_best_justified_behind() {
        let mut checkpoints = ForkChoiceCheckpoints::new(checkpoint(1, 1), checkpoint(0, 0));

        // Both advance in one update and best justified follows.
        let update = checkpoints.update(checkpoint(4, 4), checkpoint(3, 3));
        assert!(update.justified && update.finalized);
        assert_eq!(checkpoints.justified, checkpoint(4, 4));
        assert_eq!(checkpoints.best_justified, checkpoint(4, 4));
    }

    #[test]
    fn unrealized_only_advances() {
        let mut checkpoints = ForkChoiceCheckpoints::new(checkpoint(1, 1), checkpoint(0, 0));

        checkpoints.update_unrealized(checkpoint(3, 3), checkpoint(1, 1));
        checkpoints.update_unrealized(checkpoint(2, 2), checkpoint(0, 0));
        assert_eq!(checkpoints.unrealized_justified, checkpoint(3, 3));
        assert_eq!(checkpoints.unrealized_finalized, checkpoint(1, 1));

        // Realized checkpoints are untouched.
        assert_eq!(checkpoints.justified, checkpoint(1, 1));
    }

    #[test]
    fn zero_root_resolves_to_origin() {
        let mut checkpoints = ForkChoiceCheckpoints::new(checkpoint(0, 0), checkpoint(0, 0));
        checkpoints.origin_root = Hash256::repeat_byte(7);

        assert_eq!(
            checkpoints.resolve(Checkpoint::new(Epoch::new(0), Hash256::zero())).root,
            Hash256::repeat_byte(7)
        );
        assert_eq!(checkpoints.resolve(checkpoint(1, 5)), checkpoint(1, 5));
    }
}
