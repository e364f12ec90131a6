use super::*;

pub fn get_optimistic_test_definition() -> ForkChoiceTestDefinition {
    let balances = vec![1; 2];
    let mut ops = vec![];

    // Build:
    //
    //          0
    //         / \
    //        1   3
    //        |
    //        2
    for (slot, root, parent_root) in [(1, 1, 0), (2, 2, 1), (1, 3, 0)] {
        ops.push(Operation::ProcessBlock {
            slot: Slot::new(slot),
            root: get_root(root),
            parent_root: get_root(parent_root),
            justified_epoch: Epoch::new(1),
            finalized_epoch: Epoch::new(1),
        });
    }

    // All blocks start optimistic.
    for root in 0..4 {
        ops.push(Operation::AssertOptimistic {
            block_root: get_root(root),
            optimistic: true,
        });
    }

    // Validating 2 validates its ancestors, up to and including the tree root.
    ops.push(Operation::SetOptimisticToValid {
        block_root: get_root(2),
    });
    for (root, optimistic) in [(0, false), (1, false), (2, false), (3, true)] {
        ops.push(Operation::AssertOptimistic {
            block_root: get_root(root),
            optimistic,
        });
    }

    // Validating 3 stops at the already valid root.
    ops.push(Operation::SetOptimisticToValid {
        block_root: get_root(3),
    });
    ops.push(Operation::AssertOptimistic {
        block_root: get_root(3),
        optimistic: false,
    });

    // Execution validity has no bearing on the head.
    ops.push(Operation::ProcessAttestation {
        validator_index: 0,
        block_root: get_root(2),
        target_epoch: Epoch::new(1),
    });
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances,
        expected_head: get_root(2),
    });

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        operations: ops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test() {
        let test = get_optimistic_test_definition();
        test.run();
    }
}
