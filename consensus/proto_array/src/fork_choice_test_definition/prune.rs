use super::*;

pub fn get_prune_test_definition() -> ForkChoiceTestDefinition {
    let balances = vec![1; 2];
    let mut ops = vec![];

    // Build:
    //
    //          0
    //         / \
    //        1   2
    //        |   |
    //        3   4
    //        |
    //        5
    for (slot, root, parent_root) in [(1, 1, 0), (1, 2, 0), (2, 3, 1), (2, 4, 2), (3, 5, 3)] {
        ops.push(Operation::ProcessBlock {
            slot: Slot::new(slot),
            root: get_root(root),
            parent_root: get_root(parent_root),
            justified_epoch: Epoch::new(0),
            finalized_epoch: Epoch::new(0),
        });
    }

    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(0, 0),
        finalized_checkpoint: get_checkpoint(0, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(4),
    });

    // Pruning at the current root does nothing.
    ops.push(Operation::Prune {
        finalized_root: get_root(0),
        expected_len: 6,
    });

    // Finalize 1, removing 0 and the branch of 2.
    //
    //        1
    //        |
    //        3
    //        |
    //        5
    ops.push(Operation::Prune {
        finalized_root: get_root(1),
        expected_len: 3,
    });
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(0, 1),
        finalized_checkpoint: get_checkpoint(0, 1),
        justified_state_balances: balances.clone(),
        expected_head: get_root(5),
    });

    // Votes for pruned blocks carry no weight.
    ops.push(Operation::ProcessAttestation {
        validator_index: 0,
        block_root: get_root(4),
        target_epoch: Epoch::new(1),
    });
    ops.push(Operation::ProcessAttestation {
        validator_index: 1,
        block_root: get_root(5),
        target_epoch: Epoch::new(1),
    });

    // Extend the chain and fork off 3.
    //
    //        1
    //        |
    //        3
    //       / \
    //      5   6
    //      |
    //      7
    for (slot, root, parent_root) in [(3, 6, 3), (4, 7, 5)] {
        ops.push(Operation::ProcessBlock {
            slot: Slot::new(slot),
            root: get_root(root),
            parent_root: get_root(parent_root),
            justified_epoch: Epoch::new(0),
            finalized_epoch: Epoch::new(0),
        });
    }
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(0, 1),
        finalized_checkpoint: get_checkpoint(0, 1),
        justified_state_balances: balances.clone(),
        expected_head: get_root(7),
    });
    ops.push(Operation::AssertWeight {
        block_root: get_root(1),
        weight: 1,
    });

    // Finalize 5, removing 1, 3 and 6.
    ops.push(Operation::Prune {
        finalized_root: get_root(5),
        expected_len: 2,
    });
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(0, 5),
        finalized_checkpoint: get_checkpoint(0, 5),
        justified_state_balances: balances,
        expected_head: get_root(7),
    });
    ops.push(Operation::AssertWeight {
        block_root: get_root(5),
        weight: 1,
    });

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        justified_checkpoint: get_checkpoint(0, 0),
        finalized_checkpoint: get_checkpoint(0, 0),
        operations: ops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test() {
        let test = get_prune_test_definition();
        test.run();
    }
}
