use super::*;

/// Builds two branches whose blocks carry different justified epochs and checks that only blocks
/// matching the justified/finalized epochs of the store can become the head.
///
/// ```text
///          0
///         / \
///        1   2
///        |   |
///        3   4      <- justified epoch 1
///        |   |
///        5   6      <- 5 has justified epoch 2, 6 has justified epoch 1
/// ```
pub fn get_ffg_updates_test_definition() -> ForkChoiceTestDefinition {
    let balances = vec![1; 2];
    let mut ops = vec![];

    for (slot, root, parent_root, justified_epoch) in [
        (1, 1, 0, 0),
        (1, 2, 0, 0),
        (2, 3, 1, 1),
        (2, 4, 2, 1),
        (3, 5, 3, 2),
        (3, 6, 4, 1),
    ] {
        ops.push(Operation::ProcessBlock {
            slot: Slot::new(slot),
            root: get_root(root),
            parent_root: get_root(parent_root),
            justified_epoch: Epoch::new(justified_epoch),
            finalized_epoch: Epoch::new(0),
        });
    }

    // With the genesis epoch every block is viable and ties are broken by root.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(0, 0),
        finalized_checkpoint: get_checkpoint(0, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(6),
    });

    // Starting from 3 at justified epoch 1, 5 is filtered out.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 3),
        finalized_checkpoint: get_checkpoint(0, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(3),
    });

    // Starting from 0 at justified epoch 1, both branches lead to a viable head.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(0, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(6),
    });

    // Vote for 5.
    ops.push(Operation::ProcessAttestation {
        validator_index: 0,
        block_root: get_root(5),
        target_epoch: Epoch::new(2),
    });

    // At justified epoch 2 only 5 is viable.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(2, 0),
        finalized_checkpoint: get_checkpoint(0, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(5),
    });

    // At justified epoch 1 the vote for 5 still pulls the head onto the left branch, but 5 is not
    // viable so the head is its parent.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(0, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(3),
    });
    ops.push(Operation::AssertWeight {
        block_root: get_root(1),
        weight: 1,
    });

    // Vote for 6. Both branches now have equal weight.
    ops.push(Operation::ProcessAttestation {
        validator_index: 1,
        block_root: get_root(6),
        target_epoch: Epoch::new(2),
    });
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(0, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(6),
    });

    // No block has justified epoch 3.
    ops.push(Operation::InvalidFindHead {
        justified_checkpoint: get_checkpoint(3, 0),
        finalized_checkpoint: get_checkpoint(0, 0),
        justified_state_balances: balances.clone(),
    });

    // No block has finalized epoch 1.
    ops.push(Operation::InvalidFindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances.clone(),
    });

    // Back at the genesis epoch, fork choice recovers.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(0, 0),
        finalized_checkpoint: get_checkpoint(0, 0),
        justified_state_balances: balances,
        expected_head: get_root(6),
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
        let test = get_ffg_updates_test_definition();
        test.run();
    }
}
