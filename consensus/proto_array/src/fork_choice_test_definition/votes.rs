use super::*;

pub fn get_votes_test_definition() -> ForkChoiceTestDefinition {
    let balances = vec![1; 2];
    let mut ops = vec![];

    // Ensure that the head starts at the finalized block.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(0),
    });

    // Add a block with a hash of 2.
    //
    //          0
    //         /
    //        2
    ops.push(Operation::ProcessBlock {
        slot: Slot::new(1),
        root: get_root(2),
        parent_root: get_root(0),
        justified_epoch: Epoch::new(1),
        finalized_epoch: Epoch::new(1),
    });

    // Add a block with a hash of 1 that comes off the genesis block (this is a fork compared
    // to the previous block).
    //
    //          0
    //         / \
    //        2   1
    ops.push(Operation::ProcessBlock {
        slot: Slot::new(1),
        root: get_root(1),
        parent_root: get_root(0),
        justified_epoch: Epoch::new(1),
        finalized_epoch: Epoch::new(1),
    });

    // Ensure that the head is 2, since it has the larger root.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(2),
    });

    // Add a vote to block 1
    //
    //          0
    //         / \
    //        2   1 <- +vote
    ops.push(Operation::ProcessAttestation {
        validator_index: 0,
        block_root: get_root(1),
        target_epoch: Epoch::new(2),
    });

    // Ensure that the head is now 1, because 1 has a vote.
    //
    //          0
    //         / \
    //        2   1 <- head
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(1),
    });

    // Add a vote to block 2
    //
    //           0
    //          / \
    // +vote-> 2   1
    ops.push(Operation::ProcessAttestation {
        validator_index: 1,
        block_root: get_root(2),
        target_epoch: Epoch::new(2),
    });

    // Ensure that the head is 2 since 1 and 2 both have a vote and 2 has the larger root.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(2),
    });

    // Add block 3.
    //
    //          0
    //         / \
    //        2   1
    //            |
    //            3
    ops.push(Operation::ProcessBlock {
        slot: Slot::new(2),
        root: get_root(3),
        parent_root: get_root(1),
        justified_epoch: Epoch::new(1),
        finalized_epoch: Epoch::new(1),
    });

    // Ensure that the head is still 2. Block 3 adds no weight to the subtree of 1.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(2),
    });

    // Move validator #0 vote from 1 to 3
    //
    //          0
    //         / \
    //        2   1 <- -vote
    //            |
    //            3 <- +vote
    ops.push(Operation::ProcessAttestation {
        validator_index: 0,
        block_root: get_root(3),
        target_epoch: Epoch::new(3),
    });

    // Ensure that the head is still 2. The subtree of 1 still has a weight of 1.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(2),
    });

    // Move validator #1 vote from 2 to 1
    //
    //          0
    //         / \
    // -vote-> 2   1 <- +vote
    //            |
    //            3
    ops.push(Operation::ProcessAttestation {
        validator_index: 1,
        block_root: get_root(1),
        target_epoch: Epoch::new(3),
    });

    // Ensure that the head is now 3.
    //
    //          0
    //         / \
    //        2   1
    //            |
    //            3 <- head
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(3),
    });
    ops.push(Operation::AssertWeight {
        block_root: get_root(0),
        weight: 2,
    });
    ops.push(Operation::AssertWeight {
        block_root: get_root(1),
        weight: 2,
    });
    ops.push(Operation::AssertWeight {
        block_root: get_root(2),
        weight: 0,
    });
    ops.push(Operation::AssertWeight {
        block_root: get_root(3),
        weight: 1,
    });

    // A vote with an older target epoch is ignored.
    ops.push(Operation::ProcessAttestation {
        validator_index: 1,
        block_root: get_root(2),
        target_epoch: Epoch::new(2),
    });
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: balances.clone(),
        expected_head: get_root(3),
    });

    // Move validator #0 vote from 3 to 2 and triple its balance.
    //
    //          0
    //         / \
    // +vote-> 2   1
    //            |
    //            3 <- -vote
    ops.push(Operation::ProcessAttestation {
        validator_index: 0,
        block_root: get_root(2),
        target_epoch: Epoch::new(4),
    });
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: vec![3, 1],
        expected_head: get_root(2),
    });

    // Give 64 validators equal balances so that the proposer boost is non-zero. Only the first
    // two have voted. Boosting 3 puts the subtree of 1 ahead.
    let boost_balances = vec![1_000; 64];
    ops.push(Operation::ProposerBoostFindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: boost_balances.clone(),
        expected_head: get_root(3),
        proposer_boost_root: get_root(3),
    });
    // 64 * 1000 / 32 slots * 50% = 1000.
    ops.push(Operation::AssertWeight {
        block_root: get_root(3),
        weight: 1_000,
    });

    // Without the boost, 1 and 2 tie and 2 wins on its root.
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: boost_balances.clone(),
        expected_head: get_root(2),
    });
    ops.push(Operation::AssertWeight {
        block_root: get_root(3),
        weight: 0,
    });

    // A vote for a block outside of the tree carries no weight.
    ops.push(Operation::ProcessAttestation {
        validator_index: 2,
        block_root: get_root(99),
        target_epoch: Epoch::new(5),
    });
    ops.push(Operation::FindHead {
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        justified_state_balances: boost_balances,
        expected_head: get_root(2),
    });
    ops.push(Operation::AssertWeight {
        block_root: get_root(0),
        weight: 2_000,
    });

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        operations: ops,
    }
}
