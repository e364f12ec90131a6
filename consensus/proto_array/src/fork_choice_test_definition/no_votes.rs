use super::*;

pub fn get_no_votes_test_definition() -> ForkChoiceTestDefinition {
    let balances = vec![0; 16];

    let operations = vec![
        // Check that the head is the finalized block.
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(1, 0),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(0),
        },
        // Add block 2
        //
        //         0
        //        /
        //        2
        Operation::ProcessBlock {
            slot: Slot::new(1),
            root: get_root(2),
            parent_root: get_root(0),
            justified_epoch: Epoch::new(1),
            finalized_epoch: Epoch::new(1),
        },
        // Ensure the head is 2
        //
        //         0
        //        /
        //        2 <- head
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(1, 0),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(2),
        },
        // Add block 1
        //
        //         0
        //        / \
        //        2  1
        Operation::ProcessBlock {
            slot: Slot::new(1),
            root: get_root(1),
            parent_root: get_root(0),
            justified_epoch: Epoch::new(1),
            finalized_epoch: Epoch::new(1),
        },
        // Ensure the head is still 2, since it has the larger root.
        //
        //          0
        //         / \
        // head -> 2  1
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(1, 0),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(2),
        },
        // Add block 3
        //
        //         0
        //        / \
        //        2  1
        //           |
        //           3
        Operation::ProcessBlock {
            slot: Slot::new(2),
            root: get_root(3),
            parent_root: get_root(1),
            justified_epoch: Epoch::new(1),
            finalized_epoch: Epoch::new(1),
        },
        // Ensure 2 is still the head. The longer chain does not win without weight.
        //
        //          0
        //         / \
        // head -> 2  1
        //            |
        //            3
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(1, 0),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(2),
        },
        // Add block 4
        //
        //         0
        //        / \
        //        2  1
        //        |  |
        //        4  3
        Operation::ProcessBlock {
            slot: Slot::new(2),
            root: get_root(4),
            parent_root: get_root(2),
            justified_epoch: Epoch::new(1),
            finalized_epoch: Epoch::new(1),
        },
        // Ensure the head is 4.
        //
        //         0
        //        / \
        //        2  1
        //        |  |
        // head-> 4  3
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(1, 0),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(4),
        },
        // Add block 5 with a justified epoch of 2
        //
        //         0
        //        / \
        //        2  1
        //        |  |
        //        4  3
        //        |
        //        5 <- justified epoch = 2
        Operation::ProcessBlock {
            slot: Slot::new(3),
            root: get_root(5),
            parent_root: get_root(4),
            justified_epoch: Epoch::new(2),
            finalized_epoch: Epoch::new(1),
        },
        // Ensure the head is still 4 whilst the justified epoch is 1.
        //
        //         0
        //        / \
        //        2  1
        //        |  |
        // head-> 4  3
        //        |
        //        5
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(1, 0),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(4),
        },
        // Add block 6
        //
        //         0
        //        / \
        //        2  1
        //        |  |
        //        4  3
        //        |
        //        5
        //        |
        //        6 <- justified epoch = 2
        Operation::ProcessBlock {
            slot: Slot::new(4),
            root: get_root(6),
            parent_root: get_root(5),
            justified_epoch: Epoch::new(2),
            finalized_epoch: Epoch::new(1),
        },
        // Ensure the head is still 4 whilst the justified epoch is 1.
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(1, 0),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(4),
        },
        // Change the justified checkpoint to epoch 2 at block 5 and check that the head is 6.
        //
        //         0
        //        / \
        //        2  1
        //        |  |
        //        4  3
        //        |
        //        5 <- justified root
        //        |
        //        6 <- head
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(2, 5),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(6),
        },
        // Starting from the tree root also reaches 6, since 4 and 3 are no longer viable.
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(2, 0),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances.clone(),
            expected_head: get_root(6),
        },
        // Check that a justified epoch no block has is an error, rather than some arbitrary head.
        Operation::InvalidFindHead {
            justified_checkpoint: get_checkpoint(3, 5),
            finalized_checkpoint: get_checkpoint(1, 0),
            justified_state_balances: balances,
        },
    ];

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        justified_checkpoint: get_checkpoint(1, 0),
        finalized_checkpoint: get_checkpoint(1, 0),
        operations,
    }
}
