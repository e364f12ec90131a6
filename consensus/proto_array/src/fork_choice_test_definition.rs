mod ffg_updates;
mod no_votes;
mod optimistic;
mod prune;
mod votes;

use crate::proto_array_fork_choice::{Block, ProtoArrayForkChoice};
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;
use types::{ChainSpec, Checkpoint, Epoch, ExecutionBlockHash, Hash256, Slot};

pub use ffg_updates::*;
pub use no_votes::*;
pub use optimistic::*;
pub use prune::*;
pub use votes::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    FindHead {
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: Vec<u64>,
        expected_head: Hash256,
    },
    ProposerBoostFindHead {
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: Vec<u64>,
        expected_head: Hash256,
        proposer_boost_root: Hash256,
    },
    InvalidFindHead {
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: Vec<u64>,
    },
    ProcessBlock {
        slot: Slot,
        root: Hash256,
        parent_root: Hash256,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    },
    ProcessAttestation {
        validator_index: usize,
        block_root: Hash256,
        target_epoch: Epoch,
    },
    Prune {
        finalized_root: Hash256,
        expected_len: usize,
    },
    SetOptimisticToValid {
        block_root: Hash256,
    },
    AssertOptimistic {
        block_root: Hash256,
        optimistic: bool,
    },
    AssertWeight {
        block_root: Hash256,
        weight: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkChoiceTestDefinition {
    pub finalized_block_slot: Slot,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub operations: Vec<Operation>,
}

impl ForkChoiceTestDefinition {
    pub fn run(self) {
        let mut spec = ChainSpec::mainnet();
        spec.proposer_score_boost = Some(50);

        let mut fork_choice = ProtoArrayForkChoice::new(spec.slots_per_epoch);
        fork_choice
            .process_block(Block {
                slot: self.finalized_block_slot,
                root: self.finalized_checkpoint.root,
                parent_root: None,
                payload_hash: ExecutionBlockHash::zero(),
                timestamp: Duration::from_secs(0),
                justified_epoch: self.justified_checkpoint.epoch,
                finalized_epoch: self.finalized_checkpoint.epoch,
                unrealized_justified_epoch: self.justified_checkpoint.epoch,
                unrealized_finalized_epoch: self.finalized_checkpoint.epoch,
                optimistic: true,
            })
            .expect("should create fork choice struct");

        for (op_index, op) in self.operations.into_iter().enumerate() {
            match op.clone() {
                Operation::FindHead {
                    justified_checkpoint,
                    finalized_checkpoint,
                    justified_state_balances,
                    expected_head,
                } => {
                    fork_choice.set_proposer_boost_root(Hash256::zero());
                    let head = fork_choice
                        .find_head(
                            justified_checkpoint,
                            finalized_checkpoint,
                            &justified_state_balances,
                            &spec,
                        )
                        .unwrap_or_else(|e| {
                            panic!("find_head op at index {} returned error {:?}", op_index, e)
                        });

                    assert_eq!(
                        head, expected_head,
                        "Operation at index {} failed head check. Operation: {:?}",
                        op_index, op
                    );
                }
                Operation::ProposerBoostFindHead {
                    justified_checkpoint,
                    finalized_checkpoint,
                    justified_state_balances,
                    expected_head,
                    proposer_boost_root,
                } => {
                    fork_choice.set_proposer_boost_root(proposer_boost_root);
                    let head = fork_choice
                        .find_head(
                            justified_checkpoint,
                            finalized_checkpoint,
                            &justified_state_balances,
                            &spec,
                        )
                        .unwrap_or_else(|e| {
                            panic!("find_head op at index {} returned error {:?}", op_index, e)
                        });
                    fork_choice.set_proposer_boost_root(Hash256::zero());

                    assert_eq!(
                        head, expected_head,
                        "Operation at index {} failed head check. Operation: {:?}",
                        op_index, op
                    );
                }
                Operation::InvalidFindHead {
                    justified_checkpoint,
                    finalized_checkpoint,
                    justified_state_balances,
                } => {
                    fork_choice.set_proposer_boost_root(Hash256::zero());
                    let result = fork_choice.find_head(
                        justified_checkpoint,
                        finalized_checkpoint,
                        &justified_state_balances,
                        &spec,
                    );

                    assert!(
                        matches!(result, Err(ref e) if e.is_no_viable_head()),
                        "Operation at index {} should find no viable head, got {:?}. Operation: {:?}",
                        op_index,
                        result,
                        op
                    );
                }
                Operation::ProcessBlock {
                    slot,
                    root,
                    parent_root,
                    justified_epoch,
                    finalized_epoch,
                } => {
                    let block = Block {
                        slot,
                        root,
                        parent_root: Some(parent_root),
                        payload_hash: ExecutionBlockHash::from_root(root),
                        timestamp: Duration::from_secs(0),
                        justified_epoch,
                        finalized_epoch,
                        unrealized_justified_epoch: justified_epoch,
                        unrealized_finalized_epoch: finalized_epoch,
                        // All blocks are imported optimistically.
                        optimistic: true,
                    };
                    fork_choice.process_block(block).unwrap_or_else(|e| {
                        panic!(
                            "process_block op at index {} returned error: {:?}",
                            op_index, e
                        )
                    });
                }
                Operation::ProcessAttestation {
                    validator_index,
                    block_root,
                    target_epoch,
                } => {
                    fork_choice
                        .process_attestation(validator_index, block_root, target_epoch)
                        .unwrap_or_else(|e| {
                            panic!(
                                "process_attestation op at index {} returned error: {:?}",
                                op_index, e
                            )
                        });
                }
                Operation::Prune {
                    finalized_root,
                    expected_len,
                } => {
                    fork_choice.prune(finalized_root).unwrap_or_else(|e| {
                        panic!("prune op at index {} returned error: {:?}", op_index, e)
                    });

                    assert_eq!(
                        fork_choice.len(),
                        expected_len,
                        "Prune op at index {} failed with {} instead of {}",
                        op_index,
                        fork_choice.len(),
                        expected_len
                    );
                    assert!(
                        fork_choice.contains_block(&finalized_root),
                        "Prune op at index {} removed the finalized block",
                        op_index
                    );
                }
                Operation::SetOptimisticToValid { block_root } => fork_choice
                    .core_proto_array_mut()
                    .set_optimistic_to_valid(block_root)
                    .unwrap_or_else(|e| {
                        panic!(
                            "set_optimistic_to_valid op at index {} returned error: {:?}",
                            op_index, e
                        )
                    }),
                Operation::AssertOptimistic {
                    block_root,
                    optimistic,
                } => assert_eq!(
                    fork_choice.is_optimistic(&block_root),
                    Some(optimistic),
                    "Operation at index {} failed optimistic check",
                    op_index
                ),
                Operation::AssertWeight { block_root, weight } => assert_eq!(
                    fork_choice.get_weight(&block_root),
                    Some(weight),
                    "Operation at index {} failed weight check",
                    op_index
                ),
            }
        }
    }
}

/// Gives a root that is not the zero hash (unless i is `usize::max_value)`.
fn get_root(i: u64) -> Hash256 {
    Hash256::from_low_u64_be(i + 1)
}

/// Gives a checkpoint with the given `epoch` and a root that is not the zero hash.
fn get_checkpoint(epoch: u64, root: u64) -> Checkpoint {
    Checkpoint {
        epoch: Epoch::new(epoch),
        root: get_root(root),
    }
}
