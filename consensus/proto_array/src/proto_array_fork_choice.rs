use crate::abort::AbortSignal;
use crate::error::{CorruptTree, Error};
use crate::proto_array::{calculate_committee_fraction, ProtoArray, ProtoNode};
use crate::received_blocks::ReceivedBlocks;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use types::{ChainSpec, Checkpoint, Epoch, ExecutionBlockHash, Hash256, Slot};

#[derive(Default, PartialEq, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VoteTracker {
    pub root: Hash256,
    pub epoch: Epoch,
}

/// A Vec-wrapper which will grow to match any request.
///
/// E.g., a `get` or `insert` to an out-of-bounds element will cause the Vec to grow (using
/// Default) to the smallest size required to fulfill the request.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct ElasticList<T>(pub Vec<T>);

impl<T> ElasticList<T>
where
    T: Default,
{
    /// Grow to hold index `i`. Returns `None` if the required length overflows or cannot be
    /// allocated.
    fn ensure(&mut self, i: usize) -> Option<()> {
        let len = i.checked_add(1)?;
        if let Some(additional) = len.checked_sub(self.0.len()).filter(|n| *n > 0) {
            self.0.try_reserve(additional).ok()?;
            self.0.resize_with(len, Default::default);
        }
        Some(())
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        self.ensure(i)?;
        self.0.get_mut(i)
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        self.0.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

/// A block that is to be applied to the fork choice, or a snapshot of one already applied.
///
/// A simplified version of `ProtoNode` without the tree links or weights.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub slot: Slot,
    pub root: Hash256,
    /// `None` for the root of the tree.
    pub parent_root: Option<Hash256>,
    pub payload_hash: ExecutionBlockHash,
    pub timestamp: Duration,
    pub justified_epoch: Epoch,
    pub finalized_epoch: Epoch,
    pub unrealized_justified_epoch: Epoch,
    pub unrealized_finalized_epoch: Epoch,
    pub optimistic: bool,
}

/// The fork choice tree together with the latest message of each validator, the balances used
/// for the last weight update and the received-blocks bookkeeping.
///
/// Not internally synchronized; the caller wraps it in a lock.
#[derive(PartialEq, Debug, Clone)]
pub struct ProtoArrayForkChoice {
    pub(crate) proto_array: ProtoArray,
    pub(crate) votes: ElasticList<VoteTracker>,
    pub(crate) balances: Vec<u64>,
    pub(crate) proposer_boost_root: Hash256,
    pub(crate) received_blocks: ReceivedBlocks,
}

impl ProtoArrayForkChoice {
    /// Create an empty fork choice. The first block processed becomes the root of the tree.
    pub fn new(slots_per_epoch: u64) -> Self {
        Self {
            proto_array: ProtoArray::default(),
            votes: ElasticList::default(),
            balances: vec![],
            proposer_boost_root: Hash256::zero(),
            received_blocks: ReceivedBlocks::new(slots_per_epoch),
        }
    }

    /// Insert `block` into the tree, returning a snapshot of the stored node.
    ///
    /// Returns the existing node, unchanged, if the block is already known.
    pub fn process_block(&mut self, block: Block) -> Result<Block, Error> {
        let slot = block.slot;
        let block_root = block.root;
        let is_new = !self.contains_block(&block_root);
        let index = self.proto_array.on_block(block)?;
        if is_new {
            self.received_blocks.record(slot, block_root);
        }

        self.proto_array
            .nodes
            .get(index)
            .map(|node| self.node_to_block(node))
            .ok_or_else(|| CorruptTree::InvalidNodeIndex(index).into())
    }

    /// Record the latest message of `validator_index`. Messages with a target epoch lower than
    /// or equal to a previous message are ignored.
    ///
    /// Fails without recording anything if the vote tracker cannot grow to `validator_index`.
    pub fn process_attestation(
        &mut self,
        validator_index: usize,
        block_root: Hash256,
        target_epoch: Epoch,
    ) -> Result<(), Error> {
        let vote = self
            .votes
            .get_mut(validator_index)
            .ok_or(Error::InvalidValidatorIndex(validator_index))?;

        if target_epoch > vote.epoch || *vote == VoteTracker::default() {
            vote.root = block_root;
            vote.epoch = target_epoch;
        }

        Ok(())
    }

    pub fn set_proposer_boost_root(&mut self, proposer_boost_root: Hash256) {
        self.proposer_boost_root = proposer_boost_root;
    }

    pub fn proposer_boost_root(&self) -> Hash256 {
        self.proposer_boost_root
    }

    /// Recompute the balance of every node from the latest messages and `new_balances` (indexed
    /// by validator), then recompute weights and best descendants.
    ///
    /// The node holding the proposer boost receives an extra committee fraction of
    /// `spec.proposer_score_boost` percent.
    pub fn update_balances(&mut self, new_balances: &[u64], spec: &ChainSpec) -> Result<(), Error> {
        self.update_balances_with_signal(new_balances, spec, None)
    }

    pub fn update_balances_with_signal(
        &mut self,
        new_balances: &[u64],
        spec: &ChainSpec,
        signal: Option<&AbortSignal>,
    ) -> Result<(), Error> {
        let mut node_balances =
            compute_node_balances(&self.proto_array.indices, &self.votes, new_balances)?;

        if let (Some(proposer_score_boost), Some(boost_index)) = (
            spec.proposer_score_boost,
            self.proto_array.indices.get(&self.proposer_boost_root),
        ) {
            if !self.proposer_boost_root.is_zero() {
                let proposer_score = calculate_committee_fraction(
                    new_balances,
                    proposer_score_boost,
                    spec.slots_per_epoch,
                )
                .ok_or(Error::ProposerBoostOverflow(*boost_index))?;
                let balance = node_balances
                    .get_mut(*boost_index)
                    .ok_or(CorruptTree::InvalidNodeIndex(*boost_index))?;
                *balance = balance
                    .checked_add(proposer_score)
                    .ok_or(Error::BalanceOverflow(*boost_index))?;
            }
        }

        self.proto_array
            .apply_balances_with_signal(node_balances, signal)?;
        self.balances = new_balances.to_vec();

        Ok(())
    }

    /// Update balances and the viability filter, then find the head. Mostly useful for tests.
    pub fn find_head(
        &mut self,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: &[u64],
        spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        if self.proto_array.justified_epoch != justified_checkpoint.epoch
            || self.proto_array.finalized_epoch != finalized_checkpoint.epoch
        {
            self.proto_array
                .update_best_descendants(justified_checkpoint.epoch, finalized_checkpoint.epoch)?;
        }

        self.update_balances(justified_state_balances, spec)?;

        self.proto_array.find_head(&justified_checkpoint)
    }

    /// Prune the tree to `finalized_root`, returning the removed roots.
    pub fn prune(&mut self, finalized_root: Hash256) -> Result<Vec<Hash256>, Error> {
        self.prune_with_signal(finalized_root, None)
    }

    pub fn prune_with_signal(
        &mut self,
        finalized_root: Hash256,
        signal: Option<&AbortSignal>,
    ) -> Result<Vec<Hash256>, Error> {
        let pruned = self.proto_array.prune_with_signal(finalized_root, signal)?;

        let highest_root = self.received_blocks.highest_root();
        if !pruned.is_empty() && !self.proto_array.indices.contains_key(&highest_root) {
            let highest = self
                .proto_array
                .nodes
                .iter()
                .fold(None, |highest: Option<&ProtoNode>, node| match highest {
                    Some(highest) if highest.slot >= node.slot => Some(highest),
                    _ => Some(node),
                })
                .map(|node| (node.slot, node.root));
            self.received_blocks.reset_highest(highest);
        }

        Ok(pruned)
    }

    pub fn len(&self) -> usize {
        self.proto_array.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proto_array.nodes.is_empty()
    }

    pub fn contains_block(&self, block_root: &Hash256) -> bool {
        self.proto_array.indices.contains_key(block_root)
    }

    pub fn get_block(&self, block_root: &Hash256) -> Option<Block> {
        self.proto_array
            .get_node(block_root)
            .map(|node| self.node_to_block(node))
    }

    fn node_to_block(&self, node: &ProtoNode) -> Block {
        let parent_root = node
            .parent
            .and_then(|i| self.proto_array.nodes.get(i))
            .map(|parent| parent.root);

        Block {
            slot: node.slot,
            root: node.root,
            parent_root,
            payload_hash: node.payload_hash,
            timestamp: node.timestamp,
            justified_epoch: node.justified_epoch,
            finalized_epoch: node.finalized_epoch,
            unrealized_justified_epoch: node.unrealized_justified_epoch,
            unrealized_finalized_epoch: node.unrealized_finalized_epoch,
            optimistic: node.optimistic,
        }
    }

    pub fn get_weight(&self, block_root: &Hash256) -> Option<u64> {
        self.proto_array
            .get_node(block_root)
            .map(|node| node.weight)
    }

    pub fn is_optimistic(&self, block_root: &Hash256) -> Option<bool> {
        self.proto_array
            .get_node(block_root)
            .map(|node| node.optimistic)
    }

    pub fn latest_message(&self, validator_index: usize) -> Option<(Hash256, Epoch)> {
        self.votes
            .get(validator_index)
            .filter(|vote| **vote != VoteTracker::default())
            .map(|vote| (vote.root, vote.epoch))
    }

    pub fn highest_received_block_slot(&self) -> Slot {
        self.received_blocks.highest_slot()
    }

    pub fn highest_received_block_root(&self) -> Hash256 {
        self.received_blocks.highest_root()
    }

    pub fn received_blocks_last_epoch(&self, current_slot: Slot) -> u64 {
        self.received_blocks.count_last_epoch(current_slot)
    }

    /// The validator balances used by the last weight update.
    pub fn balances(&self) -> &[u64] {
        &self.balances
    }

    /// Returns a reference to the core `ProtoArray` struct.
    pub fn core_proto_array(&self) -> &ProtoArray {
        &self.proto_array
    }

    /// Returns a mutable reference to the core `ProtoArray` struct.
    pub fn core_proto_array_mut(&mut self) -> &mut ProtoArray {
        &mut self.proto_array
    }
}

/// Returns the balance attributed to each node in `0..indices.len()`: the sum of the balances of
/// the validators whose latest message points at it.
///
/// Validators missing from `balances` have a balance of zero. Votes for the zero hash or for
/// roots outside of the tree (e.g. pre-finalization) are ignored.
fn compute_node_balances(
    indices: &HashMap<Hash256, usize>,
    votes: &ElasticList<VoteTracker>,
    balances: &[u64],
) -> Result<Vec<u64>, Error> {
    let mut node_balances = vec![0_u64; indices.len()];

    for (val_index, vote) in votes.iter().enumerate() {
        if vote.root == Hash256::zero() {
            continue;
        }

        let balance = balances.get(val_index).copied().unwrap_or(0);
        if balance == 0 {
            continue;
        }

        if let Some(node_index) = indices.get(&vote.root).copied() {
            let node_balance = node_balances
                .get_mut(node_index)
                .ok_or(CorruptTree::InvalidNodeIndex(node_index))?;
            *node_balance = node_balance
                .checked_add(balance)
                .ok_or(Error::BalanceOverflow(node_index))?;
        }
    }

    Ok(node_balances)
}

#[cfg(test)]
mod test_compute_node_balances {
    use super::*;

    /// Gives a hash that is not the zero hash (unless i is `usize::max_value)`.
    fn hash_from_index(i: usize) -> Hash256 {
        Hash256::from_low_u64_be(i as u64 + 1)
    }

    fn vote(root: Hash256) -> VoteTracker {
        VoteTracker {
            root,
            epoch: Epoch::new(0),
        }
    }

    #[test]
    fn zero_hash() {
        let validator_count: usize = 16;

        let mut indices = HashMap::new();
        let mut votes = ElasticList::default();
        let mut balances = vec![];

        for i in 0..validator_count {
            indices.insert(hash_from_index(i), i);
            votes.0.push(vote(Hash256::zero()));
            balances.push(42);
        }

        let node_balances =
            compute_node_balances(&indices, &votes, &balances).expect("should compute balances");

        assert_eq!(
            node_balances,
            vec![0; validator_count],
            "balances should all be zero"
        );
    }

    #[test]
    fn all_voted_the_same() {
        const BALANCE: u64 = 42;

        let validator_count: usize = 16;

        let mut indices = HashMap::new();
        let mut votes = ElasticList::default();
        let mut balances = vec![];

        for i in 0..validator_count {
            indices.insert(hash_from_index(i), i);
            votes.0.push(vote(hash_from_index(0)));
            balances.push(BALANCE);
        }

        let node_balances =
            compute_node_balances(&indices, &votes, &balances).expect("should compute balances");

        for (i, balance) in node_balances.into_iter().enumerate() {
            if i == 0 {
                assert_eq!(
                    balance,
                    BALANCE * validator_count as u64,
                    "zero'th root should have all the balance"
                );
            } else {
                assert_eq!(balance, 0, "all other balances should be zero");
            }
        }
    }

    #[test]
    fn different_votes() {
        const BALANCE: u64 = 42;

        let validator_count: usize = 16;

        let mut indices = HashMap::new();
        let mut votes = ElasticList::default();
        let mut balances = vec![];

        for i in 0..validator_count {
            indices.insert(hash_from_index(i), i);
            votes.0.push(vote(hash_from_index(i)));
            balances.push(BALANCE);
        }

        let node_balances =
            compute_node_balances(&indices, &votes, &balances).expect("should compute balances");

        assert_eq!(
            node_balances,
            vec![BALANCE; validator_count],
            "each root should have the same balance"
        );
    }

    #[test]
    fn moving_votes() {
        const BALANCE: u64 = 42;

        let mut indices = HashMap::new();
        indices.insert(hash_from_index(0), 0);
        indices.insert(hash_from_index(1), 1);

        let mut fork_choice = ProtoArrayForkChoice::new(8);

        // Both validators vote for block 0, then move to block 1 in a later epoch.
        fork_choice
            .process_attestation(0, hash_from_index(0), Epoch::new(1))
            .unwrap();
        fork_choice
            .process_attestation(1, hash_from_index(0), Epoch::new(1))
            .unwrap();
        fork_choice
            .process_attestation(0, hash_from_index(1), Epoch::new(2))
            .unwrap();
        fork_choice
            .process_attestation(1, hash_from_index(1), Epoch::new(2))
            .unwrap();

        let node_balances = compute_node_balances(&indices, &fork_choice.votes, &[BALANCE; 2])
            .expect("should compute balances");

        assert_eq!(node_balances, vec![0, 2 * BALANCE]);
    }

    #[test]
    fn stale_votes_are_ignored() {
        let mut fork_choice = ProtoArrayForkChoice::new(8);

        fork_choice
            .process_attestation(3, hash_from_index(1), Epoch::new(2))
            .unwrap();
        fork_choice
            .process_attestation(3, hash_from_index(2), Epoch::new(2))
            .unwrap();
        fork_choice
            .process_attestation(3, hash_from_index(3), Epoch::new(1))
            .unwrap();

        assert_eq!(
            fork_choice.latest_message(3),
            Some((hash_from_index(1), Epoch::new(2)))
        );
        assert_eq!(fork_choice.latest_message(0), None);
        assert_eq!(fork_choice.latest_message(100), None);
    }

    #[test]
    fn unreachable_validator_index_is_rejected() {
        let mut fork_choice = ProtoArrayForkChoice::new(8);

        assert_eq!(
            fork_choice.process_attestation(usize::MAX, hash_from_index(1), Epoch::new(1)),
            Err(Error::InvalidValidatorIndex(usize::MAX))
        );
        assert_eq!(fork_choice.votes.0.len(), 0);
        assert_eq!(fork_choice.latest_message(usize::MAX), None);
    }

    #[test]
    fn move_out_of_tree() {
        const BALANCE: u64 = 42;

        let mut indices = HashMap::new();
        let mut votes = ElasticList::default();

        // There is only one block.
        indices.insert(hash_from_index(1), 0);

        // One validator votes for the zero hash, the other for something outside the tree.
        votes.0.push(vote(Hash256::zero()));
        votes.0.push(vote(Hash256::from_low_u64_be(1337)));

        let node_balances = compute_node_balances(&indices, &votes, &[BALANCE; 2])
            .expect("should compute balances");

        assert_eq!(node_balances, vec![0], "the block should have no balance");
    }

    #[test]
    fn changing_balances() {
        const OLD_BALANCE: u64 = 42;
        const NEW_BALANCE: u64 = OLD_BALANCE * 2;

        let validator_count: usize = 16;

        let mut indices = HashMap::new();
        let mut votes = ElasticList::default();

        for i in 0..validator_count {
            indices.insert(hash_from_index(i), i);
            votes.0.push(vote(hash_from_index(1)));
        }

        for balance in [OLD_BALANCE, NEW_BALANCE] {
            let node_balances =
                compute_node_balances(&indices, &votes, &vec![balance; validator_count])
                    .expect("should compute balances");

            assert_eq!(node_balances[0], 0);
            assert_eq!(node_balances[1], balance * validator_count as u64);
        }
    }

    #[test]
    fn validator_appears() {
        const BALANCE: u64 = 42;

        let mut indices = HashMap::new();
        let mut votes = ElasticList::default();

        // There are two blocks.
        indices.insert(hash_from_index(1), 0);
        indices.insert(hash_from_index(2), 1);

        // Both validators vote for block 2.
        for _ in 0..2 {
            votes.0.push(vote(hash_from_index(2)));
        }

        // Only one validator has a balance.
        let node_balances = compute_node_balances(&indices, &votes, &[BALANCE; 1])
            .expect("should compute balances");
        assert_eq!(node_balances, vec![0, BALANCE]);

        // The second validator appears.
        let node_balances = compute_node_balances(&indices, &votes, &[BALANCE; 2])
            .expect("should compute balances");
        assert_eq!(node_balances, vec![0, 2 * BALANCE]);
    }

    #[test]
    fn validator_disappears() {
        const BALANCE: u64 = 42;

        let mut indices = HashMap::new();
        let mut votes = ElasticList::default();

        // There are two blocks.
        indices.insert(hash_from_index(1), 0);
        indices.insert(hash_from_index(2), 1);

        // Both validators vote for block 1.
        for _ in 0..2 {
            votes.0.push(vote(hash_from_index(1)));
        }

        let node_balances = compute_node_balances(&indices, &votes, &[BALANCE; 2])
            .expect("should compute balances");
        assert_eq!(node_balances, vec![2 * BALANCE, 0]);

        let node_balances = compute_node_balances(&indices, &votes, &[BALANCE; 1])
            .expect("should compute balances");
        assert_eq!(
            node_balances,
            vec![BALANCE, 0],
            "block 1 should have only one balance"
        );
    }

    #[test]
    fn proposer_boost_is_added_to_the_boosted_node() {
        let spec = ChainSpec::minimal();
        let mut fork_choice = ProtoArrayForkChoice::new(spec.slots_per_epoch);

        for (i, parent) in [(0, None), (1, Some(0)), (2, Some(0))] {
            fork_choice
                .process_block(Block {
                    slot: Slot::new(i),
                    root: hash_from_index(i as usize),
                    parent_root: parent.map(|p: usize| hash_from_index(p)),
                    payload_hash: ExecutionBlockHash::zero(),
                    timestamp: Duration::from_secs(0),
                    justified_epoch: Epoch::new(0),
                    finalized_epoch: Epoch::new(0),
                    unrealized_justified_epoch: Epoch::new(0),
                    unrealized_finalized_epoch: Epoch::new(0),
                    optimistic: true,
                })
                .unwrap();
        }

        // 16 validators of 32, 8 slots per epoch: the committee weight is 64, and 40% is 25.
        let balances = vec![32; 16];
        fork_choice
            .process_attestation(0, hash_from_index(1), Epoch::new(0))
            .unwrap();
        fork_choice.set_proposer_boost_root(hash_from_index(2));
        fork_choice.update_balances(&balances, &spec).unwrap();

        assert_eq!(fork_choice.get_weight(&hash_from_index(1)), Some(32));
        assert_eq!(fork_choice.get_weight(&hash_from_index(2)), Some(25));
        assert_eq!(fork_choice.get_weight(&hash_from_index(0)), Some(57));
        assert_eq!(
            fork_choice.core_proto_array().find_head(&Checkpoint::default()),
            Ok(hash_from_index(1))
        );

        fork_choice.set_proposer_boost_root(Hash256::zero());
        fork_choice.update_balances(&balances, &spec).unwrap();
        assert_eq!(fork_choice.get_weight(&hash_from_index(2)), Some(0));
        assert_eq!(fork_choice.balances(), &balances[..]);
    }
}
