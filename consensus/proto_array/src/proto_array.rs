use crate::abort::{check_abort, AbortSignal};
use crate::error::{CorruptTree, Error, NoViableHeadInfo};
use crate::Block;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use types::{Checkpoint, Epoch, ExecutionBlockHash, Hash256, Slot};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ProtoNode {
    pub slot: Slot,
    pub root: Hash256,
    /// The hash of the execution payload carried by this block. Zero for blocks without one.
    pub payload_hash: ExecutionBlockHash,
    /// When the block was received, as a duration since the UNIX epoch.
    pub timestamp: Duration,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// `balance` plus the `weight` of every child.
    pub weight: u64,
    /// Stake attributed directly to this block by the latest messages of validators.
    pub balance: u64,
    pub justified_epoch: Epoch,
    pub finalized_epoch: Epoch,
    pub unrealized_justified_epoch: Epoch,
    pub unrealized_finalized_epoch: Epoch,
    pub best_child: Option<usize>,
    pub best_descendant: Option<usize>,
    /// `true` until the execution layer confirms the validity of the payload.
    pub optimistic: bool,
}

/// The `best_child` and `best_descendant` of one node, computed before being committed.
#[derive(Clone, Copy, Default)]
struct BestPointers {
    best_child: Option<usize>,
    best_descendant: Option<usize>,
}

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProtoArray {
    /// The justified epoch used by the most recent viability filter.
    pub justified_epoch: Epoch,
    /// The finalized epoch used by the most recent viability filter.
    pub finalized_epoch: Epoch,
    pub nodes: Vec<ProtoNode>,
    pub indices: HashMap<Hash256, usize>,
    pub payload_indices: HashMap<ExecutionBlockHash, usize>,
}

impl ProtoArray {
    /// Register a block with the fork choice.
    ///
    /// The first block registered becomes the root of the tree, regardless of its parent. Every
    /// later block must name a known parent. Registering a known block is a no-op which returns
    /// the index of the existing node.
    ///
    /// The best-child/best-descendant links of the whole tree are refreshed afterwards.
    pub fn on_block(&mut self, block: Block) -> Result<usize, Error> {
        if let Some(index) = self.indices.get(&block.root) {
            return Ok(*index);
        }

        let parent = if self.nodes.is_empty() {
            None
        } else {
            let parent_root = block.parent_root.unwrap_or_else(Hash256::zero);
            let parent_index =
                self.indices
                    .get(&parent_root)
                    .copied()
                    .ok_or(Error::UnknownParent {
                        block_root: block.root,
                        parent_root,
                    })?;
            Some(parent_index)
        };

        if block.unrealized_justified_epoch < block.justified_epoch
            || block.unrealized_finalized_epoch < block.finalized_epoch
        {
            return Err(Error::InvalidUnrealizedEpoch {
                block_root: block.root,
                current_justified_epoch: block.justified_epoch,
                new_justified_epoch: block.unrealized_justified_epoch,
                current_finalized_epoch: block.finalized_epoch,
                new_finalized_epoch: block.unrealized_finalized_epoch,
            });
        }

        let node_index = self.nodes.len();

        let node = ProtoNode {
            slot: block.slot,
            root: block.root,
            payload_hash: block.payload_hash,
            timestamp: block.timestamp,
            parent,
            children: vec![],
            weight: 0,
            balance: 0,
            justified_epoch: block.justified_epoch,
            finalized_epoch: block.finalized_epoch,
            unrealized_justified_epoch: block.unrealized_justified_epoch,
            unrealized_finalized_epoch: block.unrealized_finalized_epoch,
            best_child: None,
            best_descendant: None,
            optimistic: block.optimistic,
        };

        if let Some(parent_index) = parent {
            self.nodes
                .get_mut(parent_index)
                .ok_or(CorruptTree::InvalidParentIndex {
                    node_index,
                    parent_index,
                })?
                .children
                .push(node_index);
        }

        self.indices.insert(node.root, node_index);
        if !node.payload_hash.is_zero() {
            self.payload_indices.insert(node.payload_hash, node_index);
        }
        self.nodes.push(node);

        self.update_best_descendants(self.justified_epoch, self.finalized_epoch)?;

        Ok(node_index)
    }

    /// Recompute the `weight` of every node from its `balance`, then refresh the
    /// best-child/best-descendant links so that `Self::find_head` reflects the new weights.
    pub fn apply_weight_changes(&mut self) -> Result<(), Error> {
        self.apply_weight_changes_with_signal(None)
    }

    pub fn apply_weight_changes_with_signal(
        &mut self,
        signal: Option<&AbortSignal>,
    ) -> Result<(), Error> {
        let balances = self.nodes.iter().map(|node| node.balance).collect();
        self.apply_balances_with_signal(balances, signal)
    }

    /// Replace the `balance` of every node with `balances` (one entry per node, by index) and
    /// recompute weights and best descendants.
    ///
    /// Everything is computed into scratch buffers first. If `signal` is raised before the pass
    /// completes, `Error::Aborted` is returned and `self` is unchanged.
    pub fn apply_balances_with_signal(
        &mut self,
        balances: Vec<u64>,
        signal: Option<&AbortSignal>,
    ) -> Result<(), Error> {
        let weights = self.compute_weights(&balances, signal)?;
        let best = self.compute_best_descendants(
            &weights,
            self.justified_epoch,
            self.finalized_epoch,
            signal,
        )?;

        for (((node, balance), weight), pointers) in self
            .nodes
            .iter_mut()
            .zip(balances)
            .zip(weights)
            .zip(best)
        {
            node.balance = balance;
            node.weight = weight;
            node.best_child = pointers.best_child;
            node.best_descendant = pointers.best_descendant;
        }

        Ok(())
    }

    /// Recompute the best-child/best-descendant of every node, filtering out nodes which are not
    /// viable for the given justified and finalized epochs.
    ///
    /// The epochs are retained and used for later viability checks.
    pub fn update_best_descendants(
        &mut self,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) -> Result<(), Error> {
        self.update_best_descendants_with_signal(justified_epoch, finalized_epoch, None)
    }

    pub fn update_best_descendants_with_signal(
        &mut self,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
        signal: Option<&AbortSignal>,
    ) -> Result<(), Error> {
        let weights = self.nodes.iter().map(|node| node.weight).collect::<Vec<_>>();
        let best =
            self.compute_best_descendants(&weights, justified_epoch, finalized_epoch, signal)?;

        self.justified_epoch = justified_epoch;
        self.finalized_epoch = finalized_epoch;
        for (node, pointers) in self.nodes.iter_mut().zip(best) {
            node.best_child = pointers.best_child;
            node.best_descendant = pointers.best_descendant;
        }

        Ok(())
    }

    /// Iterate backwards through the array, adding each node's balance to its own weight and
    /// then its weight to its parent's.
    ///
    /// The structure of the `self.nodes` array ensures that every child is visited before its
    /// parent.
    fn compute_weights(
        &self,
        balances: &[u64],
        signal: Option<&AbortSignal>,
    ) -> Result<Vec<u64>, Error> {
        if balances.len() != self.nodes.len() {
            return Err(Error::InvalidBalancesLen {
                balances: balances.len(),
                nodes: self.nodes.len(),
            });
        }

        let mut weights = vec![0_u64; self.nodes.len()];

        for (node_index, (node, balance)) in self.nodes.iter().zip(balances).enumerate().rev() {
            check_abort(signal)?;

            let weight = weights
                .get_mut(node_index)
                .ok_or(CorruptTree::InvalidNodeIndex(node_index))?;
            *weight = weight
                .checked_add(*balance)
                .ok_or(Error::WeightOverflow(node_index))?;
            let weight = *weight;

            if let Some(parent_index) = node.parent {
                let invalid_parent = CorruptTree::InvalidParentIndex {
                    node_index,
                    parent_index,
                };
                if parent_index >= node_index {
                    return Err(invalid_parent.into());
                }
                let parent_weight = weights.get_mut(parent_index).ok_or(invalid_parent)?;
                *parent_weight = parent_weight
                    .checked_add(weight)
                    .ok_or(Error::WeightOverflow(parent_index))?;
            }
        }

        Ok(weights)
    }

    /// Iterate backwards through the array, choosing for each node the heaviest child which
    /// leads to a viable head. Equal weights are broken by preferring the larger root.
    fn compute_best_descendants(
        &self,
        weights: &[u64],
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
        signal: Option<&AbortSignal>,
    ) -> Result<Vec<BestPointers>, Error> {
        let mut best = vec![BestPointers::default(); self.nodes.len()];

        for (parent_index, parent) in self.nodes.iter().enumerate().rev() {
            check_abort(signal)?;

            // (index, weight, root) of the best child seen so far.
            let mut best_child: Option<(usize, u64, Hash256)> = None;

            for &child_index in &parent.children {
                let child = self.child_of(parent_index, child_index)?;
                let child_best_descendant = best
                    .get(child_index)
                    .ok_or(CorruptTree::InvalidChildIndex {
                        parent_index,
                        child_index,
                    })?
                    .best_descendant;

                if !self.node_leads_to_viable_head(
                    child,
                    child_best_descendant,
                    justified_epoch,
                    finalized_epoch,
                )? {
                    continue;
                }

                let child_weight = weights
                    .get(child_index)
                    .copied()
                    .ok_or(CorruptTree::InvalidNodeIndex(child_index))?;

                let is_better = best_child.map_or(true, |(_, best_weight, best_root)| {
                    child_weight > best_weight
                        || (child_weight == best_weight && child.root > best_root)
                });
                if is_better {
                    best_child = Some((child_index, child_weight, child.root));
                }
            }

            if let Some((child_index, _, _)) = best_child {
                let child_best_descendant = best
                    .get(child_index)
                    .ok_or(CorruptTree::InvalidNodeIndex(child_index))?
                    .best_descendant;
                let pointers = best
                    .get_mut(parent_index)
                    .ok_or(CorruptTree::InvalidNodeIndex(parent_index))?;
                *pointers = BestPointers {
                    best_child: Some(child_index),
                    best_descendant: Some(child_best_descendant.unwrap_or(child_index)),
                };
            }
        }

        Ok(best)
    }

    /// Returns the child at `child_index`, checking that it is linked back to `parent_index`.
    fn child_of(&self, parent_index: usize, child_index: usize) -> Result<&ProtoNode, Error> {
        let invalid_child = CorruptTree::InvalidChildIndex {
            parent_index,
            child_index,
        };
        if child_index <= parent_index {
            return Err(invalid_child.into());
        }
        let child = self.nodes.get(child_index).ok_or(invalid_child)?;
        if child.parent != Some(parent_index) {
            return Err(CorruptTree::MismatchedParent {
                parent_index,
                child_index,
                child_parent: child.parent,
            }
            .into());
        }
        Ok(child)
    }

    /// Follows the best-descendant links to find the best-block (i.e., head-block).
    ///
    /// If the justified root is unknown at the genesis epoch, the search starts from the root of
    /// the tree.
    ///
    /// ## Notes
    ///
    /// The result is only accurate if the best-descendant links are fresh, i.e. if
    /// `Self::update_best_descendants` or a weight update ran since the last change to the
    /// justified/finalized epochs.
    pub fn find_head(&self, justified_checkpoint: &Checkpoint) -> Result<Hash256, Error> {
        let justified_index = match self.indices.get(&justified_checkpoint.root) {
            Some(index) => *index,
            None if justified_checkpoint.epoch == Epoch::new(0) && !self.nodes.is_empty() => 0,
            None => return Err(Error::UnknownRoot(justified_checkpoint.root)),
        };
        let justified_node = self
            .nodes
            .get(justified_index)
            .ok_or(CorruptTree::InvalidJustifiedIndex(justified_index))?;

        let best_descendant_index = justified_node.best_descendant.unwrap_or(justified_index);
        let best_node = self
            .nodes
            .get(best_descendant_index)
            .ok_or(CorruptTree::InvalidBestDescendant(best_descendant_index))?;

        // Perform a sanity check that the node is indeed valid to be the head.
        if !self.node_is_viable_for_head(best_node) {
            return Err(Error::NoViableHead(Box::new(NoViableHeadInfo {
                start_root: justified_node.root,
                justified_epoch: self.justified_epoch,
                finalized_epoch: self.finalized_epoch,
                head_root: best_node.root,
                head_justified_epoch: best_node.justified_epoch,
                head_finalized_epoch: best_node.finalized_epoch,
            })));
        }

        Ok(best_node.root)
    }

    /// Make the node at `finalized_root` the root of the tree, removing every node which is not
    /// it or one of its descendants. Returns the roots of the removed nodes.
    ///
    /// Nothing is removed if the finalized node is already the root.
    pub fn prune(&mut self, finalized_root: Hash256) -> Result<Vec<Hash256>, Error> {
        self.prune_with_signal(finalized_root, None)
    }

    pub fn prune_with_signal(
        &mut self,
        finalized_root: Hash256,
        signal: Option<&AbortSignal>,
    ) -> Result<Vec<Hash256>, Error> {
        let finalized_index = *self
            .indices
            .get(&finalized_root)
            .ok_or(Error::UnknownFinalizedRoot(finalized_root))?;
        let finalized_node = self
            .nodes
            .get(finalized_index)
            .ok_or(CorruptTree::InvalidNodeIndex(finalized_index))?;

        if finalized_node.parent.is_none() {
            return Ok(vec![]);
        }

        // The new index of each node, or `None` if it is removed. Nodes before the finalized node
        // cannot be its descendants.
        let mut new_indices: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut kept = 0_usize;
        for (node_index, node) in self.nodes.iter().enumerate().skip(finalized_index) {
            check_abort(signal)?;

            let keep = node_index == finalized_index
                || node
                    .parent
                    .and_then(|parent_index| new_indices.get(parent_index).copied().flatten())
                    .is_some();
            if keep {
                *new_indices
                    .get_mut(node_index)
                    .ok_or(CorruptTree::InvalidNodeIndex(node_index))? = Some(kept);
                kept += 1;
            }
        }
        let new_index = |old: usize| new_indices.get(old).copied().flatten();

        let mut nodes = Vec::with_capacity(kept);
        let mut pruned = Vec::with_capacity(self.nodes.len().saturating_sub(kept));
        for (node_index, node) in self.nodes.iter().enumerate() {
            check_abort(signal)?;

            if new_index(node_index).is_none() {
                pruned.push(node.root);
                continue;
            }

            let mut node = node.clone();
            node.parent = match node.parent {
                _ if node_index == finalized_index => None,
                Some(parent_index) => Some(new_index(parent_index).ok_or(
                    CorruptTree::InvalidParentIndex {
                        node_index,
                        parent_index,
                    },
                )?),
                None => return Err(CorruptTree::InvalidNodeIndex(node_index).into()),
            };
            node.children = node
                .children
                .iter()
                .map(|&child_index| {
                    new_index(child_index).ok_or(CorruptTree::InvalidChildIndex {
                        parent_index: node_index,
                        child_index,
                    })
                })
                .collect::<Result<_, _>>()?;
            node.best_child = node
                .best_child
                .map(|i| new_index(i).ok_or(CorruptTree::InvalidBestDescendant(i)))
                .transpose()?;
            node.best_descendant = node
                .best_descendant
                .map(|i| new_index(i).ok_or(CorruptTree::InvalidBestDescendant(i)))
                .transpose()?;
            nodes.push(node);
        }

        self.indices = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.root, index))
            .collect();
        self.payload_indices = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.payload_hash.is_zero())
            .map(|(index, node)| (node.payload_hash, index))
            .collect();
        self.nodes = nodes;

        Ok(pruned)
    }

    /// Marks the node at `block_root` and all of its optimistic ancestors as having a valid
    /// execution payload.
    ///
    /// Stops at the first ancestor which is already valid, since all of its ancestors must be
    /// valid too, or after the root of the tree has been updated.
    pub fn set_optimistic_to_valid(&mut self, block_root: Hash256) -> Result<(), Error> {
        let mut index = *self
            .indices
            .get(&block_root)
            .ok_or(Error::UnknownRoot(block_root))?;

        loop {
            let node = self
                .nodes
                .get_mut(index)
                .ok_or(CorruptTree::InvalidNodeIndex(index))?;

            if !node.optimistic {
                return Ok(());
            }
            node.optimistic = false;

            match node.parent {
                Some(parent_index) => index = parent_index,
                None => return Ok(()),
            }
        }
    }

    /// Set the unrealized epochs of a node. Lowering either epoch is an error.
    pub fn update_unrealized_epochs(
        &mut self,
        block_root: Hash256,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) -> Result<(), Error> {
        let node = self.node_mut(&block_root)?;

        if justified_epoch < node.unrealized_justified_epoch
            || finalized_epoch < node.unrealized_finalized_epoch
        {
            return Err(Error::InvalidUnrealizedEpoch {
                block_root,
                current_justified_epoch: node.unrealized_justified_epoch,
                new_justified_epoch: justified_epoch,
                current_finalized_epoch: node.unrealized_finalized_epoch,
                new_finalized_epoch: finalized_epoch,
            });
        }

        node.unrealized_justified_epoch = justified_epoch;
        node.unrealized_finalized_epoch = finalized_epoch;

        Ok(())
    }

    /// Set the realized epochs of a node. The new epochs must not be lower than the current
    /// realized epochs, nor higher than the unrealized ones.
    pub fn set_realized_epochs(
        &mut self,
        block_root: Hash256,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) -> Result<(), Error> {
        let node = self.node_mut(&block_root)?;

        if justified_epoch < node.justified_epoch
            || finalized_epoch < node.finalized_epoch
            || justified_epoch > node.unrealized_justified_epoch
            || finalized_epoch > node.unrealized_finalized_epoch
        {
            return Err(Error::InvalidUnrealizedEpoch {
                block_root,
                current_justified_epoch: node.justified_epoch,
                new_justified_epoch: justified_epoch,
                current_finalized_epoch: node.finalized_epoch,
                new_finalized_epoch: finalized_epoch,
            });
        }

        node.justified_epoch = justified_epoch;
        node.finalized_epoch = finalized_epoch;

        Ok(())
    }

    /// Copy the unrealized epochs of every node into its realized epochs.
    ///
    /// Returns the highest realized justified and finalized epochs across the tree.
    ///
    /// The best-descendant links are *not* refreshed, since the caller is expected to follow up
    /// with `Self::update_best_descendants` using its new checkpoints.
    pub fn realize_unrealized_epochs(&mut self) -> (Epoch, Epoch) {
        let mut max_justified_epoch = Epoch::new(0);
        let mut max_finalized_epoch = Epoch::new(0);

        for node in self.nodes.iter_mut() {
            node.justified_epoch = node.unrealized_justified_epoch;
            node.finalized_epoch = node.unrealized_finalized_epoch;

            max_justified_epoch = std::cmp::max(max_justified_epoch, node.justified_epoch);
            max_finalized_epoch = std::cmp::max(max_finalized_epoch, node.finalized_epoch);
        }

        (max_justified_epoch, max_finalized_epoch)
    }

    /// This is the equivalent to the `filter_block_tree` function in the consensus specs,
    /// comparing epochs rather than full checkpoints.
    ///
    /// Any node that has a different finalized or justified epoch should not be viable for the
    /// head. The genesis epoch matches any node.
    pub fn node_is_viable_for_head(&self, node: &ProtoNode) -> bool {
        is_viable_for_head(node, self.justified_epoch, self.finalized_epoch)
    }

    /// Indicates if the node itself is viable for the head, or if its best descendant is viable
    /// for the head.
    fn node_leads_to_viable_head(
        &self,
        node: &ProtoNode,
        best_descendant: Option<usize>,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) -> Result<bool, Error> {
        let best_descendant_is_viable_for_head =
            if let Some(best_descendant_index) = best_descendant {
                let best_descendant = self
                    .nodes
                    .get(best_descendant_index)
                    .ok_or(CorruptTree::InvalidBestDescendant(best_descendant_index))?;
                is_viable_for_head(best_descendant, justified_epoch, finalized_epoch)
            } else {
                false
            };

        Ok(best_descendant_is_viable_for_head
            || is_viable_for_head(node, justified_epoch, finalized_epoch))
    }

    pub fn get_node(&self, block_root: &Hash256) -> Option<&ProtoNode> {
        self.indices
            .get(block_root)
            .and_then(|index| self.nodes.get(*index))
    }

    fn node_mut(&mut self, block_root: &Hash256) -> Result<&mut ProtoNode, Error> {
        let index = *self
            .indices
            .get(block_root)
            .ok_or(Error::UnknownRoot(*block_root))?;
        self.nodes
            .get_mut(index)
            .ok_or_else(|| CorruptTree::InvalidNodeIndex(index).into())
    }

    /// The finalized/origin node which anchors the tree, if any.
    pub fn tree_root(&self) -> Option<&ProtoNode> {
        self.nodes.first()
    }

    /// Return a reverse iterator over the nodes which comprise the chain ending at `block_root`.
    pub fn iter_nodes<'a>(&'a self, block_root: &Hash256) -> Iter<'a> {
        let next_node_index = self.indices.get(block_root).copied();
        Iter {
            next_node_index,
            proto_array: self,
        }
    }

    /// Return a reverse iterator over the block roots of the chain ending at `block_root`.
    ///
    /// Note that unlike many other iterators, this one WILL NOT yield anything at skipped slots.
    pub fn iter_block_roots<'a>(
        &'a self,
        block_root: &Hash256,
    ) -> impl Iterator<Item = (Hash256, Slot)> + 'a {
        self.iter_nodes(block_root)
            .map(|node| (node.root, node.slot))
    }

    /// Returns `true` if the `descendant_root` has an ancestor with `ancestor_root`. Always
    /// returns `false` if either input root is unknown.
    ///
    /// Follows parent links rather than comparing slots, so a child sharing its parent's slot is
    /// still a descendant.
    ///
    /// ## Notes
    ///
    /// Still returns `true` if `ancestor_root` is known and `ancestor_root == descendant_root`.
    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        self.iter_nodes(&descendant_root)
            .any(|node| node.root == ancestor_root)
    }

    /// Returns the root of the latest block at or before `slot` on the chain ending at
    /// `block_root`.
    pub fn ancestor_root(&self, block_root: &Hash256, slot: Slot) -> Option<Hash256> {
        self.iter_nodes(block_root)
            .find(|node| node.slot <= slot)
            .map(|node| node.root)
    }

    /// Returns the *beacon block root* of the block which carries the execution payload with the
    /// given `payload_hash`, if any.
    pub fn block_root_by_payload_hash(&self, payload_hash: &ExecutionBlockHash) -> Option<Hash256> {
        self.payload_indices
            .get(payload_hash)
            .and_then(|index| self.nodes.get(*index))
            .map(|node| node.root)
    }
}

fn is_viable_for_head(node: &ProtoNode, justified_epoch: Epoch, finalized_epoch: Epoch) -> bool {
    let genesis_epoch = Epoch::new(0);
    let correct_justified =
        node.justified_epoch == justified_epoch || justified_epoch == genesis_epoch;
    let correct_finalized =
        node.finalized_epoch == finalized_epoch || finalized_epoch == genesis_epoch;
    correct_justified && correct_finalized
}

/// Calculate `percent` of the weight of a single-slot committee, i.e. of
/// `total_active_balance / slots_per_epoch`. Used for the proposer boost and the re-org weight
/// thresholds.
///
/// The `validator_balances` are effective balances with inactive validators set to zero.
///
/// Returns `None` if there is an overflow or `slots_per_epoch` is zero.
pub fn calculate_committee_fraction(
    validator_balances: &[u64],
    percent: u64,
    slots_per_epoch: u64,
) -> Option<u64> {
    let total_balance = validator_balances
        .iter()
        .try_fold(0_u64, |total, balance| total.checked_add(*balance))?;
    total_balance
        .checked_div(slots_per_epoch)?
        .checked_mul(percent)?
        .checked_div(100)
}

/// Reverse iterator over one path through a `ProtoArray`.
pub struct Iter<'a> {
    next_node_index: Option<usize>,
    proto_array: &'a ProtoArray,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ProtoNode;

    fn next(&mut self) -> Option<Self::Item> {
        let next_node_index = self.next_node_index?;
        let node = self.proto_array.nodes.get(next_node_index)?;
        self.next_node_index = node.parent;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(i: u64) -> Hash256 {
        Hash256::from_low_u64_be(i + 1)
    }

    fn block(slot: u64, block_root: Hash256, parent_root: Option<Hash256>) -> Block {
        Block {
            slot: Slot::new(slot),
            root: block_root,
            parent_root,
            payload_hash: ExecutionBlockHash::from_root(block_root),
            timestamp: Duration::from_secs(slot * 12),
            justified_epoch: Epoch::new(0),
            finalized_epoch: Epoch::new(0),
            unrealized_justified_epoch: Epoch::new(0),
            unrealized_finalized_epoch: Epoch::new(0),
            optimistic: true,
        }
    }

    /// Builds:
    ///
    /// ```text
    ///        0
    ///       / \
    ///      1   2
    ///     / \   \
    ///    3   4   5
    /// ```
    fn branching_tree() -> ProtoArray {
        let mut proto_array = ProtoArray::default();
        proto_array.on_block(block(0, root(0), None)).unwrap();
        proto_array.on_block(block(1, root(1), Some(root(0)))).unwrap();
        proto_array.on_block(block(1, root(2), Some(root(0)))).unwrap();
        proto_array.on_block(block(2, root(3), Some(root(1)))).unwrap();
        proto_array.on_block(block(2, root(4), Some(root(1)))).unwrap();
        proto_array.on_block(block(2, root(5), Some(root(2)))).unwrap();
        proto_array
    }

    fn assert_weights_conserved(proto_array: &ProtoArray) {
        for node in &proto_array.nodes {
            let children_weight: u64 = node
                .children
                .iter()
                .map(|i| proto_array.nodes[*i].weight)
                .sum();
            assert_eq!(
                node.weight,
                node.balance + children_weight,
                "weight of {:?} should be conserved",
                node.root
            );
        }
    }

    #[test]
    fn insert_links_children_and_is_idempotent() {
        let mut proto_array = branching_tree();

        assert_eq!(proto_array.nodes.len(), 6);
        assert_eq!(proto_array.nodes[0].children, vec![1, 2]);
        assert_eq!(proto_array.nodes[1].children, vec![3, 4]);
        assert_eq!(proto_array.nodes[5].parent, Some(2));

        let before = proto_array.clone();
        let index = proto_array
            .on_block(block(9, root(4), Some(root(2))))
            .unwrap();
        assert_eq!(index, 4);
        assert_eq!(proto_array, before, "re-inserting should not mutate");
    }

    #[test]
    fn insert_rejects_unknown_parent() {
        let mut proto_array = branching_tree();

        assert_eq!(
            proto_array.on_block(block(3, root(10), Some(root(11)))),
            Err(Error::UnknownParent {
                block_root: root(10),
                parent_root: root(11),
            })
        );
        assert_eq!(
            proto_array.on_block(block(3, root(10), None)),
            Err(Error::UnknownParent {
                block_root: root(10),
                parent_root: Hash256::zero(),
            })
        );
        assert!(!proto_array.indices.contains_key(&root(10)));
    }

    #[test]
    fn first_block_is_root_even_with_a_parent() {
        let mut proto_array = ProtoArray::default();
        proto_array
            .on_block(block(64, root(7), Some(root(6))))
            .unwrap();

        assert_eq!(proto_array.tree_root().map(|node| node.root), Some(root(7)));
        assert_eq!(proto_array.nodes[0].parent, None);
    }

    #[test]
    fn weights_are_conserved() {
        let mut proto_array = branching_tree();

        proto_array
            .apply_balances_with_signal(vec![1, 2, 3, 4, 5, 6], None)
            .unwrap();
        assert_weights_conserved(&proto_array);
        assert_eq!(proto_array.nodes[0].weight, 21);
        assert_eq!(proto_array.nodes[1].weight, 2 + 4 + 5);

        // Idempotent.
        let before = proto_array.clone();
        proto_array.apply_weight_changes().unwrap();
        assert_eq!(proto_array, before);
    }

    #[test]
    fn heaviest_branch_is_head() {
        let mut proto_array = branching_tree();

        proto_array
            .apply_balances_with_signal(vec![0, 0, 10, 1, 1, 0], None)
            .unwrap();
        assert_eq!(
            proto_array.find_head(&Checkpoint::new(Epoch::new(0), root(0))),
            Ok(root(5))
        );

        proto_array
            .apply_balances_with_signal(vec![0, 0, 0, 1, 2, 0], None)
            .unwrap();
        assert_eq!(
            proto_array.find_head(&Checkpoint::new(Epoch::new(0), root(0))),
            Ok(root(4))
        );
    }

    #[test]
    fn equal_weights_prefer_the_larger_root() {
        let mut low_bytes = [0xaa; 32];
        low_bytes[31] = 0x00;
        let mut high_bytes = [0xaa; 32];
        high_bytes[31] = 0x01;
        let low = Hash256::from_slice(&low_bytes);
        let high = Hash256::from_slice(&high_bytes);

        for (first, second) in [(low, high), (high, low)] {
            let mut proto_array = ProtoArray::default();
            proto_array.on_block(block(0, root(0), None)).unwrap();
            proto_array.on_block(block(1, first, Some(root(0)))).unwrap();
            proto_array
                .on_block(block(1, second, Some(root(0))))
                .unwrap();
            proto_array
                .apply_balances_with_signal(vec![0, 32, 32], None)
                .unwrap();

            assert_eq!(
                proto_array.find_head(&Checkpoint::new(Epoch::new(0), root(0))),
                Ok(high)
            );
        }
    }

    #[test]
    fn non_viable_nodes_are_skipped() {
        let mut proto_array = ProtoArray::default();
        let mut genesis = block(0, root(0), None);
        genesis.justified_epoch = Epoch::new(1);
        genesis.unrealized_justified_epoch = Epoch::new(1);
        proto_array.on_block(genesis).unwrap();

        let mut viable = block(1, root(1), Some(root(0)));
        viable.justified_epoch = Epoch::new(1);
        viable.unrealized_justified_epoch = Epoch::new(1);
        proto_array.on_block(viable).unwrap();
        proto_array
            .on_block(block(1, root(2), Some(root(0))))
            .unwrap();

        proto_array
            .update_best_descendants(Epoch::new(1), Epoch::new(0))
            .unwrap();
        proto_array
            .apply_balances_with_signal(vec![0, 1, 1_000], None)
            .unwrap();

        assert_eq!(
            proto_array.find_head(&Checkpoint::new(Epoch::new(1), root(0))),
            Ok(root(1))
        );
    }

    #[test]
    fn no_viable_head() {
        let mut proto_array = ProtoArray::default();
        proto_array.on_block(block(0, root(0), None)).unwrap();
        proto_array
            .update_best_descendants(Epoch::new(2), Epoch::new(0))
            .unwrap();

        let err = proto_array
            .find_head(&Checkpoint::new(Epoch::new(2), root(0)))
            .unwrap_err();
        assert!(err.is_no_viable_head());
    }

    #[test]
    fn unknown_justified_root() {
        let proto_array = branching_tree();

        assert_eq!(
            proto_array.find_head(&Checkpoint::new(Epoch::new(3), root(42))),
            Err(Error::UnknownRoot(root(42)))
        );
        // The genesis epoch falls back to the tree root.
        assert!(proto_array
            .find_head(&Checkpoint::new(Epoch::new(0), root(42)))
            .is_ok());
    }

    #[test]
    fn prune_keeps_finalized_subtree() {
        let mut proto_array = branching_tree();
        proto_array
            .apply_balances_with_signal(vec![0, 1, 1, 1, 1, 1], None)
            .unwrap();

        let mut pruned = proto_array.prune(root(1)).unwrap();
        pruned.sort();

        assert_eq!(pruned, vec![root(0), root(2), root(5)]);
        assert_eq!(proto_array.nodes.len(), 3);
        assert_eq!(proto_array.tree_root().map(|node| node.root), Some(root(1)));
        assert_eq!(proto_array.nodes[0].parent, None);
        assert_eq!(proto_array.nodes[0].children, vec![1, 2]);
        assert_eq!(proto_array.nodes[2].parent, Some(0));
        assert_eq!(proto_array.indices.len(), 3);
        assert_eq!(
            proto_array.block_root_by_payload_hash(&ExecutionBlockHash::from_root(root(4))),
            Some(root(4))
        );
        assert_eq!(
            proto_array.block_root_by_payload_hash(&ExecutionBlockHash::from_root(root(5))),
            None
        );
        assert_weights_conserved(&proto_array);

        // Pruning at the root is a no-op.
        assert_eq!(proto_array.prune(root(1)), Ok(vec![]));
        assert_eq!(
            proto_array.prune(root(0)),
            Err(Error::UnknownFinalizedRoot(root(0)))
        );
    }

    #[test]
    fn aborted_passes_leave_the_tree_untouched() {
        let mut proto_array = branching_tree();
        let before = proto_array.clone();

        let signal = AbortSignal::new();
        signal.abort();

        assert_eq!(
            proto_array.apply_balances_with_signal(vec![1; 6], Some(&signal)),
            Err(Error::Aborted)
        );
        assert_eq!(
            proto_array.prune_with_signal(root(1), Some(&signal)),
            Err(Error::Aborted)
        );
        assert_eq!(
            proto_array.update_best_descendants_with_signal(
                Epoch::new(1),
                Epoch::new(1),
                Some(&signal)
            ),
            Err(Error::Aborted)
        );
        assert_eq!(proto_array, before);
    }

    #[test]
    fn corrupt_linkage_is_reported() {
        let mut proto_array = branching_tree();
        proto_array.nodes[3].parent = Some(2);

        let err = proto_array.update_best_descendants(Epoch::new(0), Epoch::new(0));
        assert!(err.unwrap_err().is_corrupt_tree());

        let mut proto_array = branching_tree();
        proto_array.nodes[1].children.push(99);
        assert!(proto_array
            .apply_weight_changes()
            .unwrap_err()
            .is_corrupt_tree());
    }

    #[test]
    fn optimistic_to_valid_walks_to_the_root() {
        let mut proto_array = branching_tree();

        proto_array.set_optimistic_to_valid(root(3)).unwrap();

        let optimistic = proto_array
            .nodes
            .iter()
            .map(|node| node.optimistic)
            .collect::<Vec<_>>();
        assert_eq!(optimistic, vec![false, false, true, false, true, true]);

        assert_eq!(
            proto_array.set_optimistic_to_valid(root(42)),
            Err(Error::UnknownRoot(root(42)))
        );
    }

    #[test]
    fn unrealized_epochs_never_regress() {
        let mut proto_array = branching_tree();

        proto_array
            .update_unrealized_epochs(root(3), Epoch::new(2), Epoch::new(1))
            .unwrap();
        assert!(matches!(
            proto_array.update_unrealized_epochs(root(3), Epoch::new(1), Epoch::new(1)),
            Err(Error::InvalidUnrealizedEpoch { .. })
        ));
        assert!(matches!(
            proto_array.set_realized_epochs(root(3), Epoch::new(3), Epoch::new(1)),
            Err(Error::InvalidUnrealizedEpoch { .. })
        ));

        assert_eq!(
            proto_array.realize_unrealized_epochs(),
            (Epoch::new(2), Epoch::new(1))
        );
        let node = proto_array.get_node(&root(3)).unwrap();
        assert_eq!(node.justified_epoch, Epoch::new(2));
        assert_eq!(node.finalized_epoch, Epoch::new(1));
    }

    #[test]
    fn ancestry() {
        let proto_array = branching_tree();

        assert!(proto_array.is_descendant(root(0), root(4)));
        assert!(proto_array.is_descendant(root(4), root(4)));
        assert!(!proto_array.is_descendant(root(2), root(4)));
        assert!(!proto_array.is_descendant(root(42), root(4)));
        assert!(!proto_array.is_descendant(root(0), root(42)));

        assert_eq!(proto_array.ancestor_root(&root(5), Slot::new(1)), Some(root(2)));
        assert_eq!(proto_array.ancestor_root(&root(5), Slot::new(7)), Some(root(5)));
        assert_eq!(proto_array.ancestor_root(&root(42), Slot::new(1)), None);
    }

    #[test]
    fn same_slot_child_is_a_descendant() {
        let mut proto_array = ProtoArray::default();
        proto_array.on_block(block(5, root(1), None)).unwrap();
        proto_array.on_block(block(5, root(2), Some(root(1)))).unwrap();
        proto_array.on_block(block(5, root(3), Some(root(1)))).unwrap();

        assert!(proto_array.is_descendant(root(1), root(2)));
        assert!(proto_array.is_descendant(root(1), root(3)));
        assert!(!proto_array.is_descendant(root(2), root(3)));
        assert!(!proto_array.is_descendant(root(2), root(1)));
    }

    #[test]
    fn committee_fraction() {
        // 64 validators of 32 ETH, 32 slots per epoch: 64 ETH per slot, 40% of which is 25.6.
        let balances = vec![32_000_000_000; 64];
        assert_eq!(
            calculate_committee_fraction(&balances, 40, 32),
            Some(25_600_000_000)
        );
        assert_eq!(calculate_committee_fraction(&balances, 40, 0), None);
        assert_eq!(calculate_committee_fraction(&[u64::MAX, 1], 40, 32), None);
    }
}
