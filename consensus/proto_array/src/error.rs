use types::{Epoch, Hash256};

#[derive(Clone, PartialEq, Debug)]
pub enum Error {
    UnknownRoot(Hash256),
    UnknownParent {
        block_root: Hash256,
        parent_root: Hash256,
    },
    UnknownFinalizedRoot(Hash256),
    CorruptTree(CorruptTree),
    InvalidUnrealizedEpoch {
        block_root: Hash256,
        current_justified_epoch: Epoch,
        new_justified_epoch: Epoch,
        current_finalized_epoch: Epoch,
        new_finalized_epoch: Epoch,
    },
    NoViableHead(Box<NoViableHeadInfo>),
    WeightOverflow(usize),
    BalanceOverflow(usize),
    ProposerBoostOverflow(usize),
    /// The vote tracker cannot grow to hold this validator.
    InvalidValidatorIndex(usize),
    InvalidBalancesLen {
        balances: usize,
        nodes: usize,
    },
    RevertedFinalizedEpoch {
        current_finalized_epoch: Epoch,
        new_finalized_epoch: Epoch,
    },
    /// A long-running pass was cancelled through an `AbortSignal`. The tree was left untouched.
    Aborted,
}

impl Error {
    pub fn is_corrupt_tree(&self) -> bool {
        matches!(self, Error::CorruptTree(_))
    }

    pub fn is_no_viable_head(&self) -> bool {
        matches!(self, Error::NoViableHead(_))
    }
}

impl From<CorruptTree> for Error {
    fn from(e: CorruptTree) -> Self {
        Error::CorruptTree(e)
    }
}

/// Internal linkage of the node arena is inconsistent. Always a bug in insertion or pruning.
#[derive(Clone, PartialEq, Debug)]
pub enum CorruptTree {
    InvalidNodeIndex(usize),
    InvalidParentIndex {
        node_index: usize,
        parent_index: usize,
    },
    InvalidChildIndex {
        parent_index: usize,
        child_index: usize,
    },
    MismatchedParent {
        parent_index: usize,
        child_index: usize,
        child_parent: Option<usize>,
    },
    InvalidBestDescendant(usize),
    InvalidJustifiedIndex(usize),
}

#[derive(Clone, PartialEq, Debug)]
pub struct NoViableHeadInfo {
    pub start_root: Hash256,
    pub justified_epoch: Epoch,
    pub finalized_epoch: Epoch,
    pub head_root: Hash256,
    pub head_justified_epoch: Epoch,
    pub head_finalized_epoch: Epoch,
}
