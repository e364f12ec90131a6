use proto_array::core::ProtoNode;
use std::fmt;
use std::time::Duration;
use types::{Epoch, Slot};

/// Reasons why a re-org of the head should not be attempted.
#[derive(Debug, Clone, PartialEq)]
pub enum DoNotReOrg {
    ReOrgsDisabled,
    MissingHeadOrParentNode,
    HeadDistance {
        head_slot: Slot,
        proposal_slot: Slot,
    },
    ParentDistance,
    ShufflingUnstable,
    JustificationAndFinalizationNotCompetitive,
    ChainNotFinalizing {
        epochs_since_finalization: u64,
    },
    HeadNotLate {
        block_delay: Duration,
    },
    HeadNotWeak {
        head_weight: u64,
        re_org_head_weight_threshold: u64,
    },
    ParentNotStrong {
        parent_weight: u64,
        re_org_parent_weight_threshold: u64,
    },
    NotProposingOnTime {
        slot_delay: Duration,
        re_org_cutoff: Duration,
    },
}

impl fmt::Display for DoNotReOrg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ReOrgsDisabled => write!(f, "re-orgs disabled in config"),
            Self::MissingHeadOrParentNode => write!(f, "unknown head or parent"),
            Self::HeadDistance {
                head_slot,
                proposal_slot,
            } => write!(
                f,
                "proposal slot {} is not directly after head slot {}",
                proposal_slot, head_slot
            ),
            Self::ParentDistance => write!(f, "parent too far from head"),
            Self::ShufflingUnstable => write!(f, "shuffling unstable at epoch boundary"),
            Self::JustificationAndFinalizationNotCompetitive => {
                write!(f, "justification or finalization not competitive")
            }
            Self::ChainNotFinalizing {
                epochs_since_finalization,
            } => write!(
                f,
                "chain not finalizing ({} epochs since finalization)",
                epochs_since_finalization
            ),
            Self::HeadNotLate { block_delay } => {
                write!(f, "head not late (arrived {:?} into its slot)", block_delay)
            }
            Self::HeadNotWeak {
                head_weight,
                re_org_head_weight_threshold,
            } => write!(
                f,
                "head not weak ({}/{})",
                head_weight, re_org_head_weight_threshold
            ),
            Self::ParentNotStrong {
                parent_weight,
                re_org_parent_weight_threshold,
            } => write!(
                f,
                "parent not strong ({}/{})",
                parent_weight, re_org_parent_weight_threshold
            ),
            Self::NotProposingOnTime {
                slot_delay,
                re_org_cutoff,
            } => write!(
                f,
                "not proposing on time ({:?} >= {:?})",
                slot_delay, re_org_cutoff
            ),
        }
    }
}

/// Everything about the store and the wall clock needed to judge a single-slot re-org of a head.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReOrgContext {
    pub proposal_slot: Slot,
    pub slots_per_epoch: u64,
    pub finalized_epoch: Epoch,
    pub max_epochs_since_finalization: Epoch,
    /// Time between the start of the head's slot and its arrival.
    pub head_block_delay: Duration,
    /// A block arriving after this delay into its slot is late.
    pub attestation_deadline: Duration,
    pub re_org_head_weight_threshold: u64,
    pub re_org_parent_weight_threshold: u64,
}

/// Check whether `head` is eligible to be orphaned by a block built on `parent` at
/// `context.proposal_slot`.
///
/// Timing of the proposal itself is checked by the caller, since it differs between block
/// production and forkchoice-update overrides.
pub(crate) fn check_re_org(
    head: &ProtoNode,
    parent: &ProtoNode,
    context: &ReOrgContext,
) -> Result<(), DoNotReOrg> {
    // Only single-slot re-orgs of the previous slot's block.
    if head.slot.saturating_add(1_u64) != context.proposal_slot {
        return Err(DoNotReOrg::HeadDistance {
            head_slot: head.slot,
            proposal_slot: context.proposal_slot,
        });
    }
    if parent.slot.saturating_add(1_u64) != head.slot {
        return Err(DoNotReOrg::ParentDistance);
    }

    // The proposer shuffling changes at the epoch boundary.
    if context
        .proposal_slot
        .as_u64()
        .checked_rem(context.slots_per_epoch)
        .map_or(true, |position| position == 0)
    {
        return Err(DoNotReOrg::ShufflingUnstable);
    }

    if head.unrealized_justified_epoch != parent.unrealized_justified_epoch
        || head.unrealized_finalized_epoch != parent.unrealized_finalized_epoch
    {
        return Err(DoNotReOrg::JustificationAndFinalizationNotCompetitive);
    }

    let epochs_since_finalization = context
        .proposal_slot
        .epoch(context.slots_per_epoch)
        .saturating_sub(context.finalized_epoch)
        .as_u64();
    if epochs_since_finalization > context.max_epochs_since_finalization.as_u64() {
        return Err(DoNotReOrg::ChainNotFinalizing {
            epochs_since_finalization,
        });
    }

    if context.head_block_delay <= context.attestation_deadline {
        return Err(DoNotReOrg::HeadNotLate {
            block_delay: context.head_block_delay,
        });
    }

    if head.weight >= context.re_org_head_weight_threshold {
        return Err(DoNotReOrg::HeadNotWeak {
            head_weight: head.weight,
            re_org_head_weight_threshold: context.re_org_head_weight_threshold,
        });
    }

    if parent.weight <= context.re_org_parent_weight_threshold {
        return Err(DoNotReOrg::ParentNotStrong {
            parent_weight: parent.weight,
            re_org_parent_weight_threshold: context.re_org_parent_weight_threshold,
        });
    }

    Ok(())
}
