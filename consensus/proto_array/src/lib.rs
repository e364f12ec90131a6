mod abort;
mod error;
pub mod fork_choice_test_definition;
mod proto_array;
mod proto_array_fork_choice;
mod received_blocks;

pub use crate::abort::AbortSignal;
pub use crate::proto_array::calculate_committee_fraction;
pub use crate::proto_array_fork_choice::{Block, ProtoArrayForkChoice};
pub use error::{CorruptTree, Error, NoViableHeadInfo};

pub mod core {
    pub use super::proto_array::{Iter, ProtoArray, ProtoNode};
    pub use super::proto_array_fork_choice::{ElasticList, VoteTracker};
    pub use super::received_blocks::ReceivedBlocks;
}
