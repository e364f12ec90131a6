//! Primitive types shared by the fork choice crates.
pub mod slot_epoch;

pub mod chain_spec;
pub mod checkpoint;
pub mod execution_block_hash;

pub use crate::chain_spec::ChainSpec;
pub use crate::checkpoint::Checkpoint;
pub use crate::execution_block_hash::ExecutionBlockHash;
pub use crate::slot_epoch::{Epoch, Slot};

pub type Hash256 = ethereum_types::H256;
