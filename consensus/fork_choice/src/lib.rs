mod checkpoints;
mod clock;
mod config;
mod fork_choice;
mod metrics;
mod proposer_head;

pub use crate::checkpoints::{CheckpointUpdate, ForkChoiceCheckpoints};
pub use crate::clock::{Clock, ManualClock, SystemTimeClock};
pub use crate::config::{ForkChoiceConfig, ReOrgThreshold, DEFAULT_RE_ORG_CUTOFF_DENOMINATOR};
pub use crate::fork_choice::{CachedHead, Error, ForkChoice, PostBlockState};
pub use crate::metrics::ForkChoiceMetrics;
pub use crate::proposer_head::DoNotReOrg;
pub use proto_array::{AbortSignal, Block};
