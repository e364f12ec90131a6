use crate::*;
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

/// Holds the consensus "constants" the fork choice needs.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSpec {
    /*
     * Initial Values
     */
    pub genesis_slot: Slot,
    pub genesis_epoch: Epoch,

    /*
     * Time parameters
     */
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
    pub intervals_per_slot: u64,

    /*
     * Misc
     */
    pub validator_registry_limit: u64,

    /*
     * Fork choice
     */
    pub proposer_score_boost: Option<u64>,
    pub reorg_head_weight_threshold: Option<u64>,
    pub reorg_parent_weight_threshold: Option<u64>,
    pub reorg_max_epochs_since_finalization: Option<u64>,
}

impl ChainSpec {
    /// Returns a `ChainSpec` with the mainnet preset.
    pub fn mainnet() -> Self {
        Self {
            /*
             * Initial Values
             */
            genesis_slot: Slot::new(0),
            genesis_epoch: Epoch::new(0),

            /*
             * Time parameters
             */
            seconds_per_slot: 12,
            slots_per_epoch: 32,
            intervals_per_slot: 3,

            /*
             * Misc
             */
            validator_registry_limit: 1 << 40,

            /*
             * Fork choice
             */
            proposer_score_boost: Some(40),
            reorg_head_weight_threshold: Some(20),
            reorg_parent_weight_threshold: Some(160),
            reorg_max_epochs_since_finalization: Some(2),
        }
    }

    /// Returns a `ChainSpec` with the minimal preset, suitable for testing.
    pub fn minimal() -> Self {
        Self {
            seconds_per_slot: 6,
            slots_per_epoch: 8,
            ..ChainSpec::mainnet()
        }
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::from_secs(self.seconds_per_slot)
    }

    /// The duration of one interval of a slot (e.g. the attestation deadline on mainnet is one
    /// interval, 4 seconds, into the slot).
    ///
    /// Returns the full slot duration if `intervals_per_slot` is zero.
    pub fn interval_duration(&self) -> Duration {
        self.slot_duration()
            .checked_div(self.intervals_per_slot as u32)
            .unwrap_or_else(|| self.slot_duration())
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_interval_is_four_seconds() {
        let spec = ChainSpec::mainnet();
        assert_eq!(spec.interval_duration(), Duration::from_secs(4));
    }

    #[test]
    fn minimal_overrides_time_parameters_only() {
        let minimal = ChainSpec::minimal();
        let mainnet = ChainSpec::mainnet();

        assert_eq!(minimal.slots_per_epoch, 8);
        assert_eq!(minimal.interval_duration(), Duration::from_secs(2));
        assert_eq!(minimal.proposer_score_boost, mainnet.proposer_score_boost);
    }

    #[test]
    fn deserializes_with_defaults() {
        let spec: ChainSpec = serde_yaml::from_str("slots_per_epoch: 4").unwrap();
        assert_eq!(spec.slots_per_epoch, 4);
        assert_eq!(spec.seconds_per_slot, 12);
    }
}
