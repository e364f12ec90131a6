use serde_derive::{Deserialize, Serialize};
use std::time::Duration;
use types::{ChainSpec, Epoch};

/// Default fraction of a slot lost before a late re-org attempt is abandoned: half of the first
/// interval of a three-interval slot.
pub const DEFAULT_RE_ORG_CUTOFF_DENOMINATOR: u32 = 6;

/// A percentage of the weight of a single-slot committee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReOrgThreshold(pub u64);

/// Node operator policy for the fork choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForkChoiceConfig {
    /// Maximum weight of a head block for it to be re-orged by a proposer. `None` disables
    /// proposer re-orgs.
    pub re_org_head_threshold: Option<ReOrgThreshold>,
    /// Minimum weight of the parent of a head block for it to be re-orged.
    pub re_org_parent_threshold: ReOrgThreshold,
    /// Re-orgs are only attempted while the chain is finalizing within this many epochs.
    pub re_org_max_epochs_since_finalization: Epoch,
    /// Time into the proposal slot after which a re-org is given up. Defaults to
    /// `seconds_per_slot / DEFAULT_RE_ORG_CUTOFF_DENOMINATOR`.
    pub re_org_cutoff_millis: Option<u64>,
}

impl ForkChoiceConfig {
    /// Build a config from the re-org parameters of `spec`.
    pub fn from_chain_spec(spec: &ChainSpec) -> Self {
        Self {
            re_org_head_threshold: spec.reorg_head_weight_threshold.map(ReOrgThreshold),
            re_org_parent_threshold: ReOrgThreshold(
                spec.reorg_parent_weight_threshold.unwrap_or(0),
            ),
            re_org_max_epochs_since_finalization: Epoch::new(
                spec.reorg_max_epochs_since_finalization.unwrap_or(0),
            ),
            re_org_cutoff_millis: None,
        }
    }

    pub fn re_org_cutoff(&self, seconds_per_slot: u64) -> Duration {
        self.re_org_cutoff_millis
            .map(Duration::from_millis)
            .unwrap_or_else(|| {
                Duration::from_secs(seconds_per_slot) / DEFAULT_RE_ORG_CUTOFF_DENOMINATOR
            })
    }
}

impl Default for ForkChoiceConfig {
    fn default() -> Self {
        Self::from_chain_spec(&ChainSpec::mainnet())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_mainnet() {
        let config = ForkChoiceConfig::default();
        assert_eq!(config.re_org_head_threshold, Some(ReOrgThreshold(20)));
        assert_eq!(config.re_org_parent_threshold, ReOrgThreshold(160));
        assert_eq!(config.re_org_max_epochs_since_finalization, Epoch::new(2));
        assert_eq!(config.re_org_cutoff(12), Duration::from_secs(2));
    }

    #[test]
    fn explicit_cutoff() {
        let config = ForkChoiceConfig {
            re_org_cutoff_millis: Some(1_500),
            ..ForkChoiceConfig::default()
        };
        assert_eq!(config.re_org_cutoff(12), Duration::from_millis(1_500));
    }

    #[test]
    fn disabled_without_head_threshold() {
        let spec = ChainSpec {
            reorg_head_weight_threshold: None,
            ..ChainSpec::minimal()
        };
        assert_eq!(
            ForkChoiceConfig::from_chain_spec(&spec).re_org_head_threshold,
            None
        );
    }

    #[test]
    fn deserializes_partial_yaml() {
        let config: ForkChoiceConfig =
            serde_yaml::from_str("re_org_head_threshold: ~\nre_org_cutoff_millis: 250").unwrap();
        assert_eq!(config.re_org_head_threshold, None);
        assert_eq!(config.re_org_cutoff(12), Duration::from_millis(250));
        assert_eq!(config.re_org_parent_threshold, ReOrgThreshold(160));
    }
}
