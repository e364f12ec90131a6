use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};

/// Metrics for a single `ForkChoice` instance.
///
/// The collectors are not registered anywhere until `Self::register` is called, so several
/// instances (e.g. in tests) never collide.
#[derive(Clone)]
pub struct ForkChoiceMetrics {
    pub nodes_processed: IntCounter,
    pub prunes: IntCounter,
    pub pruned_nodes: IntCounter,
    pub head_changes: IntCounter,
    pub reorgs: IntCounter,
    pub late_reorg_failures: IntCounter,
    pub no_viable_head: IntCounter,
    pub nodes: IntGauge,
    pub received_blocks_last_epoch: IntGauge,
    pub find_head_times: Histogram,
    pub update_balances_times: Histogram,
}

impl ForkChoiceMetrics {
    /// Create a new instance.
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            nodes_processed: IntCounter::with_opts(Opts::new(
                "fork_choice_nodes_processed_total",
                "Count of blocks inserted into fork choice",
            ))?,
            prunes: IntCounter::with_opts(Opts::new(
                "fork_choice_prunes_total",
                "Count of fork choice prunes which removed nodes",
            ))?,
            pruned_nodes: IntCounter::with_opts(Opts::new(
                "fork_choice_pruned_nodes_total",
                "Count of nodes removed by pruning",
            ))?,
            head_changes: IntCounter::with_opts(Opts::new(
                "fork_choice_head_changes_total",
                "Count of changes to the fork choice head",
            ))?,
            reorgs: IntCounter::with_opts(Opts::new(
                "fork_choice_reorgs_total",
                "Count of head changes to a block which does not descend from the previous head",
            ))?,
            late_reorg_failures: IntCounter::with_opts(Opts::new(
                "fork_choice_late_reorg_failures_total",
                "Count of forkchoice update overrides refused for being past the re-org cutoff",
            ))?,
            no_viable_head: IntCounter::with_opts(Opts::new(
                "fork_choice_no_viable_head_total",
                "Count of head lookups which found no viable head",
            ))?,
            nodes: IntGauge::with_opts(Opts::new(
                "fork_choice_nodes",
                "Current count of fork choice nodes",
            ))?,
            received_blocks_last_epoch: IntGauge::with_opts(Opts::new(
                "fork_choice_received_blocks_last_epoch",
                "Count of blocks received in the last epoch",
            ))?,
            find_head_times: Histogram::with_opts(HistogramOpts::new(
                "fork_choice_find_head_seconds",
                "The duration in seconds of head lookups",
            ))?,
            update_balances_times: Histogram::with_opts(HistogramOpts::new(
                "fork_choice_update_balances_seconds",
                "The duration in seconds of balance updates",
            ))?,
        })
    }

    /// Register this instance with the `registry`.
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.nodes_processed.clone()))?;
        registry.register(Box::new(self.prunes.clone()))?;
        registry.register(Box::new(self.pruned_nodes.clone()))?;
        registry.register(Box::new(self.head_changes.clone()))?;
        registry.register(Box::new(self.reorgs.clone()))?;
        registry.register(Box::new(self.late_reorg_failures.clone()))?;
        registry.register(Box::new(self.no_viable_head.clone()))?;
        registry.register(Box::new(self.nodes.clone()))?;
        registry.register(Box::new(self.received_blocks_last_epoch.clone()))?;
        registry.register(Box::new(self.find_head_times.clone()))?;
        registry.register(Box::new(self.update_balances_times.clone()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_are_independent() {
        let a = ForkChoiceMetrics::new().unwrap();
        let b = ForkChoiceMetrics::new().unwrap();

        a.head_changes.inc();
        assert_eq!(a.head_changes.get(), 1);
        assert_eq!(b.head_changes.get(), 0);
    }

    #[test]
    fn register_once_per_registry() {
        let metrics = ForkChoiceMetrics::new().unwrap();
        let registry = Registry::new();

        metrics.register(&registry).unwrap();
        assert!(metrics.register(&registry).is_err());
        assert!(metrics.register(&Registry::new()).is_ok());

        metrics.prunes.inc();
        let families = registry.gather();
        let prunes = families
            .iter()
            .find(|family| family.get_name() == "fork_choice_prunes_total")
            .expect("prunes should be registered");
        assert_eq!(prunes.get_metric()[0].get_counter().get_value(), 1.0);
    }
}
