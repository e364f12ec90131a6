use crate::checkpoints::ForkChoiceCheckpoints;
use crate::clock::{Clock, SlotTimes};
use crate::config::ForkChoiceConfig;
use crate::metrics::ForkChoiceMetrics;
use crate::proposer_head::{check_re_org, DoNotReOrg, ReOrgContext};
use parking_lot::{Mutex, RwLock};
use proto_array::{calculate_committee_fraction, AbortSignal, Block, ProtoArrayForkChoice};
use slog::{crit, debug, info, warn, Logger};
use std::cmp::max;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use types::{ChainSpec, Checkpoint, Epoch, ExecutionBlockHash, Hash256, Slot};

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ProtoArrayError(proto_array::Error),
    /// The post-block state failed to compute its unrealized checkpoints.
    UnrealizedCheckpointProcessing(String),
}

impl From<proto_array::Error> for Error {
    fn from(e: proto_array::Error) -> Self {
        Error::ProtoArrayError(e)
    }
}

impl Error {
    pub fn is_corrupt_tree(&self) -> bool {
        matches!(self, Error::ProtoArrayError(e) if e.is_corrupt_tree())
    }

    pub fn is_no_viable_head(&self) -> bool {
        matches!(self, Error::ProtoArrayError(e) if e.is_no_viable_head())
    }
}

/// The state which results from applying a block, as far as fork choice is concerned.
///
/// Computing unrealized checkpoints requires epoch processing, which is left to the
/// implementor.
pub trait PostBlockState {
    type Error: Debug;

    fn slot(&self) -> Slot;

    fn current_justified_checkpoint(&self) -> Checkpoint;

    fn finalized_checkpoint(&self) -> Checkpoint;

    /// The justified and finalized checkpoints this state would have if the current epoch ended
    /// now.
    fn unrealized_checkpoints(&self) -> Result<(Checkpoint, Checkpoint), Self::Error>;
}

/// The head as of the last call to `ForkChoice::head`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedHead {
    pub root: Hash256,
    pub slot: Slot,
}

/// A fork choice store which is safe to share between the block and attestation processing
/// paths.
///
/// ## Locking
///
/// State is split into the checkpoints, the tree (with votes and balances) and the cached head.
/// Methods needing more than one of them always acquire them in that order. Only checkpoint
/// updates, realization, insertion, pruning and vote/weight updates take write locks, head
/// lookups and queries only ever read.
pub struct ForkChoice<C> {
    checkpoints: RwLock<ForkChoiceCheckpoints>,
    proto_array: RwLock<ProtoArrayForkChoice>,
    head: Mutex<Option<CachedHead>>,
    genesis_time: AtomicU64,
    clock: C,
    config: ForkChoiceConfig,
    spec: ChainSpec,
    metrics: ForkChoiceMetrics,
    log: Logger,
}

impl<C: Clock> ForkChoice<C> {
    /// Create an empty fork choice with the given checkpoints. The first block inserted becomes
    /// the root of the tree.
    pub fn new(
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        config: ForkChoiceConfig,
        spec: ChainSpec,
        clock: C,
        metrics: ForkChoiceMetrics,
        log: Logger,
    ) -> Self {
        let mut proto_array = ProtoArrayForkChoice::new(spec.slots_per_epoch);
        let core = proto_array.core_proto_array_mut();
        core.justified_epoch = justified_checkpoint.epoch;
        core.finalized_epoch = finalized_checkpoint.epoch;

        Self {
            checkpoints: RwLock::new(ForkChoiceCheckpoints::new(
                justified_checkpoint,
                finalized_checkpoint,
            )),
            proto_array: RwLock::new(proto_array),
            head: Mutex::new(None),
            genesis_time: AtomicU64::new(0),
            clock,
            config,
            spec,
            metrics,
            log,
        }
    }

    /// Insert a block, returning a snapshot of the stored node.
    ///
    /// A zero `parent_root` is only accepted for the first block, which becomes the root of the
    /// tree. Inserting a known block returns the existing node without modification.
    pub fn insert(
        &self,
        slot: Slot,
        block_root: Hash256,
        parent_root: Hash256,
        payload_hash: ExecutionBlockHash,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) -> Result<Block, Error> {
        self.insert_block(Block {
            slot,
            root: block_root,
            parent_root: Some(parent_root).filter(|root| !root.is_zero()),
            payload_hash,
            timestamp: self.now(),
            justified_epoch,
            finalized_epoch,
            unrealized_justified_epoch: justified_epoch,
            unrealized_finalized_epoch: finalized_epoch,
            optimistic: true,
        })
    }

    /// Insert a fully specified block, e.g. one with an explicit arrival time.
    pub fn insert_block(&self, block: Block) -> Result<Block, Error> {
        let mut proto_array = self.proto_array.write();

        let is_new = !proto_array.contains_block(&block.root);
        let block = proto_array
            .process_block(block)
            .map_err(|e| self.map_error("insert", e))?;

        if is_new {
            self.metrics.nodes_processed.inc();
            self.metrics.nodes.set(proto_array.len() as i64);
            debug!(
                self.log,
                "Inserted block into fork choice";
                "slot" => %block.slot,
                "root" => ?block.root,
                "parent_root" => ?block.parent_root,
                "justified_epoch" => %block.justified_epoch,
                "finalized_epoch" => %block.finalized_epoch,
            );
        }

        Ok(block)
    }

    /// Insert a block using the checkpoints of its post-state, then pull up its unrealized
    /// checkpoints and apply them to the store.
    ///
    /// A block received during its own slot before the attestation deadline receives the
    /// proposer boost, unless another block already has it.
    pub fn on_block<S: PostBlockState>(
        &self,
        block_root: Hash256,
        parent_root: Hash256,
        payload_hash: ExecutionBlockHash,
        state: &S,
    ) -> Result<Block, Error> {
        let state_justified = state.current_justified_checkpoint();
        let state_finalized = state.finalized_checkpoint();
        let block = self.insert(
            state.slot(),
            block_root,
            parent_root,
            payload_hash,
            state_justified.epoch,
            state_finalized.epoch,
        )?;

        let (justified, finalized) = self.compute_unrealized_checkpoints(
            block_root,
            state,
            state_justified,
            state_finalized,
        )?;
        self.update_checkpoints(justified, finalized)?;

        let times = self.slot_times();
        let now = self.now();
        let is_timely = times.slot_of(now) == block.slot
            && times.delay_into(block.slot, now) < self.spec.interval_duration();
        if is_timely {
            let mut proto_array = self.proto_array.write();
            if proto_array.proposer_boost_root().is_zero() {
                proto_array.set_proposer_boost_root(block_root);
            }
        }

        self.get_block(&block_root)
            .ok_or_else(|| proto_array::Error::UnknownRoot(block_root).into())
    }

    /// Record that `validator_indices` now vote for `target_root`. Weights are unaffected until
    /// the next call to `Self::update_balances`.
    ///
    /// Indices at or beyond the validator registry limit are skipped.
    pub fn process_attestation(
        &self,
        validator_indices: &[u64],
        target_root: Hash256,
        target_epoch: Epoch,
    ) {
        let mut proto_array = self.proto_array.write();
        for &validator_index in validator_indices {
            let result = usize::try_from(validator_index)
                .ok()
                .filter(|_| validator_index < self.spec.validator_registry_limit)
                .ok_or(proto_array::Error::InvalidValidatorIndex(
                    validator_index as usize,
                ))
                .and_then(|index| {
                    proto_array.process_attestation(index, target_root, target_epoch)
                });

            if let Err(e) = result {
                warn!(
                    self.log,
                    "Ignoring attestation";
                    "validator_index" => validator_index,
                    "target_root" => ?target_root,
                    "error" => ?e,
                );
            }
        }
    }

    /// Recompute node balances from the latest votes and `balances` (indexed by validator), then
    /// recompute weights and best descendants.
    pub fn update_balances(&self, balances: &[u64]) -> Result<(), Error> {
        self.update_balances_with_signal(balances, None)
    }

    pub fn update_balances_with_signal(
        &self,
        balances: &[u64],
        signal: Option<&AbortSignal>,
    ) -> Result<(), Error> {
        let _timer = self.metrics.update_balances_times.start_timer();
        self.proto_array
            .write()
            .update_balances_with_signal(balances, &self.spec, signal)
            .map_err(|e| self.map_error("update balances", e))
    }

    /// Recompute weights and best descendants from the current node balances.
    pub fn apply_weight_changes(&self) -> Result<(), Error> {
        self.apply_weight_changes_with_signal(None)
    }

    pub fn apply_weight_changes_with_signal(
        &self,
        signal: Option<&AbortSignal>,
    ) -> Result<(), Error> {
        self.proto_array
            .write()
            .core_proto_array_mut()
            .apply_weight_changes_with_signal(signal)
            .map_err(|e| self.map_error("apply weight changes", e))
    }

    pub fn set_proposer_boost_root(&self, block_root: Hash256) {
        self.proto_array.write().set_proposer_boost_root(block_root);
    }

    pub fn update_justified_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), Error> {
        let mut checkpoints = self.checkpoints.write();
        checkpoints.set_justified(checkpoint);
        self.refresh_viability(&checkpoints)
    }

    /// Set the finalized checkpoint. Moving it to a lower epoch is an error.
    pub fn update_finalized_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), Error> {
        let mut checkpoints = self.checkpoints.write();

        if checkpoint.epoch < checkpoints.finalized.epoch {
            return Err(proto_array::Error::RevertedFinalizedEpoch {
                current_finalized_epoch: checkpoints.finalized.epoch,
                new_finalized_epoch: checkpoint.epoch,
            }
            .into());
        }

        if checkpoint.epoch > checkpoints.finalized.epoch {
            info!(
                self.log,
                "Fork choice finalized";
                "epoch" => %checkpoint.epoch,
                "root" => ?checkpoint.root,
            );
        }
        checkpoints.finalized = checkpoint;
        self.refresh_viability(&checkpoints)
    }

    /// Apply checkpoints learned from a block. Justification advances when its epoch is higher,
    /// finalization advances when its epoch is higher and brings its justification along.
    pub fn update_checkpoints(
        &self,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
    ) -> Result<(), Error> {
        let mut checkpoints = self.checkpoints.write();

        let update = checkpoints.update(justified_checkpoint, finalized_checkpoint);
        if update.finalized {
            info!(
                self.log,
                "Fork choice finalized";
                "epoch" => %checkpoints.finalized.epoch,
                "root" => ?checkpoints.finalized.root,
            );
        }
        if update.any() {
            self.refresh_viability(&checkpoints)?;
        }

        Ok(())
    }

    /// Compute the unrealized checkpoints of the block at `block_root` from its post-state and
    /// return the checkpoints the block should be imported with.
    ///
    /// If the parent is already justified in the current epoch, or in the previous epoch while
    /// the state is still in the first third of the current epoch, the parent's unrealized epochs
    /// are copied without touching `state`. Otherwise they are computed from `state`, the store's
    /// unrealized checkpoints are advanced and, if `state` is from a past epoch, the block's
    /// realized epochs are set too since its epoch has certainly ended.
    ///
    /// `current_justified`/`current_finalized` are returned unless the block's epoch has ended.
    pub fn compute_unrealized_checkpoints<S: PostBlockState>(
        &self,
        block_root: Hash256,
        state: &S,
        current_justified: Checkpoint,
        current_finalized: Checkpoint,
    ) -> Result<(Checkpoint, Checkpoint), Error> {
        let parent_epochs = {
            let proto_array = self.proto_array.read();
            let core = proto_array.core_proto_array();
            let node = core
                .get_node(&block_root)
                .ok_or(proto_array::Error::UnknownRoot(block_root))?;
            node.parent.and_then(|index| core.nodes.get(index)).map(|parent| {
                (
                    parent.unrealized_justified_epoch,
                    parent.unrealized_finalized_epoch,
                )
            })
        };
        let (parent_justified_epoch, parent_finalized_epoch) = match parent_epochs {
            Some(epochs) => epochs,
            None => return Ok((current_justified, current_finalized)),
        };

        let slots_per_epoch = self.spec.slots_per_epoch;
        let times = self.slot_times();
        let current_epoch = times.epoch_of(self.now());
        let state_slot = state.slot();
        let state_epoch = state_slot.epoch(slots_per_epoch);

        let parent_justified_in_current = parent_justified_epoch == current_epoch;
        let parent_justified_in_previous =
            parent_justified_epoch.saturating_add(1_u64) == current_epoch;
        let early_in_epoch = times
            .slots_since_epoch_start(state_slot)
            .saturating_mul(3)
            < slots_per_epoch;

        if parent_justified_in_current
            || (state_epoch == current_epoch && parent_justified_in_previous && early_in_epoch)
        {
            let mut proto_array = self.proto_array.write();
            let core = proto_array.core_proto_array_mut();
            let (justified_epoch, finalized_epoch) = core
                .get_node(&block_root)
                .map(|node| {
                    (
                        max(node.unrealized_justified_epoch, parent_justified_epoch),
                        max(node.unrealized_finalized_epoch, parent_finalized_epoch),
                    )
                })
                .ok_or(proto_array::Error::UnknownRoot(block_root))?;
            core.update_unrealized_epochs(block_root, justified_epoch, finalized_epoch)
                .map_err(|e| self.map_error("pull up parent checkpoints", e))?;

            return Ok((current_justified, current_finalized));
        }

        let (unrealized_justified, unrealized_finalized) =
            state.unrealized_checkpoints().map_err(|e| {
                warn!(
                    self.log,
                    "Unable to compute unrealized checkpoints";
                    "block_root" => ?block_root,
                    "state_slot" => %state_slot,
                    "error" => ?e,
                );
                Error::UnrealizedCheckpointProcessing(format!("{:?}", e))
            })?;

        let mut checkpoints = self.checkpoints.write();
        let mut proto_array = self.proto_array.write();
        let core = proto_array.core_proto_array_mut();

        core.update_unrealized_epochs(
            block_root,
            unrealized_justified.epoch,
            unrealized_finalized.epoch,
        )
        .map_err(|e| self.map_error("update unrealized epochs", e))?;
        checkpoints.update_unrealized(unrealized_justified, unrealized_finalized);

        if state_epoch < current_epoch {
            core.set_realized_epochs(
                block_root,
                unrealized_justified.epoch,
                unrealized_finalized.epoch,
            )
            .map_err(|e| self.map_error("realize past epoch", e))?;
            core.update_best_descendants(core.justified_epoch, core.finalized_epoch)
                .map_err(|e| self.map_error("realize past epoch", e))?;

            return Ok((unrealized_justified, unrealized_finalized));
        }

        Ok((current_justified, current_finalized))
    }

    /// Copy the unrealized epochs of every node into its realized epochs and advance the store's
    /// checkpoints to the unrealized ones if any node is now ahead of them.
    pub fn realize_unrealized_checkpoints(&self) -> Result<(), Error> {
        let mut checkpoints = self.checkpoints.write();
        let mut proto_array = self.proto_array.write();
        let core = proto_array.core_proto_array_mut();

        let (max_justified_epoch, max_finalized_epoch) = core.realize_unrealized_epochs();

        if max_justified_epoch > checkpoints.justified.epoch {
            let unrealized_justified = checkpoints.unrealized_justified;
            checkpoints.set_justified(unrealized_justified);
        }

        if max_finalized_epoch > checkpoints.finalized.epoch {
            let unrealized_justified = checkpoints.unrealized_justified;
            checkpoints.set_justified(unrealized_justified);
            checkpoints.finalized = checkpoints.unrealized_finalized;
            info!(
                self.log,
                "Fork choice finalized";
                "epoch" => %checkpoints.finalized.epoch,
                "root" => ?checkpoints.finalized.root,
            );
        }

        debug!(
            self.log,
            "Realized unrealized checkpoints";
            "justified_epoch" => %checkpoints.justified.epoch,
            "finalized_epoch" => %checkpoints.finalized.epoch,
        );

        core.update_best_descendants(checkpoints.justified.epoch, checkpoints.finalized.epoch)
            .map_err(|e| self.map_error("realize unrealized checkpoints", e))
    }

    /// Called whenever the current slot changes. Clears the proposer boost and realizes
    /// unrealized checkpoints once an epoch boundary has been crossed.
    ///
    /// Slots which are not later than the last tick are ignored.
    pub fn on_tick(&self, current_slot: Slot) -> Result<(), Error> {
        let previous_slot = {
            let mut checkpoints = self.checkpoints.write();
            if current_slot <= checkpoints.time {
                return Ok(());
            }
            std::mem::replace(&mut checkpoints.time, current_slot)
        };

        self.set_proposer_boost_root(Hash256::zero());

        let slots_per_epoch = self.spec.slots_per_epoch;
        let epoch_start = current_slot.epoch(slots_per_epoch).start_slot(slots_per_epoch);
        if epoch_start > previous_slot {
            self.realize_unrealized_checkpoints()?;
        }

        Ok(())
    }

    /// Prune the tree to `finalized_root`, which becomes the new root.
    pub fn prune(&self, finalized_root: Hash256) -> Result<(), Error> {
        self.prune_with_signal(finalized_root, None)
    }

    pub fn prune_with_signal(
        &self,
        finalized_root: Hash256,
        signal: Option<&AbortSignal>,
    ) -> Result<(), Error> {
        let mut proto_array = self.proto_array.write();

        let pruned = proto_array
            .prune_with_signal(finalized_root, signal)
            .map_err(|e| self.map_error("prune", e))?;
        if pruned.is_empty() {
            return Ok(());
        }

        let mut head = self.head.lock();
        if head.map_or(false, |head| !proto_array.contains_block(&head.root)) {
            *head = None;
        }

        self.metrics.prunes.inc();
        self.metrics.pruned_nodes.inc_by(pruned.len() as u64);
        self.metrics.nodes.set(proto_array.len() as i64);
        info!(
            self.log,
            "Pruned fork choice";
            "finalized_root" => ?finalized_root,
            "pruned_nodes" => pruned.len(),
            "remaining_nodes" => proto_array.len(),
        );

        Ok(())
    }

    /// Mark the block at `block_root` and its ancestors as having a valid execution payload.
    pub fn set_optimistic_to_valid(&self, block_root: Hash256) -> Result<(), Error> {
        self.proto_array
            .write()
            .core_proto_array_mut()
            .set_optimistic_to_valid(block_root)
            .map_err(|e| self.map_error("set optimistic to valid", e))?;

        debug!(
            self.log,
            "Execution payload validated";
            "root" => ?block_root,
        );

        Ok(())
    }

    /// Set the genesis time in seconds since the UNIX epoch.
    pub fn set_genesis_time(&self, genesis_time: u64) {
        self.genesis_time.store(genesis_time, Ordering::Relaxed);
    }

    /// Set the root of the anchor block, which zero-root checkpoints refer to.
    pub fn set_origin_root(&self, origin_root: Hash256) {
        self.checkpoints.write().origin_root = origin_root;
    }

    /// Find the head by following the best descendant of the justified block.
    ///
    /// Fails rather than returning a best-effort head if the block found is not viable.
    pub fn head(&self) -> Result<Hash256, Error> {
        let checkpoints = self.checkpoints.read();
        let proto_array = self.proto_array.read();
        let core = proto_array.core_proto_array();

        let justified_checkpoint = checkpoints.resolve(checkpoints.justified);
        let head_root = {
            let _timer = self.metrics.find_head_times.start_timer();
            core.find_head(&justified_checkpoint)
        }
        .map_err(|e| {
            if e.is_no_viable_head() {
                self.metrics.no_viable_head.inc();
            }
            self.map_error("find head", e)
        })?;
        let head_slot = core
            .get_node(&head_root)
            .map(|node| node.slot)
            .ok_or(proto_array::Error::UnknownRoot(head_root))?;

        let mut cached_head = self.head.lock();
        if cached_head.map(|head| head.root) != Some(head_root) {
            self.metrics.head_changes.inc();

            if let Some(previous) = *cached_head {
                if !core.is_descendant(previous.root, head_root) {
                    self.metrics.reorgs.inc();
                    debug!(
                        self.log,
                        "Fork choice re-org";
                        "previous_head" => ?previous.root,
                        "previous_slot" => %previous.slot,
                        "new_head" => ?head_root,
                        "new_slot" => %head_slot,
                    );
                }
            }

            debug!(
                self.log,
                "Fork choice head changed";
                "head" => ?head_root,
                "slot" => %head_slot,
                "justified_epoch" => %justified_checkpoint.epoch,
            );
            *cached_head = Some(CachedHead {
                root: head_root,
                slot: head_slot,
            });
        }

        Ok(head_root)
    }

    /// The head to build a block on at the current slot.
    ///
    /// This is the parent of the head if the head arrived late, is weak, and its parent is
    /// strong enough to be re-orged onto in time. Otherwise it is the head.
    pub fn get_proposer_head(&self) -> Result<Hash256, Error> {
        let head_root = self.head()?;
        let proposal_slot = self.current_slot();

        let decision = self.re_org_parent(head_root, proposal_slot).and_then(|parent_root| {
            let slot_delay = self.slot_times().delay_into(proposal_slot, self.now());
            let re_org_cutoff = self.re_org_cutoff();
            if slot_delay >= re_org_cutoff {
                Err(DoNotReOrg::NotProposingOnTime {
                    slot_delay,
                    re_org_cutoff,
                })
            } else {
                Ok(parent_root)
            }
        });

        match decision {
            Ok(parent_root) => {
                info!(
                    self.log,
                    "Attempting re-org due to weak head";
                    "weak_head" => ?head_root,
                    "parent" => ?parent_root,
                    "slot" => %proposal_slot,
                );
                Ok(parent_root)
            }
            Err(reason) => {
                debug!(
                    self.log,
                    "Not attempting re-org";
                    "reason" => %reason,
                );
                Ok(head_root)
            }
        }
    }

    /// Returns `true` if the forkchoice update for `head_root` should be withheld from the
    /// execution layer because a proposer at `proposing_slot` is expected to re-org it.
    ///
    /// Once the current slot is `proposing_slot` and the re-org cutoff has passed the override
    /// is refused and counted as a late re-org failure.
    pub fn should_override_forkchoice_update(
        &self,
        head_root: Hash256,
        proposing_slot: Slot,
    ) -> bool {
        let decision = self.re_org_parent(head_root, proposing_slot).and_then(|parent_root| {
            let times = self.slot_times();
            let now = self.now();
            let current_slot = times.slot_of(now);

            if current_slot == proposing_slot {
                let slot_delay = times.delay_into(current_slot, now);
                let re_org_cutoff = self.re_org_cutoff();
                if slot_delay >= re_org_cutoff {
                    self.metrics.late_reorg_failures.inc();
                    return Err(DoNotReOrg::NotProposingOnTime {
                        slot_delay,
                        re_org_cutoff,
                    });
                }
            } else if current_slot.saturating_add(1_u64) != proposing_slot {
                return Err(DoNotReOrg::HeadDistance {
                    head_slot: current_slot,
                    proposal_slot: proposing_slot,
                });
            }

            Ok(parent_root)
        });

        match decision {
            Ok(parent_root) => {
                debug!(
                    self.log,
                    "Fork choice update overridden";
                    "canonical_head" => ?head_root,
                    "override" => ?parent_root,
                    "slot" => %proposing_slot,
                );
                true
            }
            Err(reason) => {
                debug!(
                    self.log,
                    "Not suppressing fork choice update";
                    "reason" => %reason,
                );
                false
            }
        }
    }

    /// Returns the parent of `head_root` if the head may be re-orged by a proposal at
    /// `proposal_slot`, ignoring the timing of the proposal itself.
    fn re_org_parent(&self, head_root: Hash256, proposal_slot: Slot) -> Result<Hash256, DoNotReOrg> {
        let re_org_head_threshold = self
            .config
            .re_org_head_threshold
            .ok_or(DoNotReOrg::ReOrgsDisabled)?;
        if self.spec.proposer_score_boost.is_none() {
            return Err(DoNotReOrg::ReOrgsDisabled);
        }

        let times = self.slot_times();
        let checkpoints = self.checkpoints.read();
        let proto_array = self.proto_array.read();
        let core = proto_array.core_proto_array();

        let head = core
            .get_node(&head_root)
            .ok_or(DoNotReOrg::MissingHeadOrParentNode)?;
        let parent = head
            .parent
            .and_then(|index| core.nodes.get(index))
            .ok_or(DoNotReOrg::MissingHeadOrParentNode)?;

        let balances = proto_array.balances();
        let slots_per_epoch = self.spec.slots_per_epoch;
        let context = ReOrgContext {
            proposal_slot,
            slots_per_epoch,
            finalized_epoch: checkpoints.finalized.epoch,
            max_epochs_since_finalization: self.config.re_org_max_epochs_since_finalization,
            head_block_delay: head.timestamp.saturating_sub(times.start_of(head.slot)),
            attestation_deadline: self.spec.interval_duration(),
            re_org_head_weight_threshold: calculate_committee_fraction(
                balances,
                re_org_head_threshold.0,
                slots_per_epoch,
            )
            .unwrap_or(0),
            re_org_parent_weight_threshold: calculate_committee_fraction(
                balances,
                self.config.re_org_parent_threshold.0,
                slots_per_epoch,
            )
            .unwrap_or(u64::MAX),
        };

        check_re_org(head, parent, &context)?;

        Ok(parent.root)
    }

    pub fn re_org_cutoff(&self) -> Duration {
        self.config.re_org_cutoff(self.spec.seconds_per_slot)
    }

    pub fn has_node(&self, block_root: &Hash256) -> bool {
        self.proto_array.read().contains_block(block_root)
    }

    pub fn weight(&self, block_root: &Hash256) -> Result<u64, Error> {
        self.proto_array
            .read()
            .get_weight(block_root)
            .ok_or_else(|| proto_array::Error::UnknownRoot(*block_root).into())
    }

    pub fn is_optimistic(&self, block_root: &Hash256) -> Result<bool, Error> {
        self.proto_array
            .read()
            .is_optimistic(block_root)
            .ok_or_else(|| proto_array::Error::UnknownRoot(*block_root).into())
    }

    pub fn get_block(&self, block_root: &Hash256) -> Option<Block> {
        self.proto_array.read().get_block(block_root)
    }

    pub fn node_count(&self) -> usize {
        self.proto_array.read().len()
    }

    pub fn latest_message(&self, validator_index: usize) -> Option<(Hash256, Epoch)> {
        self.proto_array.read().latest_message(validator_index)
    }

    pub fn block_root_by_payload_hash(&self, payload_hash: &ExecutionBlockHash) -> Option<Hash256> {
        self.proto_array
            .read()
            .core_proto_array()
            .block_root_by_payload_hash(payload_hash)
    }

    /// Returns `true` if `descendant_root` is `ancestor_root` or one of its descendants.
    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        self.proto_array
            .read()
            .core_proto_array()
            .is_descendant(ancestor_root, descendant_root)
    }

    /// The root of the latest block at or before `slot` on the chain ending at `block_root`.
    pub fn ancestor_root(&self, block_root: &Hash256, slot: Slot) -> Option<Hash256> {
        self.proto_array
            .read()
            .core_proto_array()
            .ancestor_root(block_root, slot)
    }

    /// Returns `true` if `block_root` is the cached head or one of its ancestors.
    pub fn is_canonical(&self, block_root: Hash256) -> bool {
        let proto_array = self.proto_array.read();
        let head = *self.head.lock();
        head.map_or(false, |head| {
            proto_array
                .core_proto_array()
                .is_descendant(block_root, head.root)
        })
    }

    pub fn highest_received_block_slot(&self) -> Slot {
        self.proto_array.read().highest_received_block_slot()
    }

    pub fn highest_received_block_root(&self) -> Hash256 {
        self.proto_array.read().highest_received_block_root()
    }

    /// The number of blocks received in the last epoch, according to the clock.
    pub fn received_blocks_last_epoch(&self) -> u64 {
        let count = self
            .proto_array
            .read()
            .received_blocks_last_epoch(self.current_slot());
        self.metrics.received_blocks_last_epoch.set(count as i64);
        count
    }

    pub fn justified_checkpoint(&self) -> Checkpoint {
        self.checkpoints.read().justified
    }

    pub fn best_justified_checkpoint(&self) -> Checkpoint {
        self.checkpoints.read().best_justified
    }

    pub fn finalized_checkpoint(&self) -> Checkpoint {
        self.checkpoints.read().finalized
    }

    pub fn unrealized_justified_checkpoint(&self) -> Checkpoint {
        self.checkpoints.read().unrealized_justified
    }

    pub fn unrealized_finalized_checkpoint(&self) -> Checkpoint {
        self.checkpoints.read().unrealized_finalized
    }

    pub fn origin_root(&self) -> Hash256 {
        self.checkpoints.read().origin_root
    }

    pub fn proposer_boost_root(&self) -> Hash256 {
        self.proto_array.read().proposer_boost_root()
    }

    pub fn cached_head(&self) -> Option<CachedHead> {
        *self.head.lock()
    }

    pub fn genesis_time(&self) -> u64 {
        self.genesis_time.load(Ordering::Relaxed)
    }

    /// The current slot according to the clock, or slot 0 before genesis.
    pub fn current_slot(&self) -> Slot {
        self.slot_times().slot_of(self.now())
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn config(&self) -> &ForkChoiceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ForkChoiceMetrics {
        &self.metrics
    }

    fn now(&self) -> Duration {
        self.clock.now_duration().unwrap_or_default()
    }

    fn slot_times(&self) -> SlotTimes {
        SlotTimes {
            genesis_time: self.genesis_time(),
            seconds_per_slot: self.spec.seconds_per_slot,
            slots_per_epoch: self.spec.slots_per_epoch,
        }
    }

    /// Refresh the viability filter of the tree to match `checkpoints`.
    ///
    /// The caller must hold the checkpoints lock.
    fn refresh_viability(&self, checkpoints: &ForkChoiceCheckpoints) -> Result<(), Error> {
        self.proto_array
            .write()
            .core_proto_array_mut()
            .update_best_descendants(checkpoints.justified.epoch, checkpoints.finalized.epoch)
            .map_err(|e| self.map_error("refresh viability", e))
    }

    /// Log invariant violations and safety failures loudly before handing them to the caller.
    fn map_error(&self, operation: &'static str, error: proto_array::Error) -> Error {
        if error.is_corrupt_tree() || error.is_no_viable_head() {
            crit!(
                self.log,
                "Fork choice failure";
                "operation" => operation,
                "error" => ?error,
            );
        }
        error.into()
    }
}
