use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, debug_span, info, trace, warn};

use crate::applier::ApplierFactory;
use crate::cooldown::CooldownTable;
use crate::discovery::{BasicInfo, BasicResolution, ChangePolicy, Discovery, FrameContext, ScanPlan};
use crate::pipeline::{resolve_persistent, FetchBudget, SetupError};
use crate::preset::PresetSource;
use crate::scheduler::{apply_entity, select_closest, Candidate, EntityOutcome};
use crate::settings::{SettingsHandle, TrackerSettings};
use crate::situation::{SituationFlags, SituationWatcher};
use crate::slots::{SlotState, SlotStore};
use crate::visibility::FrameInfo;

static TRACKER_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn lock_shared<B: BasicInfo>(shared: &Mutex<Shared<B>>) -> MutexGuard<'_, Shared<B>> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            if TRACKER_LOCK_POISON_WARNED
                .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                warn!("tracker lock poisoned; recovered inner value");
            }
            poisoned.into_inner()
        }
    }
}

/// State touched by both the frame thread and signal callbacks.
pub(crate) struct Shared<B: BasicInfo> {
    slots: SlotStore<B>,
    cooldowns: CooldownTable<B::Key>,
    needs_all_fetch: bool,
    idle: bool,
    in_quest: bool,
    last_selection: Option<u32>,
}

impl<B: BasicInfo> Shared<B> {
    fn new(capacity: usize) -> Self {
        Self {
            slots: SlotStore::with_capacity(capacity),
            cooldowns: CooldownTable::default(),
            needs_all_fetch: true,
            idle: false,
            in_quest: false,
            last_selection: None,
        }
    }

    fn reset(&mut self) {
        self.slots.reset();
        self.cooldowns.clear();
        self.needs_all_fetch = true;
    }
}

/// How cached basic records are treated for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    /// Reuse valid caches; only occupied or flagged slots are resolved.
    Cached,
    /// Also probe unoccupied slots for newly spawned entities.
    Discover,
    /// Ignore every cache and resolve everything once.
    Refetch,
}

/// Read-only view of one slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotView {
    pub state: SlotState,
    pub retries: u32,
    pub needs_refetch: bool,
    pub suppressed: bool,
    pub frame: Option<FrameInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCounts {
    pub unoccupied: usize,
    pub basic_only: usize,
    pub resolved: usize,
}

/// What one frame tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub reset: bool,
    pub visited: u32,
    pub basic_resolutions: u32,
    pub persistent_attempts: u32,
    pub persistent_resolved: u32,
    pub invalidated: u32,
}

/// What one apply pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Quest-only mode is on and no quest is active.
    pub gated: bool,
    pub candidates: usize,
    pub applied: u32,
    pub cooling: u32,
    pub invalidated: u32,
}

/// Cloneable entry point for host callbacks. Safe to call from any thread;
/// each call takes the slot lock briefly.
pub struct TrackerSignals<B: BasicInfo> {
    label: &'static str,
    policy: ChangePolicy,
    shared: Arc<Mutex<Shared<B>>>,
}

impl<B: BasicInfo> Clone for TrackerSignals<B> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            policy: self.policy,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: BasicInfo> fmt::Debug for TrackerSignals<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerSignals")
            .field("label", &self.label)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<B: BasicInfo> TrackerSignals<B> {
    /// Equipment finished changing, the entity warped, or something else made
    /// its resolved state untrustworthy.
    pub fn entity_changed(&self, index: usize) {
        let mut shared = lock_shared(&self.shared);
        if shared.idle {
            trace!(tracker = self.label, index, "signal_ignored_while_idle");
            return;
        }
        let slots = &mut shared.slots;
        if !slots.contains(index) {
            debug!(tracker = self.label, index, "signal_index_out_of_range");
            return;
        }

        match self.policy {
            ChangePolicy::DropPersistent => {
                slots.drop_persistent(index);
                slots.invalidate_basic(index);
                slots.retries[index] = 0;
                slots.suppressed[index] = false;
            }
            ChangePolicy::ClearSlot => slots.clear_slot(index),
        }
        slots.needs_refetch[index] = true;
        debug!(tracker = self.label, index, "entity_changed");
    }

    /// A selection list moved to `selection`. Any difference from the last
    /// value seen wipes the store, as with a situation change.
    pub fn selection_changed(&self, selection: u32) {
        let mut shared = lock_shared(&self.shared);
        if shared.last_selection == Some(selection) {
            return;
        }
        shared.last_selection = Some(selection);
        shared.reset();
        info!(tracker = self.label, selection, "tracker_reset_on_selection");
    }
}

/// Per-kind tracking engine: slot cache, fetch budget, and apply scheduler
/// around one [`Discovery`] implementation.
pub struct Tracker<D: Discovery> {
    discovery: D,
    presets: Arc<dyn PresetSource>,
    appliers: Arc<dyn ApplierFactory>,
    settings: SettingsHandle,
    shared: Arc<Mutex<Shared<D::Basic>>>,
    watcher: SituationWatcher,
    context: FrameContext,
    last_rescan: Option<Instant>,
}

impl<D: Discovery> Tracker<D> {
    pub fn new(
        discovery: D,
        presets: Arc<dyn PresetSource>,
        appliers: Arc<dyn ApplierFactory>,
        settings: SettingsHandle,
    ) -> Result<Self, SetupError> {
        let capacity = discovery.capacity()?;
        info!(tracker = D::LABEL, slots = capacity, "tracker_slots_ready");

        Ok(Self {
            discovery,
            presets,
            appliers,
            settings,
            shared: Arc::new(Mutex::new(Shared::new(capacity))),
            watcher: SituationWatcher::new(D::REFETCH_EDGES),
            context: FrameContext::default(),
            last_rescan: None,
        })
    }

    pub fn label(&self) -> &'static str {
        D::LABEL
    }

    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    pub fn signals(&self) -> TrackerSignals<D::Basic> {
        TrackerSignals {
            label: D::LABEL,
            policy: D::CHANGE_POLICY,
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn context(&self) -> FrameContext {
        self.context
    }

    pub fn capacity(&self) -> usize {
        lock_shared(&self.shared).slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<SlotView> {
        let shared = lock_shared(&self.shared);
        let slots = &shared.slots;
        slots.contains(index).then(|| SlotView {
            state: slots.state(index),
            retries: slots.retries[index],
            needs_refetch: slots.needs_refetch[index],
            suppressed: slots.suppressed[index],
            frame: slots.frames[index],
        })
    }

    pub fn counts(&self) -> SlotCounts {
        let shared = lock_shared(&self.shared);
        SlotCounts {
            unoccupied: shared.slots.count(SlotState::Unoccupied),
            basic_only: shared.slots.count(SlotState::BasicOnly),
            resolved: shared.slots.count(SlotState::Resolved),
        }
    }

    pub fn cooldowns(&self) -> usize {
        lock_shared(&self.shared).cooldowns.len()
    }

    /// Wipes every slot, cooldown, and retry counter.
    pub fn reset(&mut self) {
        lock_shared(&self.shared).reset();
        info!(tracker = D::LABEL, "tracker_reset_requested");
    }

    /// Discovery and resolution for one frame. Never fails; every problem is
    /// contained in the slot it concerns.
    pub fn frame(&mut self, flags: &SituationFlags, now: Instant) -> FrameReport {
        let _span = debug_span!("tracker_frame", tracker = D::LABEL).entered();
        let settings = self.settings.snapshot();
        let transition = self.watcher.observe(flags);
        self.context = FrameContext {
            situation: transition.situation,
            in_quest: flags.in_quest,
            online: flags.online,
        };
        let ctx = self.context;
        let plan = self.discovery.scan_plan(&ctx, &settings);

        let mut guard = lock_shared(&self.shared);
        let shared = &mut *guard;
        let mut report = FrameReport::default();

        shared.in_quest = flags.in_quest;
        shared.idle = plan == ScanPlan::Idle;

        if transition.reset {
            shared.reset();
            report.reset = true;
            info!(
                tracker = D::LABEL,
                situation = ?transition.situation,
                "tracker_reset"
            );
        }
        if transition.refetch_all {
            shared.needs_all_fetch = true;
        }

        for frame in shared.slots.frames.iter_mut() {
            *frame = None;
        }

        let indices: Vec<usize> = match plan {
            ScanPlan::Idle => return report,
            ScanPlan::Fixed(indices) => indices
                .iter()
                .copied()
                .filter(|index| shared.slots.contains(*index))
                .collect(),
            ScanPlan::All => (0..shared.slots.len()).collect(),
        };
        let eager = matches!(plan, ScanPlan::Fixed(_));

        let mode = if shared.needs_all_fetch {
            shared.needs_all_fetch = false;
            self.last_rescan = Some(now);
            ScanMode::Refetch
        } else if self.rescan_due(&settings, now) {
            self.last_rescan = Some(now);
            ScanMode::Discover
        } else {
            ScanMode::Cached
        };

        let mut budget = FetchBudget::new(settings.max_bone_fetches_per_frame);
        for index in indices {
            report.visited += 1;
            self.refresh_slot(
                shared,
                index,
                mode,
                eager,
                &ctx,
                &settings,
                &mut budget,
                now,
                &mut report,
            );
        }

        report
    }

    fn rescan_due(&self, settings: &TrackerSettings, now: Instant) -> bool {
        let Some(interval) = settings.rescan_interval() else {
            return false;
        };
        self.last_rescan
            .map_or(true, |last| now.saturating_duration_since(last) >= interval)
    }

    #[allow(clippy::too_many_arguments)]
    fn refresh_slot(
        &self,
        shared: &mut Shared<D::Basic>,
        index: usize,
        mode: ScanMode,
        eager: bool,
        ctx: &FrameContext,
        settings: &TrackerSettings,
        budget: &mut FetchBudget,
        now: Instant,
        report: &mut FrameReport,
    ) {
        let ceiling = settings.retry_ceiling;
        let oracle = self.discovery.oracle();
        let slots = &mut shared.slots;

        if slots.suppressed[index] {
            return;
        }

        if mode == ScanMode::Refetch {
            slots.invalidate_basic(index);
        } else if slots.basic[index]
            .as_ref()
            .is_some_and(|basic| !basic.is_valid(oracle))
        {
            slots.invalidate_basic(index);
            debug!(tracker = D::LABEL, index, "basic_info_invalidated");
        }

        if slots.basic[index].is_none() {
            let occupied = slots.key(index).is_some();
            let wanted = eager || occupied || slots.needs_refetch[index] || mode != ScanMode::Cached;
            if !wanted || slots.exhausted(index, ceiling) {
                return;
            }

            report.basic_resolutions += 1;
            match self.discovery.resolve_basic(index, ctx) {
                BasicResolution::Resolved(basic) => {
                    if slots.seed(index, basic) {
                        debug!(tracker = D::LABEL, index, "slot_occupied");
                    }
                }
                BasicResolution::Absent => {
                    if occupied {
                        debug!(tracker = D::LABEL, index, "slot_vacated");
                    }
                    slots.clear_slot(index);
                    return;
                }
                BasicResolution::Unsupported => {
                    slots.mark_unsupported(index);
                    debug!(tracker = D::LABEL, index, "slot_unsupported");
                    return;
                }
                BasicResolution::NotYetAvailable(reason) => {
                    let retries = slots.note_failure(index);
                    log_failure(D::LABEL, index, retries, ceiling, "basic_info", &reason);
                    return;
                }
            }
        }

        let Some(basic) = slots.basic[index].as_ref() else {
            return;
        };
        let frame = self.discovery.evaluate_frame(index, basic, ctx, settings);
        slots.frames[index] = Some(frame);

        if let Some(info) = slots.persistent[index].as_ref() {
            let swapped = self
                .discovery
                .model_fingerprint(basic, ctx)
                .is_some_and(|current| current != info.fingerprint);
            if !swapped {
                return;
            }
            slots.persistent[index] = None;
            slots.needs_refetch[index] = true;
            report.invalidated += 1;
            debug!(tracker = D::LABEL, index, "attachment_model_swapped");
        }

        if slots.retries[index] >= ceiling || !(frame.visible || slots.needs_refetch[index]) {
            return;
        }
        if !budget.try_charge() {
            return;
        }

        report.persistent_attempts += 1;
        let key = basic.key();
        let resolved =
            resolve_persistent(&self.discovery, self.appliers.as_ref(), index, basic, ctx);
        match resolved {
            Ok(info) => {
                debug!(
                    tracker = D::LABEL,
                    index,
                    owner = %info.owner,
                    fingerprint = ?info.fingerprint,
                    "persistent_info_resolved"
                );
                slots.persistent[index] = Some(info);
                slots.retries[index] = 0;
                slots.needs_refetch[index] = false;
                shared.cooldowns.stamp(key, now);
                report.persistent_resolved += 1;
            }
            Err(error) => {
                let retries = slots.note_failure(index);
                log_failure(D::LABEL, index, retries, ceiling, error.stage(), &error);
            }
        }
    }

    /// Pushes resolved presets onto the closest visible entities. Runs every
    /// frame regardless of what [`Tracker::frame`] resolved.
    pub fn apply_all(&mut self, now: Instant) -> ApplyReport {
        let _span = debug_span!("tracker_apply", tracker = D::LABEL).entered();
        let settings = self.settings.snapshot();
        let delay = settings.equip_delay();
        let oracle = self.discovery.oracle();
        let mut report = ApplyReport::default();

        let mut guard = lock_shared(&self.shared);
        let Shared {
            slots,
            cooldowns,
            in_quest,
            ..
        } = &mut *guard;

        cooldowns.expire(now, delay);
        if settings.enable_during_quests_only && !*in_quest {
            report.gated = true;
            return report;
        }

        let preview = self.presets.previewed_preset();
        let cap = usize::try_from(settings.max_concurrent_applications)
            .ok()
            .filter(|cap| *cap > 0);

        let mut candidates: Vec<Candidate> = (0..slots.len())
            .filter_map(|index| {
                let frame = slots.frames[index]?;
                let ready = frame.visible
                    && slots.basic[index].is_some()
                    && slots.persistent[index].is_some();
                ready.then_some(Candidate {
                    index,
                    distance_sq: frame.distance_sq,
                })
            })
            .collect();
        report.candidates = candidates.len();
        select_closest(&mut candidates, cap);

        for Candidate { index, .. } in candidates {
            let Some(key) = slots.basic[index].as_ref().map(BasicInfo::key) else {
                continue;
            };
            if cooldowns.is_cooling(&key, now, delay) {
                report.cooling += 1;
                continue;
            }
            let Some(info) = slots.persistent[index].as_mut() else {
                continue;
            };
            if !info.points.are_live(oracle) {
                slots.persistent[index] = None;
                slots.needs_refetch[index] = true;
                report.invalidated += 1;
                debug!(tracker = D::LABEL, index, "attachment_points_stale");
                continue;
            }

            match apply_entity(info, self.presets.as_ref(), preview.as_ref()) {
                EntityOutcome::InvalidBone(piece) => {
                    slots.clear_slot(index);
                    slots.needs_refetch[index] = true;
                    report.invalidated += 1;
                    warn!(tracker = D::LABEL, index, %piece, "invalid_bone_configuration");
                }
                EntityOutcome::Applied { pieces, hides } => {
                    if let Some(frame) = slots.frames[index] {
                        self.discovery
                            .apply_prop_visibility(&frame, &info.props, hides, &settings);
                    }
                    report.applied += 1;
                    trace!(tracker = D::LABEL, index, pieces, "entity_applied");
                }
            }
        }

        report
    }
}

fn log_failure(
    tracker: &'static str,
    index: usize,
    retries: u32,
    ceiling: u32,
    stage: &str,
    reason: &dyn fmt::Display,
) {
    if retries == ceiling {
        warn!(tracker, index, retries, stage, %reason, "slot_retry_ceiling_reached");
    } else {
        debug!(tracker, index, retries, stage, %reason, "slot_resolution_failed");
    }
}
