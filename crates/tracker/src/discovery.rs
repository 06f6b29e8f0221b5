use std::fmt;
use std::hash::Hash;

use crate::applier::AttachmentPoints;
use crate::armour::ArmourAssignment;
use crate::fingerprint::Fingerprint;
use crate::handle::HandleOracle;
use crate::pipeline::{PropObjects, SetupError, StageError};
use crate::preset::PresetOwner;
use crate::settings::TrackerSettings;
use crate::situation::Situation;
use crate::visibility::FrameInfo;

/// Cheap identity snapshot for one slot, reused across frames while valid.
pub trait BasicInfo: Clone + Send + 'static {
    /// Stable identity the cooldown table is keyed on.
    type Key: Clone + Eq + Hash + fmt::Debug + Send + 'static;

    fn key(&self) -> Self::Key;

    fn female(&self) -> bool;

    /// Every captured handle still denotes a live object of its type.
    fn is_valid(&self, oracle: &dyn HandleOracle) -> bool;
}

/// Outcome of the basic-info walk for one index.
#[derive(Debug, Clone, PartialEq)]
pub enum BasicResolution<B> {
    Resolved(B),
    /// The backing host slot is empty. Ground truth, not a failure.
    Absent,
    /// Present, but of a category that is never customised.
    Unsupported,
    /// An expected sub-object is transiently missing.
    NotYetAvailable(&'static str),
}

/// Host context the per-frame work is evaluated in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameContext {
    pub situation: Option<Situation>,
    pub in_quest: bool,
    pub online: bool,
}

impl FrameContext {
    pub fn in_menu(&self) -> bool {
        self.situation.is_some_and(Situation::is_menu)
    }
}

/// Which slots the tracker visits this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPlan {
    /// Nothing is tracked; signals are ignored.
    Idle,
    /// Only these indices are meaningful. Resolved eagerly every frame
    /// since menu scenes raise no per-entity signals.
    Fixed(&'static [usize]),
    /// Every slot in the store.
    All,
}

/// How an "entity changed" signal invalidates a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangePolicy {
    /// Keep occupancy, drop the resolved record and the retry count.
    DropPersistent,
    /// Return the slot to unoccupied.
    ClearSlot,
}

/// Accumulated per-entity hide requests from the presets applied this pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropHides {
    pub weapon: bool,
    pub slinger: bool,
}

/// Entity-kind specific discovery. The generic tracker owns caching,
/// budgeting, and scheduling; implementors only answer host questions.
pub trait Discovery: Send + 'static {
    type Basic: BasicInfo;

    const LABEL: &'static str;
    const CHANGE_POLICY: ChangePolicy;
    /// Raw situation flags whose edges force a one-shot full refetch.
    const REFETCH_EDGES: &'static [Situation];

    fn oracle(&self) -> &dyn HandleOracle;

    fn capacity(&self) -> Result<usize, SetupError>;

    fn scan_plan(&self, ctx: &FrameContext, settings: &TrackerSettings) -> ScanPlan;

    fn resolve_basic(&self, index: usize, ctx: &FrameContext) -> BasicResolution<Self::Basic>;

    fn evaluate_frame(
        &self,
        index: usize,
        basic: &Self::Basic,
        ctx: &FrameContext,
        settings: &TrackerSettings,
    ) -> FrameInfo;

    fn preset_owner(&self, index: usize, basic: &Self::Basic) -> PresetOwner;

    fn identify_armour(
        &self,
        index: usize,
        basic: &Self::Basic,
        ctx: &FrameContext,
    ) -> Result<ArmourAssignment, StageError>;

    fn locate_attachments(
        &self,
        basic: &Self::Basic,
        armour: &ArmourAssignment,
    ) -> Result<AttachmentPoints, StageError>;

    fn locate_props(&self, _basic: &Self::Basic, _points: &AttachmentPoints) -> PropObjects {
        PropObjects::default()
    }

    /// Fingerprint of the attachment points the host currently exposes, for
    /// contexts where a model can be swapped without any signal. `None`
    /// disables the check.
    fn model_fingerprint(
        &self,
        _basic: &Self::Basic,
        _ctx: &FrameContext,
    ) -> Option<Fingerprint> {
        None
    }

    fn apply_prop_visibility(
        &self,
        _frame: &FrameInfo,
        _props: &PropObjects,
        _hides: PropHides,
        _settings: &TrackerSettings,
    ) {
    }
}
