use std::fmt;

use thiserror::Error;
use tracing::debug_span;

use crate::applier::{
    ApplierFactory, ApplierKind, ApplierRequest, AttachmentApplier, AttachmentPoints,
};
use crate::armour::ArmourAssignment;
use crate::discovery::{BasicInfo, Discovery, FrameContext};
use crate::fingerprint::Fingerprint;
use crate::handle::ExternalRef;
use crate::preset::PresetOwner;

/// Why a persistent-info pass was abandoned. Logged, never propagated out of
/// the frame tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("equipped armour unavailable: {0}")]
    EquippedArmour(String),
    #[error("attachment points unavailable: {0}")]
    AttachmentPoints(String),
    #[error("bone applier failed to initialize")]
    Bones,
    #[error("part applier failed to initialize")]
    Parts,
    #[error("material applier failed to initialize")]
    Materials,
}

impl StageError {
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::EquippedArmour(_) => "equipped_armour",
            StageError::AttachmentPoints(_) => "attachment_points",
            StageError::Bones => "bones",
            StageError::Parts => "parts",
            StageError::Materials => "materials",
        }
    }

    fn applier(kind: ApplierKind) -> Self {
        match kind {
            ApplierKind::Bone => StageError::Bones,
            ApplierKind::Part => StageError::Parts,
            ApplierKind::Material => StageError::Materials,
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{tracker} tracker could not read the {list} list size")]
    ListUnavailable {
        tracker: &'static str,
        list: &'static str,
    },
}

/// Weapon, kinsect and slinger objects whose draw flag follows preset hides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropObjects {
    pub weapons: Vec<ExternalRef>,
    pub kinsects: Vec<ExternalRef>,
    pub slinger: Option<ExternalRef>,
}

/// Expensive, long-lived attachment state for one occupied slot.
pub struct PersistentInfo {
    pub owner: PresetOwner,
    pub armour: ArmourAssignment,
    pub points: AttachmentPoints,
    pub props: PropObjects,
    pub fingerprint: Fingerprint,
    pub(crate) bones: Box<dyn AttachmentApplier>,
    pub(crate) parts: Box<dyn AttachmentApplier>,
    pub(crate) materials: Box<dyn AttachmentApplier>,
}

impl fmt::Debug for PersistentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentInfo")
            .field("owner", &self.owner)
            .field("armour", &self.armour)
            .field("points", &self.points)
            .field("props", &self.props)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Per-frame admission control for persistent resolution.
///
/// Every attempt is charged up front, successful or not, so the number of
/// attempts in a frame can never exceed the limit. A limit of zero behaves
/// as one.
#[derive(Debug)]
pub(crate) struct FetchBudget {
    used: u32,
    limit: u32,
}

impl FetchBudget {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            used: 0,
            limit: limit.max(1),
        }
    }

    pub(crate) fn try_charge(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }
}

/// Runs the five-stage pipeline. Each stage consumes the previous one's output
/// and any failure abandons the pass.
pub(crate) fn resolve_persistent<D: Discovery>(
    discovery: &D,
    factory: &dyn ApplierFactory,
    index: usize,
    basic: &D::Basic,
    ctx: &FrameContext,
) -> Result<PersistentInfo, StageError> {
    let armour = {
        let _span = debug_span!("equipped_armour", index).entered();
        discovery.identify_armour(index, basic, ctx)?
    };

    let points = {
        let _span = debug_span!("attachment_points", index).entered();
        discovery.locate_attachments(basic, &armour)?
    };

    let female = basic.female();
    let build = |kind: ApplierKind| -> Result<Box<dyn AttachmentApplier>, StageError> {
        let _span = debug_span!("build_applier", index, %kind).entered();
        let applier = factory.build(&ApplierRequest {
            kind,
            points: &points,
            armour: &armour,
            female,
        });
        if applier.is_initialized() {
            Ok(applier)
        } else {
            Err(StageError::applier(kind))
        }
    };
    let bones = build(ApplierKind::Bone)?;
    let parts = build(ApplierKind::Part)?;
    let materials = build(ApplierKind::Material)?;

    let props = discovery.locate_props(basic, &points);
    let fingerprint = points.fingerprint();

    Ok(PersistentInfo {
        owner: discovery.preset_owner(index, basic),
        armour,
        points,
        props,
        fingerprint,
        bones,
        parts,
        materials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_refuses_past_limit() {
        let mut budget = FetchBudget::new(2);
        assert!(budget.try_charge());
        assert!(budget.try_charge());
        assert!(!budget.try_charge());
        assert!(!budget.try_charge());
    }

    #[test]
    fn zero_budget_still_admits_one() {
        let mut budget = FetchBudget::new(0);
        assert!(budget.try_charge());
        assert!(!budget.try_charge());
    }

    #[test]
    fn stage_names_match_pipeline_order() {
        let stages = [
            StageError::EquippedArmour("x".to_owned()),
            StageError::AttachmentPoints("x".to_owned()),
            StageError::Bones,
            StageError::Parts,
            StageError::Materials,
        ]
        .map(|error| error.stage());
        assert_eq!(
            stages,
            ["equipped_armour", "attachment_points", "bones", "parts", "materials"]
        );
    }

    #[test]
    fn applier_errors_name_the_applier() {
        assert_eq!(
            StageError::applier(ApplierKind::Material).to_string(),
            "material applier failed to initialize"
        );
    }
}
