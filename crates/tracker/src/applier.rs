use std::fmt;

use crate::armour::{ArmorPart, ArmourAssignment, ArmourPiece};
use crate::fingerprint::Fingerprint;
use crate::handle::{all_live, ExternalRef, HandleOracle};
use crate::preset::Preset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    Applied,
    Skipped,
    /// The applier rejected the bone configuration. The record it was built
    /// from can no longer be trusted.
    InvalidBone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplierKind {
    Bone,
    Part,
    Material,
}

impl fmt::Display for ApplierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplierKind::Bone => "bone",
            ApplierKind::Part => "part",
            ApplierKind::Material => "material",
        })
    }
}

/// One of the per-entity collaborators that push a preset onto the live graph.
pub trait AttachmentApplier: Send {
    /// `None` clears whatever this applier last pushed for `piece`.
    fn apply_preset(&mut self, preset: Option<&Preset>, piece: ArmourPiece) -> ApplyStatus;

    fn is_initialized(&self) -> bool;
}

/// Per-piece attachment points discovered in the live graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPoints {
    pub base: ExternalRef,
    pub helm: Option<ExternalRef>,
    pub body: Option<ExternalRef>,
    pub arms: Option<ExternalRef>,
    pub coil: Option<ExternalRef>,
    pub legs: Option<ExternalRef>,
}

impl AttachmentPoints {
    pub fn new(base: ExternalRef) -> Self {
        Self {
            base,
            helm: None,
            body: None,
            arms: None,
            coil: None,
            legs: None,
        }
    }

    pub fn part(&self, part: ArmorPart) -> Option<ExternalRef> {
        match part {
            ArmorPart::Helm => self.helm,
            ArmorPart::Body => self.body,
            ArmorPart::Arms => self.arms,
            ArmorPart::Coil => self.coil,
            ArmorPart::Legs => self.legs,
            ArmorPart::Slinger => None,
        }
    }

    pub fn set_part(&mut self, part: ArmorPart, point: Option<ExternalRef>) {
        match part {
            ArmorPart::Helm => self.helm = point,
            ArmorPart::Body => self.body = point,
            ArmorPart::Arms => self.arms = point,
            ArmorPart::Coil => self.coil = point,
            ArmorPart::Legs => self.legs = point,
            ArmorPart::Slinger => {}
        }
    }

    /// Every captured point still denotes a live transform.
    pub fn are_live(&self, oracle: &(impl HandleOracle + ?Sized)) -> bool {
        self.base.is_live(oracle)
            && all_live(
                oracle,
                [&self.helm, &self.body, &self.arms, &self.coil, &self.legs],
            )
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_refs([
            Some(&self.base),
            self.helm.as_ref(),
            self.body.as_ref(),
            self.arms.as_ref(),
            self.coil.as_ref(),
            self.legs.as_ref(),
        ])
    }
}

/// Everything an applier is constructed from.
#[derive(Debug, Clone, Copy)]
pub struct ApplierRequest<'a> {
    pub kind: ApplierKind,
    pub points: &'a AttachmentPoints,
    pub armour: &'a ArmourAssignment,
    pub female: bool,
}

/// Builds appliers for a freshly resolved entity. Construction may fail
/// silently; the tracker checks [`AttachmentApplier::is_initialized`].
pub trait ApplierFactory: Send + Sync {
    fn build(&self, request: &ApplierRequest<'_>) -> Box<dyn AttachmentApplier>;
}
