use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::applier::{
    ApplierFactory, ApplierKind, ApplierRequest, ApplyStatus, AttachmentApplier,
};
use crate::armour::ArmourPiece;
use crate::handle::Handle;
use crate::preset::{Preset, PresetId};

/// One accepted `apply_preset` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRecord {
    pub base: Handle,
    pub kind: ApplierKind,
    pub piece: ArmourPiece,
    pub preset: Option<PresetId>,
}

#[derive(Debug, Default)]
struct Journal {
    records: Vec<ApplyRecord>,
    rejected_bones: HashSet<(Handle, ArmourPiece)>,
    failing_builds: HashMap<ApplierKind, u32>,
    builds: usize,
}

/// Applier factory that records every call instead of touching a scene.
#[derive(Debug, Default)]
pub struct RecordingAppliers {
    journal: Arc<Mutex<Journal>>,
}

impl RecordingAppliers {
    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn records(&self) -> Vec<ApplyRecord> {
        self.journal().records.clone()
    }

    pub fn take_records(&self) -> Vec<ApplyRecord> {
        std::mem::take(&mut self.journal().records)
    }

    /// Number of appliers built so far, initialized or not.
    pub fn builds(&self) -> usize {
        self.journal().builds
    }

    /// The next `times` appliers of `kind` come back uninitialized.
    pub fn fail_build(&self, kind: ApplierKind, times: u32) {
        self.journal().failing_builds.insert(kind, times);
    }

    /// Bone appliers built on `base` reject `piece` until further notice.
    pub fn reject_bone(&self, base: Handle, piece: ArmourPiece) {
        self.journal().rejected_bones.insert((base, piece));
    }

    pub fn accept_bone(&self, base: Handle, piece: ArmourPiece) {
        self.journal().rejected_bones.remove(&(base, piece));
    }
}

impl ApplierFactory for RecordingAppliers {
    fn build(&self, request: &ApplierRequest<'_>) -> Box<dyn AttachmentApplier> {
        let mut journal = self.journal();
        journal.builds += 1;
        let initialized = match journal.failing_builds.get_mut(&request.kind) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        };

        Box::new(RecordingApplier {
            journal: Arc::clone(&self.journal),
            base: request.points.base.handle,
            kind: request.kind,
            initialized,
        })
    }
}

struct RecordingApplier {
    journal: Arc<Mutex<Journal>>,
    base: Handle,
    kind: ApplierKind,
    initialized: bool,
}

impl AttachmentApplier for RecordingApplier {
    fn apply_preset(&mut self, preset: Option<&Preset>, piece: ArmourPiece) -> ApplyStatus {
        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        if self.kind == ApplierKind::Bone && journal.rejected_bones.contains(&(self.base, piece)) {
            return ApplyStatus::InvalidBone;
        }

        journal.records.push(ApplyRecord {
            base: self.base,
            kind: self.kind,
            piece,
            preset: preset.map(|preset| preset.id.clone()),
        });
        if preset.is_some() {
            ApplyStatus::Applied
        } else {
            ApplyStatus::Skipped
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::AttachmentPoints;
    use crate::armour::{ArmourAssignment, ArmourSet};
    use crate::handle::ExternalRef;

    fn build(appliers: &RecordingAppliers, kind: ApplierKind, base: Handle) -> Box<dyn AttachmentApplier> {
        let points = AttachmentPoints::new(ExternalRef::transform(base));
        appliers.build(&ApplierRequest {
            kind,
            points: &points,
            armour: &ArmourAssignment::default(),
            female: false,
        })
    }

    #[test]
    fn rejected_bone_is_not_recorded() {
        let appliers = RecordingAppliers::default();
        let base = Handle::new(7).expect("handle");
        appliers.reject_bone(base, ArmourPiece::Helm);
        let preset = Preset::new("p", ArmourSet::default_set());

        let mut bones = build(&appliers, ApplierKind::Bone, base);
        assert_eq!(bones.apply_preset(Some(&preset), ArmourPiece::Helm), ApplyStatus::InvalidBone);
        assert_eq!(bones.apply_preset(Some(&preset), ArmourPiece::Arms), ApplyStatus::Applied);

        let mut parts = build(&appliers, ApplierKind::Part, base);
        assert_eq!(parts.apply_preset(Some(&preset), ArmourPiece::Helm), ApplyStatus::Applied);

        let pieces: Vec<_> = appliers.take_records().into_iter().map(|record| record.piece).collect();
        assert_eq!(pieces, vec![ArmourPiece::Arms, ArmourPiece::Helm]);
        assert!(appliers.records().is_empty());
    }

    #[test]
    fn failed_builds_run_out() {
        let appliers = RecordingAppliers::default();
        let base = Handle::new(1).expect("handle");
        appliers.fail_build(ApplierKind::Material, 1);

        assert!(build(&appliers, ApplierKind::Bone, base).is_initialized());
        assert!(!build(&appliers, ApplierKind::Material, base).is_initialized());
        assert!(build(&appliers, ApplierKind::Material, base).is_initialized());
        assert_eq!(appliers.builds(), 3);
    }
}
