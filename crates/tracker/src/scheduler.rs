use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;

use crate::applier::ApplyStatus;
use crate::armour::ArmourPiece;
use crate::discovery::PropHides;
use crate::pipeline::PersistentInfo;
use crate::preset::{Preset, PresetId, PresetSource};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) index: usize,
    pub(crate) distance_sq: f64,
}

fn by_distance(a: &Candidate, b: &Candidate) -> Ordering {
    a.distance_sq
        .total_cmp(&b.distance_sq)
        .then(a.index.cmp(&b.index))
}

/// Keeps the `cap` closest candidates, closest first. Ties go to the lower
/// slot index. Only the cut is a selection; the survivors are then sorted.
pub(crate) fn select_closest(candidates: &mut Vec<Candidate>, cap: Option<usize>) {
    if let Some(cap) = cap.filter(|cap| *cap > 0) {
        if candidates.len() > cap {
            candidates.select_nth_unstable_by(cap - 1, by_distance);
            candidates.truncate(cap);
        }
    }
    candidates.sort_unstable_by(by_distance);
}

/// How one entity's apply pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntityOutcome {
    Applied { pieces: usize, hides: PropHides },
    /// The bone applier rejected this piece; later pieces were not visited.
    InvalidBone(ArmourPiece),
}

/// Pushes the active presets for every customisable piece onto one entity.
///
/// The previewed preset replaces normal lookup for pieces whose armour it
/// matches (or for everything when it targets the default set). Set-wide part
/// and material overrides go first, but only outside preview.
pub(crate) fn apply_entity(
    info: &mut PersistentInfo,
    presets: &dyn PresetSource,
    preview: Option<&Arc<Preset>>,
) -> EntityOutcome {
    let mut hides = PropHides::default();
    let mut applied_sets: HashSet<PresetId> = HashSet::new();
    let mut pieces = 0;

    for piece in ArmourPiece::CUSTOMISABLE {
        let Some(armour) = info.armour.piece(piece).cloned() else {
            continue;
        };

        let preview = preview.filter(|preset| preset.armour.is_default() || preset.armour == armour);
        let using_preview = preview.is_some();
        let preset = match preview {
            Some(preset) => Some(Arc::clone(preset)),
            None => presets.active_preset(&info.owner, &armour, piece),
        };
        let Some(preset) = preset else {
            continue;
        };

        let (set_parts, set_materials) = if using_preview {
            (None, None)
        } else {
            (
                presets.active_preset(&info.owner, &armour, ArmourPiece::SetParts),
                presets.active_preset(&info.owner, &armour, ArmourPiece::SetMaterials),
            )
        };

        if info.bones.apply_preset(Some(&*preset), piece) == ApplyStatus::InvalidBone {
            return EntityOutcome::InvalidBone(piece);
        }

        if let Some(set_parts) = set_parts.as_deref() {
            info.parts.apply_preset(Some(set_parts), piece);
            hides.weapon |= set_parts.hide_weapon;
            hides.slinger |= set_parts.hide_slinger;
        }
        info.parts.apply_preset(Some(&*preset), piece);

        if let Some(set_materials) = set_materials.as_deref() {
            info.materials.apply_preset(Some(set_materials), piece);
        }
        info.materials.apply_preset(Some(&*preset), piece);

        if preset.set_modifiers
            && applied_sets.insert(preset.id.clone())
            && info.bones.apply_preset(Some(&*preset), ArmourPiece::Set)
                == ApplyStatus::InvalidBone
        {
            return EntityOutcome::InvalidBone(ArmourPiece::Set);
        }

        hides.weapon |= preset.hide_weapon;
        hides.slinger |= preset.hide_slinger;
        pieces += 1;
        trace!(%piece, preset = %preset.id, preview = using_preview, "piece_applied");
    }

    EntityOutcome::Applied { pieces, hides }
}
