use std::sync::{Arc, PoisonError, RwLock};

use crate::armour::{ArmourPiece, ArmourSet};
use crate::preset::{Preset, PresetOwner, PresetSource};

/// One entry of a [`PresetTable`]. Matches any armour when the preset is
/// authored for the default set.
#[derive(Debug, Clone)]
pub struct PresetRule {
    owner: Option<PresetOwner>,
    piece: Option<ArmourPiece>,
    preset: Arc<Preset>,
}

impl PresetRule {
    /// Every owner, every customisable piece.
    pub fn any(preset: Preset) -> Self {
        Self {
            owner: None,
            piece: None,
            preset: Arc::new(preset),
        }
    }

    pub fn for_owner(mut self, owner: PresetOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Restricts the rule to one piece. Needed for the set-wide pieces, which
    /// an unrestricted rule never matches.
    pub fn for_piece(mut self, piece: ArmourPiece) -> Self {
        self.piece = Some(piece);
        self
    }

    fn matches(&self, owner: &PresetOwner, armour: &ArmourSet, piece: ArmourPiece) -> bool {
        let piece_matches = match self.piece {
            Some(wanted) => wanted == piece,
            None => ArmourPiece::CUSTOMISABLE.contains(&piece),
        };
        piece_matches
            && self.owner.as_ref().map_or(true, |wanted| wanted == owner)
            && (self.preset.armour.is_default() || self.preset.armour == *armour)
    }
}

/// In-memory preset store. Later rules take precedence.
#[derive(Debug, Default)]
pub struct PresetTable {
    rules: RwLock<Vec<PresetRule>>,
    preview: RwLock<Option<Arc<Preset>>>,
}

impl PresetTable {
    pub fn with_rule(self, rule: PresetRule) -> Self {
        self.add_rule(rule);
        self
    }

    pub fn add_rule(&self, rule: PresetRule) {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rule);
    }

    pub fn clear(&self) {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn set_preview(&self, preset: Option<Preset>) {
        *self.preview.write().unwrap_or_else(PoisonError::into_inner) = preset.map(Arc::new);
    }
}

impl PresetSource for PresetTable {
    fn active_preset(
        &self,
        owner: &PresetOwner,
        armour: &ArmourSet,
        piece: ArmourPiece,
    ) -> Option<Arc<Preset>> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|rule| rule.matches(owner, armour, piece))
            .map(|rule| Arc::clone(&rule.preset))
    }

    fn previewed_preset(&self) -> Option<Arc<Preset>> {
        self.preview
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npc::NpcId;

    fn npc(id: u32) -> PresetOwner {
        PresetOwner::Npc {
            npc: NpcId(id),
            female: false,
        }
    }

    #[test]
    fn default_preset_matches_customisable_pieces_only() {
        let table = PresetTable::default()
            .with_rule(PresetRule::any(Preset::new("all", ArmourSet::default_set())));
        let rathalos = ArmourSet::new("Rathalos", false);

        assert!(table.active_preset(&npc(1), &rathalos, ArmourPiece::Helm).is_some());
        assert!(table.active_preset(&npc(1), &rathalos, ArmourPiece::SetParts).is_none());
        assert!(table.active_preset(&npc(1), &rathalos, ArmourPiece::Set).is_none());
    }

    #[test]
    fn armour_specific_preset_needs_matching_set() {
        let rathalos = ArmourSet::new("Rathalos", false);
        let table = PresetTable::default().with_rule(PresetRule::any(Preset::new(
            "rath",
            rathalos.clone(),
        )));

        assert!(table.active_preset(&npc(1), &rathalos, ArmourPiece::Body).is_some());
        assert!(table
            .active_preset(&npc(1), &ArmourSet::new("Rathalos", true), ArmourPiece::Body)
            .is_none());
    }

    #[test]
    fn later_rules_win_and_owner_filters() {
        let any = ArmourSet::default_set();
        let table = PresetTable::default()
            .with_rule(PresetRule::any(Preset::new("base", any.clone())))
            .with_rule(PresetRule::any(Preset::new("mine", any.clone())).for_owner(npc(2)));

        let pick = |owner: PresetOwner| {
            table
                .active_preset(&owner, &any, ArmourPiece::Arms)
                .map(|preset| preset.id.0.clone())
        };
        assert_eq!(pick(npc(2)).as_deref(), Some("mine"));
        assert_eq!(pick(npc(3)).as_deref(), Some("base"));
    }

    #[test]
    fn preview_is_replaced_whole() {
        let table = PresetTable::default();
        assert!(table.previewed_preset().is_none());

        table.set_preview(Some(Preset::new("editing", ArmourSet::default_set())));
        assert_eq!(
            table.previewed_preset().map(|preset| preset.id.0.clone()).as_deref(),
            Some("editing")
        );
        table.set_preview(None);
        assert!(table.previewed_preset().is_none());
    }
}
