use std::collections::{BTreeMap, HashMap};

use crate::armour::{ArmorPart, ArmorSetId, ArmourCatalog, ArmourPiece, ArmourSet};
use crate::npc::NpcId;

#[derive(Debug, Clone)]
struct NpcPrefab {
    armour: String,
    primary_transform: String,
}

/// Armour and NPC tables for the simulated host.
///
/// Every registered set exists in both genders: `sub_id` 0 is the male
/// variant and 1 the female one. Save series numbers equal set ids.
#[derive(Debug, Clone, Default)]
pub struct SimCatalog {
    sets: BTreeMap<ArmorSetId, ArmourSet>,
    prefabs: HashMap<String, NpcPrefab>,
}

impl SimCatalog {
    pub fn set_id(id: u32, female: bool) -> ArmorSetId {
        ArmorSetId::new(id, u32::from(female))
    }

    pub fn with_set(mut self, id: u32, name: &str) -> Self {
        for female in [false, true] {
            self.sets
                .insert(Self::set_id(id, female), ArmourSet::new(name, female));
        }
        self
    }

    pub fn with_npc_prefab(mut self, path: &str, armour: &str, primary_transform: &str) -> Self {
        self.prefabs.insert(
            path.to_owned(),
            NpcPrefab {
                armour: armour.to_owned(),
                primary_transform: primary_transform.to_owned(),
            },
        );
        self
    }
}

fn part_for_label(label: &str) -> Option<ArmorPart> {
    ArmorPart::OUTFIT
        .into_iter()
        .find(|part| part.piece().label() == label)
}

impl ArmourCatalog for SimCatalog {
    fn armour_from_id(&self, id: ArmorSetId) -> Option<ArmourSet> {
        self.sets.get(&id).cloned()
    }

    fn set_id_for_armour(&self, armour: &ArmourSet) -> Option<ArmorSetId> {
        self.sets
            .iter()
            .find(|(_, set)| *set == armour)
            .map(|(id, _)| *id)
    }

    fn set_id_from_series(&self, series: u32, female: bool) -> Option<ArmorSetId> {
        let id = Self::set_id(series, female);
        self.sets.contains_key(&id).then_some(id)
    }

    fn prefab_name(&self, id: ArmorSetId, piece: ArmourPiece, female: bool) -> String {
        let gender = if female { 'f' } else { 'm' };
        format!("{gender}_{:03}_{}_{}", id.id, id.sub_id, piece.label())
    }

    fn part_from_prefab_name(&self, name: &str, female: bool) -> Option<(ArmorPart, ArmourSet)> {
        let mut fields = name.splitn(4, '_');
        let gender = fields.next()?;
        let id: u32 = fields.next()?.parse().ok()?;
        let sub_id: u32 = fields.next()?.parse().ok()?;
        let part = part_for_label(fields.next()?)?;
        if gender != if female { "f" } else { "m" } {
            return None;
        }
        let armour = self.armour_from_id(ArmorSetId::new(id, sub_id))?;
        Some((part, armour))
    }

    fn armour_from_npc_prefab(&self, prefab_path: &str, female: bool) -> Option<ArmourSet> {
        self.prefabs
            .get(prefab_path)
            .map(|prefab| ArmourSet::new(prefab.armour.as_str(), female))
    }

    fn npc_primary_transform_name(&self, prefab_path: &str) -> Option<String> {
        self.prefabs
            .get(prefab_path)
            .map(|prefab| prefab.primary_transform.clone())
    }

    fn npc_identity(&self, index: usize) -> NpcId {
        NpcId(u32::try_from(index).unwrap_or(u32::MAX))
    }
}
