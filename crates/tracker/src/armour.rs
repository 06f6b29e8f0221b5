use std::fmt;

use serde::{Deserialize, Serialize};

use crate::npc::NpcId;

pub const DEFAULT_ARMOUR_NAME: &str = "Default";

/// Numeric armour identity as stored by the host (`app.ArmorDef` series ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArmorSetId {
    pub id: u32,
    pub sub_id: u32,
}

impl ArmorSetId {
    pub const fn new(id: u32, sub_id: u32) -> Self {
        Self { id, sub_id }
    }
}

/// Human-meaningful armour identity that presets are keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArmourSet {
    pub name: String,
    pub female: bool,
}

impl ArmourSet {
    pub fn new(name: impl Into<String>, female: bool) -> Self {
        Self {
            name: name.into(),
            female,
        }
    }

    /// The "no specific armour" identity. A preset on this set applies to anything.
    pub fn default_set() -> Self {
        Self::new(DEFAULT_ARMOUR_NAME, false)
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ARMOUR_NAME && !self.female
    }
}

impl Default for ArmourSet {
    fn default() -> Self {
        Self::default_set()
    }
}

impl fmt::Display for ArmourSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gender = if self.female { "F" } else { "M" };
        write!(f, "{} ({gender})", self.name)
    }
}

/// Piece addressed by presets and attachment appliers.
///
/// `Set` is the synthetic whole-body piece; `SetParts` and `SetMaterials`
/// address set-wide override presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmourPiece {
    Set,
    Arms,
    Body,
    Helm,
    Legs,
    Coil,
    Slinger,
    SetParts,
    SetMaterials,
}

impl ArmourPiece {
    /// Pieces visited by the apply pass, in apply order.
    pub const CUSTOMISABLE: [ArmourPiece; 5] = [
        ArmourPiece::Arms,
        ArmourPiece::Body,
        ArmourPiece::Helm,
        ArmourPiece::Legs,
        ArmourPiece::Coil,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ArmourPiece::Set => "set",
            ArmourPiece::Arms => "arms",
            ArmourPiece::Body => "body",
            ArmourPiece::Helm => "helm",
            ArmourPiece::Legs => "legs",
            ArmourPiece::Coil => "coil",
            ArmourPiece::Slinger => "slinger",
            ArmourPiece::SetParts => "set_parts",
            ArmourPiece::SetMaterials => "set_materials",
        }
    }
}

impl fmt::Display for ArmourPiece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Host equip slot (`app.ArmorDef.ARMOR_PARTS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmorPart {
    Helm,
    Body,
    Arms,
    Coil,
    Legs,
    Slinger,
}

impl ArmorPart {
    pub const ALL: [ArmorPart; 6] = [
        ArmorPart::Helm,
        ArmorPart::Body,
        ArmorPart::Arms,
        ArmorPart::Coil,
        ArmorPart::Legs,
        ArmorPart::Slinger,
    ];

    /// Equip slots that carry an attachment point (everything but the slinger).
    pub const OUTFIT: [ArmorPart; 5] = [
        ArmorPart::Helm,
        ArmorPart::Body,
        ArmorPart::Arms,
        ArmorPart::Coil,
        ArmorPart::Legs,
    ];

    pub fn piece(self) -> ArmourPiece {
        match self {
            ArmorPart::Helm => ArmourPiece::Helm,
            ArmorPart::Body => ArmourPiece::Body,
            ArmorPart::Arms => ArmourPiece::Arms,
            ArmorPart::Coil => ArmourPiece::Coil,
            ArmorPart::Legs => ArmourPiece::Legs,
            ArmorPart::Slinger => ArmourPiece::Slinger,
        }
    }
}

/// Resolved armour identity per body region. `None` means the region could not
/// be identified; `Some(default)` means it is known to carry no specific set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArmourAssignment {
    pub helm: Option<ArmourSet>,
    pub body: Option<ArmourSet>,
    pub arms: Option<ArmourSet>,
    pub coil: Option<ArmourSet>,
    pub legs: Option<ArmourSet>,
    pub slinger: Option<ArmourSet>,
}

impl ArmourAssignment {
    pub fn part(&self, part: ArmorPart) -> Option<&ArmourSet> {
        match part {
            ArmorPart::Helm => self.helm.as_ref(),
            ArmorPart::Body => self.body.as_ref(),
            ArmorPart::Arms => self.arms.as_ref(),
            ArmorPart::Coil => self.coil.as_ref(),
            ArmorPart::Legs => self.legs.as_ref(),
            ArmorPart::Slinger => self.slinger.as_ref(),
        }
    }

    pub fn set_part(&mut self, part: ArmorPart, armour: Option<ArmourSet>) {
        let slot = match part {
            ArmorPart::Helm => &mut self.helm,
            ArmorPart::Body => &mut self.body,
            ArmorPart::Arms => &mut self.arms,
            ArmorPart::Coil => &mut self.coil,
            ArmorPart::Legs => &mut self.legs,
            ArmorPart::Slinger => &mut self.slinger,
        };
        *slot = armour;
    }

    /// Armour for an apply piece. Pseudo pieces have no armour of their own.
    pub fn piece(&self, piece: ArmourPiece) -> Option<&ArmourSet> {
        match piece {
            ArmourPiece::Arms => self.arms.as_ref(),
            ArmourPiece::Body => self.body.as_ref(),
            ArmourPiece::Helm => self.helm.as_ref(),
            ArmourPiece::Legs => self.legs.as_ref(),
            ArmourPiece::Coil => self.coil.as_ref(),
            ArmourPiece::Slinger => self.slinger.as_ref(),
            ArmourPiece::Set | ArmourPiece::SetParts | ArmourPiece::SetMaterials => None,
        }
    }

    pub(crate) fn from_ids(
        catalog: &(impl ArmourCatalog + ?Sized),
        ids: impl IntoIterator<Item = (ArmorPart, ArmorSetId)>,
    ) -> Self {
        let mut assignment = Self::default();
        for (part, id) in ids {
            assignment.set_part(part, Some(catalog.armour_or_default(id)));
        }
        assignment
    }
}

/// Static lookup tables mapping host identifiers to armour and NPC identities.
///
/// Built once at startup by the owner; every method is a pure lookup.
pub trait ArmourCatalog: Send + Sync {
    fn armour_from_id(&self, id: ArmorSetId) -> Option<ArmourSet>;

    fn set_id_for_armour(&self, armour: &ArmourSet) -> Option<ArmorSetId>;

    /// Maps a save-record series number to an armour id.
    fn set_id_from_series(&self, series: u32, female: bool) -> Option<ArmorSetId>;

    /// Name of the transform a piece of this set is spawned under.
    fn prefab_name(&self, id: ArmorSetId, piece: ArmourPiece, female: bool) -> String;

    /// Reverse of [`ArmourCatalog::prefab_name`] for scanning worn pieces.
    fn part_from_prefab_name(&self, name: &str, female: bool) -> Option<(ArmorPart, ArmourSet)>;

    fn armour_from_npc_prefab(&self, prefab_path: &str, female: bool) -> Option<ArmourSet>;

    /// Transform name of the primary (body) attachment for a prefab NPC.
    fn npc_primary_transform_name(&self, prefab_path: &str) -> Option<String>;

    fn npc_identity(&self, index: usize) -> NpcId;

    fn armour_or_default(&self, id: ArmorSetId) -> ArmourSet {
        self.armour_from_id(id).unwrap_or_default()
    }
}
