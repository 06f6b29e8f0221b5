use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::armour::{ArmourPiece, ArmourSet};
use crate::npc::NpcId;
use crate::player::PlayerIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetId(pub String);

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The slice of a stored preset the tracker needs to schedule it. Everything
/// else about the preset is the appliers' business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: PresetId,
    #[serde(default)]
    pub name: String,
    pub armour: ArmourSet,
    #[serde(default)]
    pub hide_weapon: bool,
    #[serde(default)]
    pub hide_slinger: bool,
    /// Carries whole-body modifiers that must be applied to [`ArmourPiece::Set`].
    #[serde(default)]
    pub set_modifiers: bool,
}

impl Preset {
    pub fn new(id: impl Into<String>, armour: ArmourSet) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id: PresetId(id),
            armour,
            hide_weapon: false,
            hide_slinger: false,
            set_modifiers: false,
        }
    }
}

/// Who a preset lookup is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetOwner {
    Player(PlayerIdentity),
    Npc { npc: NpcId, female: bool },
}

impl fmt::Display for PresetOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetOwner::Player(identity) => write!(f, "player {identity}"),
            PresetOwner::Npc { npc, female } => {
                write!(f, "npc {npc} ({})", if *female { "F" } else { "M" })
            }
        }
    }
}

/// Read side of the preset store.
pub trait PresetSource: Send + Sync {
    fn active_preset(
        &self,
        owner: &PresetOwner,
        armour: &ArmourSet,
        piece: ArmourPiece,
    ) -> Option<Arc<Preset>>;

    /// Preset currently open in an editor, applied in place of normal lookups.
    fn previewed_preset(&self) -> Option<Arc<Preset>>;
}
