use std::fmt;

use serde::{Deserialize, Serialize};

mod discovery;
mod host;
mod props;

pub use discovery::{ArmourSource, PlayerBasic, PlayerDiscovery};
pub use host::{
    CharacterStatus, CreatorState, GameplayPlayer, PlayerHost, PlayerLookup, SavePartRecord,
    SessionQuery, StageHunter,
};
pub use props::{weapon_visibility, PropVisibility, SHARPENING_ITEM_IDS};

/// Stable player identity presets are keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub name: String,
    pub hunter_id: String,
    pub female: bool,
}

impl PlayerIdentity {
    pub fn new(name: impl Into<String>, hunter_id: impl Into<String>, female: bool) -> Self {
        Self {
            name: name.into(),
            hunter_id: hunter_id.into(),
            female,
        }
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.hunter_id)
    }
}
