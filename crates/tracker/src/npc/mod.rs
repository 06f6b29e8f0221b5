use std::fmt;

use serde::{Deserialize, Serialize};

mod discovery;
mod host;

pub use discovery::{NpcBasic, NpcDiscovery, NpcKind, MAX_NPCS, MENU_PARTNER_SLOTS};
pub use host::{MenuPartner, NpcHost, NpcLookup, NpcRecord};

/// Catalog identity of an NPC, as presets are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NpcId(pub u32);

impl fmt::Display for NpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NPC_{:03}", self.0)
    }
}
