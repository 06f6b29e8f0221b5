use crate::graph::LiveGraph;
use crate::handle::Handle;

/// Raw NPC entry. Missing handles mean the NPC is still loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcRecord {
    pub game_object: Option<Handle>,
    pub transform: Option<Handle>,
    pub motion: Option<Handle>,
    pub character: Option<Handle>,
    pub female: bool,
    /// Empty for hunter-type NPCs that wear regular armour pieces.
    pub prefab_path: String,
    pub species: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NpcLookup {
    /// No manage info behind this index.
    Empty,
    Found(NpcRecord),
}

/// A partner NPC posed in the main menu scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuPartner {
    pub transform: Handle,
    pub mesh_boundary: Handle,
    pub occludee: Handle,
    pub female: bool,
    pub prefab_path: String,
}

pub trait NpcHost: LiveGraph {
    /// Walks the host NPC list, yielding each entry's stable index.
    fn npc_list(&self) -> Option<Box<dyn Iterator<Item = usize> + '_>>;

    fn lookup_npc(&self, index: usize) -> NpcLookup;

    fn main_menu_partner(&self, _index: usize) -> Option<MenuPartner> {
        None
    }

    /// Mesh boundary reports visible and the occludee is not occluded.
    fn partner_visible(&self, _mesh_boundary: Handle, _occludee: Handle) -> bool {
        false
    }
}
