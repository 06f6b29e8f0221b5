use crate::armour::{ArmorPart, ArmorSetId};
use crate::graph::LiveGraph;
use crate::handle::Handle;
use crate::situation::Situation;

use super::PlayerIdentity;

/// Which player list a gameplay lookup reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionQuery {
    Offline,
    Online,
}

/// A player found in the gameplay list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameplayPlayer {
    pub identity: PlayerIdentity,
    pub character: Handle,
    pub transform: Handle,
    pub motion: Option<Handle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerLookup {
    Empty,
    /// The slot is occupied but the character object is not spawned yet.
    Pending,
    Found(GameplayPlayer),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacterStatus {
    pub set_up: bool,
    pub weapon_drawn: bool,
    pub in_combat: bool,
    pub in_tent: bool,
    pub riding: bool,
    pub used_item_id: Option<u32>,
}

/// The single hunter model shown by a menu scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageHunter {
    pub identity: PlayerIdentity,
    pub transform: Handle,
    /// Object that owns the per-piece armour objects.
    pub part_owner: Handle,
    pub save_index: Option<usize>,
}

/// One armour entry of a save record, as series numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SavePartRecord {
    pub equipped_series: u32,
    pub outer_series: u32,
    pub outer_shown: bool,
    pub inner_series: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreatorState {
    pub save_index: usize,
    pub armour_visible: bool,
}

/// Host bridge for player discovery. Menu queries default to "not available"
/// for hosts without those scenes.
pub trait PlayerHost: LiveGraph {
    fn player_slot_count(&self) -> Option<usize>;

    fn find_player(&self, index: usize, session: SessionQuery) -> PlayerLookup;

    fn character_status(&self, character: Handle) -> Option<CharacterStatus>;

    /// Arena or dressing-room mode, where slot 0 wears preview armour.
    fn preview_mode(&self) -> bool;

    /// Preview armour ids in [`ArmorPart::OUTFIT`] order.
    fn preview_armour_ids(&self) -> Option<[ArmorSetId; 5]>;

    fn equipped_armour_id(&self, character: Handle, part: ArmorPart) -> Option<ArmorSetId>;

    /// Transform carrying the mesh of one equipped piece.
    fn armour_part_object(&self, owner: Handle, part: ArmorPart) -> Option<Handle>;

    fn kinsect_objects(&self, character: Handle) -> [Option<Handle>; 2];

    fn stage_hunter(&self, _situation: Situation) -> Option<StageHunter> {
        None
    }

    /// Save armour in [`ArmorPart::OUTFIT`] order.
    fn save_armour(&self, _save_index: usize) -> Option<[Option<SavePartRecord>; 5]> {
        None
    }

    fn creator_state(&self) -> Option<CreatorState> {
        None
    }

    fn guild_card_phase(&self) -> Option<u32> {
        None
    }

    /// Hunter-profile armour in [`ArmorPart::ALL`] order.
    fn profile_armour_ids(&self) -> Option<[ArmorSetId; 6]> {
        None
    }
}
