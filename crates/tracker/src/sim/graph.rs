use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::armour::{ArmorPart, ArmorSetId};
use crate::graph::{LiveGraph, TransformTree};
use crate::handle::{Handle, HandleOracle, TypeTag};
use crate::npc::{MenuPartner, NpcHost, NpcLookup, NpcRecord};
use crate::player::{
    CharacterStatus, CreatorState, GameplayPlayer, PlayerHost, PlayerIdentity, PlayerLookup,
    SavePartRecord, SessionQuery, StageHunter,
};
use crate::situation::Situation;

/// Handles of a spawned gameplay player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPlayer {
    pub character: Handle,
    pub transform: Handle,
    pub motion: Handle,
    /// Game object under the nested `Wp_Parent` transform.
    pub weapon: Handle,
    pub kinsect: Handle,
    pub slinger: Handle,
}

/// Handles of a menu stage model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimStage {
    pub transform: Handle,
    pub part_owner: Handle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcSpawn {
    pub female: bool,
    /// Empty for hunter-type NPCs.
    pub prefab_path: String,
    pub species: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimNpc {
    pub transform: Handle,
    pub game_object: Handle,
    pub motion: Handle,
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<Handle>,
    children: Vec<Handle>,
    game_object: Handle,
    distance_sq: Option<f64>,
}

#[derive(Debug, Default)]
struct Scene {
    allocated: u64,
    live: HashMap<Handle, TypeTag>,
    nodes: HashMap<Handle, Node>,
    owners: HashMap<Handle, Handle>,
    drawn: HashMap<Handle, bool>,
    skipped_motions: HashSet<Handle>,
    lists_hidden: bool,
    online: bool,

    player_slots: usize,
    players: BTreeMap<usize, Option<GameplayPlayer>>,
    statuses: HashMap<Handle, CharacterStatus>,
    equipped: HashMap<(Handle, ArmorPart), ArmorSetId>,
    part_objects: HashMap<(Handle, ArmorPart), Handle>,
    kinsects: HashMap<Handle, [Option<Handle>; 2]>,
    preview_mode: bool,
    preview_ids: Option<[ArmorSetId; 5]>,
    stage: HashMap<Situation, StageHunter>,
    saves: HashMap<usize, [Option<SavePartRecord>; 5]>,
    creator: Option<CreatorState>,
    guild_card_phase: Option<u32>,
    profile_ids: Option<[ArmorSetId; 6]>,

    npcs: BTreeMap<usize, NpcRecord>,
    partners: BTreeMap<usize, MenuPartner>,
    visible_partners: HashSet<Handle>,
}

impl Scene {
    fn alloc(&mut self, tag: TypeTag) -> Handle {
        let handle = Handle::from(NonZeroU64::MIN.saturating_add(self.allocated));
        self.allocated += 1;
        self.live.insert(handle, tag);
        handle
    }

    fn spawn_node(&mut self, parent: Option<Handle>, name: &str, distance_sq: Option<f64>) -> Handle {
        let transform = self.alloc(TypeTag::TRANSFORM);
        let game_object = self.alloc(TypeTag::GAME_OBJECT);
        self.nodes.insert(
            transform,
            Node {
                name: name.to_owned(),
                parent,
                children: Vec::new(),
                game_object,
                distance_sq,
            },
        );
        self.owners.insert(game_object, transform);
        self.drawn.insert(game_object, true);
        if let Some(node) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            node.children.push(transform);
        }
        transform
    }

    fn remove_node(&mut self, transform: Handle) {
        let Some(node) = self.nodes.remove(&transform) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            parent.children.retain(|child| *child != transform);
        }
        self.live.remove(&transform);
        self.live.remove(&node.game_object);
        self.owners.remove(&node.game_object);
        self.drawn.remove(&node.game_object);
        for child in node.children {
            self.remove_node(child);
        }
    }

    fn sibling_after(&self, transform: Handle) -> Option<Handle> {
        let parent = self.nodes.get(&transform)?.parent?;
        let siblings = &self.nodes.get(&parent)?.children;
        let position = siblings.iter().position(|child| *child == transform)?;
        siblings.get(position + 1).copied()
    }
}

/// Scriptable in-memory host graph.
///
/// Despawning removes handles from the live set, so stale captures fail
/// [`HandleOracle::is_live`] the way they would in a real host.
#[derive(Debug, Default)]
pub struct SimGraph {
    scene: Mutex<Scene>,
}

impl SimGraph {
    fn scene(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a transform (with its game object) under `parent`.
    pub fn attach(&self, parent: Handle, name: &str) -> Handle {
        self.scene().spawn_node(Some(parent), name, None)
    }

    /// Removes a transform subtree.
    pub fn detach(&self, transform: Handle) {
        self.scene().remove_node(transform);
    }

    pub fn set_distance_sq(&self, transform: Handle, distance_sq: f64) {
        if let Some(node) = self.scene().nodes.get_mut(&transform) {
            node.distance_sq = Some(distance_sq);
        }
    }

    pub fn set_motion_skipped(&self, motion: Handle, skipped: bool) {
        let mut scene = self.scene();
        if skipped {
            scene.skipped_motions.insert(motion);
        } else {
            scene.skipped_motions.remove(&motion);
        }
    }

    /// Last draw flag pushed to a game object.
    pub fn is_drawn(&self, game_object: Handle) -> Option<bool> {
        self.scene().drawn.get(&game_object).copied()
    }

    /// Makes both entity lists report unavailable.
    pub fn hide_lists(&self, hidden: bool) {
        self.scene().lists_hidden = hidden;
    }

    pub fn set_online(&self, online: bool) {
        self.scene().online = online;
    }

    pub fn set_player_slots(&self, slots: usize) {
        self.scene().player_slots = slots;
    }

    pub fn spawn_player(&self, index: usize, identity: PlayerIdentity, distance_sq: f64) -> SimPlayer {
        let mut scene = self.scene();
        let transform = scene.spawn_node(None, "hunter", Some(distance_sq));
        let character = scene.alloc(TypeTag::HUNTER_CHARACTER);
        let motion = scene.alloc(TypeTag::MOTION);

        for part in ArmorPart::ALL {
            let point = scene.spawn_node(Some(transform), part.piece().label(), None);
            scene.part_objects.insert((character, part), point);
        }
        let spine = scene.spawn_node(Some(transform), "spine", None);
        let weapon = scene.spawn_node(Some(spine), "Wp_Parent", None);
        let kinsect = scene.spawn_node(None, "kinsect", None);

        scene.statuses.insert(
            character,
            CharacterStatus {
                set_up: true,
                ..CharacterStatus::default()
            },
        );
        let kinsect_object = scene.nodes.get(&kinsect).map(|node| node.game_object);
        scene.kinsects.insert(character, [kinsect_object, None]);
        scene.players.insert(
            index,
            Some(GameplayPlayer {
                identity,
                character,
                transform,
                motion: Some(motion),
            }),
        );

        let game_object = |handle: Handle| {
            scene
                .nodes
                .get(&handle)
                .map_or(handle, |node| node.game_object)
        };
        let slinger = scene
            .part_objects
            .get(&(character, ArmorPart::Slinger))
            .map_or(transform, |point| game_object(*point));
        SimPlayer {
            character,
            transform,
            motion,
            weapon: game_object(weapon),
            kinsect: game_object(kinsect),
            slinger,
        }
    }

    /// Marks a player slot as occupied with nothing spawned yet.
    pub fn set_player_pending(&self, index: usize) {
        self.scene().players.insert(index, None);
    }

    pub fn despawn_player(&self, index: usize) {
        let mut scene = self.scene();
        let Some(Some(player)) = scene.players.remove(&index) else {
            return;
        };
        scene.remove_node(player.transform);
        if let Some(kinsects) = scene.kinsects.remove(&player.character) {
            for kinsect in kinsects.into_iter().flatten() {
                if let Some(transform) = scene.owners.get(&kinsect).copied() {
                    scene.remove_node(transform);
                }
            }
        }
        scene.live.remove(&player.character);
        if let Some(motion) = player.motion {
            scene.live.remove(&motion);
        }
    }

    pub fn set_character_status(&self, character: Handle, status: CharacterStatus) {
        self.scene().statuses.insert(character, status);
    }

    pub fn equip(&self, character: Handle, part: ArmorPart, id: ArmorSetId) {
        self.scene().equipped.insert((character, part), id);
    }

    /// Respawns the transform of one armour piece, as a model swap would.
    pub fn swap_part_object(&self, owner: Handle, part: ArmorPart) -> Option<Handle> {
        let mut scene = self.scene();
        let old = scene.part_objects.get(&(owner, part)).copied()?;
        let parent = scene.nodes.get(&old).and_then(|node| node.parent);
        scene.remove_node(old);
        let point = scene.spawn_node(parent, part.piece().label(), None);
        scene.part_objects.insert((owner, part), point);
        Some(point)
    }

    pub fn set_preview(&self, enabled: bool, ids: Option<[ArmorSetId; 5]>) {
        let mut scene = self.scene();
        scene.preview_mode = enabled;
        scene.preview_ids = ids;
    }

    /// Poses a hunter model for a menu scene.
    pub fn place_stage_hunter(
        &self,
        situation: Situation,
        identity: PlayerIdentity,
        save_index: Option<usize>,
    ) -> SimStage {
        let mut scene = self.scene();
        let transform = scene.spawn_node(None, "stage_hunter", Some(0.0));
        let part_owner = scene
            .nodes
            .get(&transform)
            .map_or(transform, |node| node.game_object);
        for part in ArmorPart::OUTFIT {
            let point = scene.spawn_node(Some(transform), part.piece().label(), None);
            scene.part_objects.insert((part_owner, part), point);
        }
        scene.stage.insert(
            situation,
            StageHunter {
                identity,
                transform,
                part_owner,
                save_index,
            },
        );
        SimStage {
            transform,
            part_owner,
        }
    }

    pub fn set_save_armour(&self, save_index: usize, records: [Option<SavePartRecord>; 5]) {
        self.scene().saves.insert(save_index, records);
    }

    pub fn set_creator_state(&self, state: Option<CreatorState>) {
        self.scene().creator = state;
    }

    pub fn set_guild_card_phase(&self, phase: Option<u32>) {
        self.scene().guild_card_phase = phase;
    }

    pub fn set_profile_armour(&self, ids: Option<[ArmorSetId; 6]>) {
        self.scene().profile_ids = ids;
    }

    pub fn spawn_npc(&self, index: usize, spawn: NpcSpawn, distance_sq: f64) -> SimNpc {
        let mut scene = self.scene();
        let transform = scene.spawn_node(None, "npc", Some(distance_sq));
        let game_object = scene
            .nodes
            .get(&transform)
            .map_or(transform, |node| node.game_object);
        let motion = scene.alloc(TypeTag::MOTION);
        scene.npcs.insert(
            index,
            NpcRecord {
                game_object: Some(game_object),
                transform: Some(transform),
                motion: Some(motion),
                character: Some(game_object),
                female: spawn.female,
                prefab_path: spawn.prefab_path,
                species: spawn.species,
            },
        );
        SimNpc {
            transform,
            game_object,
            motion,
        }
    }

    /// Edits the raw record, e.g. to simulate a half-loaded NPC.
    pub fn edit_npc(&self, index: usize, edit: impl FnOnce(&mut NpcRecord)) {
        if let Some(record) = self.scene().npcs.get_mut(&index) {
            edit(record);
        }
    }

    pub fn despawn_npc(&self, index: usize) {
        let mut scene = self.scene();
        let Some(record) = scene.npcs.remove(&index) else {
            return;
        };
        if let Some(transform) = record.transform {
            scene.remove_node(transform);
        }
        if let Some(motion) = record.motion {
            scene.live.remove(&motion);
        }
    }

    pub fn place_menu_partner(
        &self,
        index: usize,
        female: bool,
        prefab_path: &str,
        visible: bool,
    ) -> Handle {
        let mut scene = self.scene();
        let transform = scene.spawn_node(None, "partner", Some(0.0));
        let mesh_boundary = scene.alloc(TypeTag::MESH_BOUNDARY);
        let occludee = scene.alloc(TypeTag::VOLUME_OCCLUDEE);
        if visible {
            scene.visible_partners.insert(mesh_boundary);
        }
        scene.partners.insert(
            index,
            MenuPartner {
                transform,
                mesh_boundary,
                occludee,
                female,
                prefab_path: prefab_path.to_owned(),
            },
        );
        transform
    }

    pub fn set_partner_visible(&self, index: usize, visible: bool) {
        let mut scene = self.scene();
        let Some(mesh) = scene.partners.get(&index).map(|partner| partner.mesh_boundary) else {
            return;
        };
        if visible {
            scene.visible_partners.insert(mesh);
        } else {
            scene.visible_partners.remove(&mesh);
        }
    }
}

impl HandleOracle for SimGraph {
    fn is_live(&self, handle: Handle, tag: TypeTag) -> bool {
        self.scene().live.get(&handle) == Some(&tag)
    }
}

impl TransformTree for SimGraph {
    fn find_child_by_name(&self, parent: Handle, name: &str) -> Option<Handle> {
        let scene = self.scene();
        scene
            .nodes
            .get(&parent)?
            .children
            .iter()
            .copied()
            .find(|child| scene.nodes.get(child).is_some_and(|node| node.name == name))
    }

    fn node_name(&self, transform: Handle) -> Option<String> {
        self.scene().nodes.get(&transform).map(|node| node.name.clone())
    }

    fn first_child(&self, transform: Handle) -> Option<Handle> {
        self.scene().nodes.get(&transform)?.children.first().copied()
    }

    fn next_sibling(&self, transform: Handle) -> Option<Handle> {
        self.scene().sibling_after(transform)
    }
}

impl LiveGraph for SimGraph {
    fn game_object_of(&self, transform: Handle) -> Option<Handle> {
        self.scene().nodes.get(&transform).map(|node| node.game_object)
    }

    fn transform_of(&self, game_object: Handle) -> Option<Handle> {
        self.scene().owners.get(&game_object).copied()
    }

    fn set_draw_self(&self, game_object: Handle, visible: bool) {
        if let Some(drawn) = self.scene().drawn.get_mut(&game_object) {
            *drawn = visible;
        }
    }

    fn motion_skipped(&self, motion: Handle) -> bool {
        self.scene().skipped_motions.contains(&motion)
    }

    fn camera_distance_sq(&self, transform: Handle) -> Option<f64> {
        self.scene().nodes.get(&transform)?.distance_sq
    }
}

impl PlayerHost for SimGraph {
    fn player_slot_count(&self) -> Option<usize> {
        let scene = self.scene();
        (!scene.lists_hidden).then_some(scene.player_slots)
    }

    fn find_player(&self, index: usize, session: SessionQuery) -> PlayerLookup {
        let scene = self.scene();
        let listed = if scene.online {
            SessionQuery::Online
        } else {
            SessionQuery::Offline
        };
        if session != listed {
            return PlayerLookup::Empty;
        }
        match scene.players.get(&index) {
            None => PlayerLookup::Empty,
            Some(None) => PlayerLookup::Pending,
            Some(Some(player)) => PlayerLookup::Found(player.clone()),
        }
    }

    fn character_status(&self, character: Handle) -> Option<CharacterStatus> {
        self.scene().statuses.get(&character).copied()
    }

    fn preview_mode(&self) -> bool {
        self.scene().preview_mode
    }

    fn preview_armour_ids(&self) -> Option<[ArmorSetId; 5]> {
        self.scene().preview_ids
    }

    fn equipped_armour_id(&self, character: Handle, part: ArmorPart) -> Option<ArmorSetId> {
        self.scene().equipped.get(&(character, part)).copied()
    }

    fn armour_part_object(&self, owner: Handle, part: ArmorPart) -> Option<Handle> {
        let scene = self.scene();
        scene
            .part_objects
            .get(&(owner, part))
            .copied()
            .filter(|point| scene.nodes.contains_key(point))
    }

    fn kinsect_objects(&self, character: Handle) -> [Option<Handle>; 2] {
        self.scene()
            .kinsects
            .get(&character)
            .copied()
            .unwrap_or_default()
    }

    fn stage_hunter(&self, situation: Situation) -> Option<StageHunter> {
        self.scene().stage.get(&situation).cloned()
    }

    fn save_armour(&self, save_index: usize) -> Option<[Option<SavePartRecord>; 5]> {
        self.scene().saves.get(&save_index).copied()
    }

    fn creator_state(&self) -> Option<CreatorState> {
        self.scene().creator
    }

    fn guild_card_phase(&self) -> Option<u32> {
        self.scene().guild_card_phase
    }

    fn profile_armour_ids(&self) -> Option<[ArmorSetId; 6]> {
        self.scene().profile_ids
    }
}

impl NpcHost for SimGraph {
    fn npc_list(&self) -> Option<Box<dyn Iterator<Item = usize> + '_>> {
        let scene = self.scene();
        if scene.lists_hidden {
            return None;
        }
        let indices: Vec<usize> = scene.npcs.keys().copied().collect();
        Some(Box::new(indices.into_iter()))
    }

    fn lookup_npc(&self, index: usize) -> NpcLookup {
        match self.scene().npcs.get(&index) {
            Some(record) => NpcLookup::Found(record.clone()),
            None => NpcLookup::Empty,
        }
    }

    fn main_menu_partner(&self, index: usize) -> Option<MenuPartner> {
        self.scene().partners.get(&index).cloned()
    }

    fn partner_visible(&self, mesh_boundary: Handle, occludee: Handle) -> bool {
        let scene = self.scene();
        scene.visible_partners.contains(&mesh_boundary)
            && scene.live.get(&occludee) == Some(&TypeTag::VOLUME_OCCLUDEE)
    }
}
