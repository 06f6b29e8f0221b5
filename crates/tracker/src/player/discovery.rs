use std::sync::Arc;

use crate::applier::AttachmentPoints;
use crate::armour::{ArmorPart, ArmourAssignment, ArmourCatalog};
use crate::discovery::{
    BasicInfo, BasicResolution, ChangePolicy, Discovery, FrameContext, PropHides, ScanPlan,
};
use crate::fingerprint::Fingerprint;
use crate::graph::find_transform;
use crate::handle::{ExternalRef, HandleOracle, TypeTag};
use crate::pipeline::{PropObjects, SetupError, StageError};
use crate::preset::PresetOwner;
use crate::settings::TrackerSettings;
use crate::situation::Situation;
use crate::visibility::{evaluate, Behaviour, FrameInfo, VisibilityProbe};

use super::host::{PlayerHost, PlayerLookup, SavePartRecord, SessionQuery};
use super::props::{is_sharpening, weapon_visibility};
use super::PlayerIdentity;

const MENU_SLOTS: &[usize] = &[0];
const SAVE_SLOTS: usize = 3;
const GUILD_CARD_READY_PHASE: u32 = 5;
const WEAPON_TRANSFORMS: [&str; 4] = [
    "Wp_Parent",
    "WpSub_Parent",
    "Wp_ReserveParent",
    "WpSub_ReserveParent",
];

/// Where a player's armour identities are read from. Chosen by context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmourSource {
    LiveEquipment,
    /// Whole-outfit preview armour (arena, dressing room), local player only.
    Preview,
    SaveRecord {
        save_index: Option<usize>,
        /// Read the inner layer; the creator hides outer armour.
        override_inner: bool,
    },
    ProfileCard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerBasic {
    pub identity: PlayerIdentity,
    pub transform: ExternalRef,
    /// Owner of the per-piece armour objects: the hunter character in
    /// gameplay, the stage model's game object in menus.
    pub character: ExternalRef,
    pub motion: Option<ExternalRef>,
    pub save_index: Option<usize>,
    pub staged: bool,
}

impl BasicInfo for PlayerBasic {
    type Key = PlayerIdentity;

    fn key(&self) -> PlayerIdentity {
        self.identity.clone()
    }

    fn female(&self) -> bool {
        self.identity.female
    }

    fn is_valid(&self, oracle: &dyn HandleOracle) -> bool {
        self.transform.is_live(oracle)
            && self.character.is_live(oracle)
            && self.motion.map_or(true, |motion| motion.is_live(oracle))
    }
}

pub struct PlayerDiscovery<H: PlayerHost> {
    host: Arc<H>,
    catalog: Arc<dyn ArmourCatalog>,
}

impl<H: PlayerHost> PlayerDiscovery<H> {
    pub fn new(host: Arc<H>, catalog: Arc<dyn ArmourCatalog>) -> Self {
        Self { host, catalog }
    }

    pub fn armour_source(&self, index: usize, basic: &PlayerBasic, ctx: &FrameContext) -> ArmourSource {
        match ctx.situation {
            Some(Situation::MainMenu | Situation::SaveSelect) => ArmourSource::SaveRecord {
                save_index: basic.save_index,
                override_inner: false,
            },
            Some(Situation::CharacterCreator) => {
                let state = self.host.creator_state();
                ArmourSource::SaveRecord {
                    save_index: state.map(|state| state.save_index).or(basic.save_index),
                    override_inner: state.is_some_and(|state| !state.armour_visible),
                }
            }
            Some(Situation::GuildCard) => ArmourSource::ProfileCard,
            Some(Situation::Cutscene) | None => {
                if index == 0 && self.host.preview_mode() {
                    ArmourSource::Preview
                } else {
                    ArmourSource::LiveEquipment
                }
            }
        }
    }

    fn live_armour(&self, basic: &PlayerBasic, parts: &[ArmorPart]) -> Result<ArmourAssignment, StageError> {
        let character = basic.character.handle;
        let mut ids = Vec::with_capacity(parts.len());
        for part in parts {
            let id = self
                .host
                .equipped_armour_id(character, *part)
                .ok_or_else(|| {
                    StageError::EquippedArmour(format!("no equipped {} id", part.piece()))
                })?;
            ids.push((*part, id));
        }
        Ok(ArmourAssignment::from_ids(self.catalog.as_ref(), ids))
    }

    fn save_armour(
        &self,
        save_index: Option<usize>,
        override_inner: bool,
        female: bool,
    ) -> Result<ArmourAssignment, StageError> {
        let save_index = save_index
            .ok_or_else(|| StageError::EquippedArmour("no save slot selected".to_owned()))?;
        if save_index >= SAVE_SLOTS {
            return Err(StageError::EquippedArmour(format!(
                "save index {save_index} out of range"
            )));
        }
        let records = self.host.save_armour(save_index).ok_or_else(|| {
            StageError::EquippedArmour(format!("save record {save_index} unavailable"))
        })?;

        let mut assignment = ArmourAssignment::default();
        for (part, record) in ArmorPart::OUTFIT.into_iter().zip(records) {
            let armour = record
                .and_then(|record| {
                    self.catalog
                        .set_id_from_series(save_series(&record, override_inner), female)
                })
                .map(|id| self.catalog.armour_or_default(id))
                .unwrap_or_default();
            assignment.set_part(part, Some(armour));
        }
        Ok(assignment)
    }

    /// Current per-piece transforms, whether or not they are complete.
    fn collect_points(&self, basic: &PlayerBasic) -> AttachmentPoints {
        let mut points = AttachmentPoints::new(basic.transform);
        for part in ArmorPart::OUTFIT {
            let point = self
                .host
                .armour_part_object(basic.character.handle, part)
                .map(ExternalRef::transform);
            points.set_part(part, point);
        }
        points
    }
}

fn save_series(record: &SavePartRecord, override_inner: bool) -> u32 {
    if override_inner {
        record.inner_series
    } else if record.outer_shown && record.outer_series != 0 {
        record.outer_series
    } else {
        record.equipped_series
    }
}

impl<H: PlayerHost + 'static> Discovery for PlayerDiscovery<H> {
    type Basic = PlayerBasic;

    const LABEL: &'static str = "player";
    const CHANGE_POLICY: ChangePolicy = ChangePolicy::DropPersistent;
    const REFETCH_EDGES: &'static [Situation] = &[Situation::Cutscene, Situation::GuildCard];

    fn oracle(&self) -> &dyn HandleOracle {
        self.host.as_ref()
    }

    fn capacity(&self) -> Result<usize, SetupError> {
        self.host
            .player_slot_count()
            .map(|count| count.max(MENU_SLOTS.len()))
            .ok_or(SetupError::ListUnavailable {
                tracker: "player",
                list: "player",
            })
    }

    fn scan_plan(&self, ctx: &FrameContext, _settings: &TrackerSettings) -> ScanPlan {
        if ctx.in_menu() {
            ScanPlan::Fixed(MENU_SLOTS)
        } else {
            ScanPlan::All
        }
    }

    fn resolve_basic(&self, index: usize, ctx: &FrameContext) -> BasicResolution<PlayerBasic> {
        if let Some(situation) = ctx.situation.filter(|situation| situation.is_menu()) {
            if index != 0 {
                return BasicResolution::Absent;
            }
            if situation == Situation::GuildCard
                && self.host.guild_card_phase() != Some(GUILD_CARD_READY_PHASE)
            {
                return BasicResolution::Absent;
            }
            let Some(stage) = self.host.stage_hunter(situation) else {
                return BasicResolution::Absent;
            };
            return BasicResolution::Resolved(PlayerBasic {
                identity: stage.identity,
                transform: ExternalRef::transform(stage.transform),
                character: ExternalRef::game_object(stage.part_owner),
                motion: None,
                save_index: stage.save_index,
                staged: true,
            });
        }

        let session = if ctx.online {
            SessionQuery::Online
        } else {
            SessionQuery::Offline
        };
        match self.host.find_player(index, session) {
            PlayerLookup::Empty => BasicResolution::Absent,
            PlayerLookup::Pending => BasicResolution::NotYetAvailable("character not spawned"),
            PlayerLookup::Found(player) => BasicResolution::Resolved(PlayerBasic {
                identity: player.identity,
                transform: ExternalRef::transform(player.transform),
                character: ExternalRef::new(player.character, TypeTag::HUNTER_CHARACTER),
                motion: player
                    .motion
                    .map(|motion| ExternalRef::new(motion, TypeTag::MOTION)),
                save_index: None,
                staged: false,
            }),
        }
    }

    fn evaluate_frame(
        &self,
        index: usize,
        basic: &PlayerBasic,
        _ctx: &FrameContext,
        settings: &TrackerSettings,
    ) -> FrameInfo {
        if basic.staged {
            return FrameInfo::staged(true);
        }

        let Some(status) = self
            .host
            .character_status(basic.character.handle)
            .filter(|status| status.set_up)
        else {
            return FrameInfo::hidden();
        };
        let behaviour = Behaviour {
            weapon_drawn: status.weapon_drawn,
            in_combat: status.in_combat,
            in_tent: status.in_tent,
            riding: status.riding,
            sharpening: is_sharpening(status.used_item_id),
        };
        let probe = VisibilityProbe {
            motion_skipped: basic
                .motion
                .is_some_and(|motion| self.host.motion_skipped(motion.handle)),
            distance_sq: self
                .host
                .camera_distance_sq(basic.transform.handle)
                .unwrap_or(f64::MAX),
        };

        let mut frame = evaluate(probe, settings.range_sq(), behaviour);
        frame.visible &= index == 0 || !behaviour.in_tent;
        frame
    }

    fn preset_owner(&self, _index: usize, basic: &PlayerBasic) -> PresetOwner {
        PresetOwner::Player(basic.identity.clone())
    }

    fn identify_armour(
        &self,
        index: usize,
        basic: &PlayerBasic,
        ctx: &FrameContext,
    ) -> Result<ArmourAssignment, StageError> {
        let female = basic.identity.female;
        match self.armour_source(index, basic, ctx) {
            ArmourSource::LiveEquipment => self.live_armour(basic, &ArmorPart::ALL),
            ArmourSource::Preview => {
                let ids = self.host.preview_armour_ids().ok_or_else(|| {
                    StageError::EquippedArmour("preview armour unavailable".to_owned())
                })?;
                let mut assignment = ArmourAssignment::from_ids(
                    self.catalog.as_ref(),
                    ArmorPart::OUTFIT.into_iter().zip(ids),
                );
                if let Ok(live) = self.live_armour(basic, &[ArmorPart::Slinger]) {
                    assignment.slinger = live.slinger;
                }
                Ok(assignment)
            }
            ArmourSource::SaveRecord {
                save_index,
                override_inner,
            } => self.save_armour(save_index, override_inner, female),
            ArmourSource::ProfileCard => {
                let ids = self.host.profile_armour_ids().ok_or_else(|| {
                    StageError::EquippedArmour("hunter profile armour unavailable".to_owned())
                })?;
                Ok(ArmourAssignment::from_ids(
                    self.catalog.as_ref(),
                    ArmorPart::ALL.into_iter().zip(ids),
                ))
            }
        }
    }

    fn locate_attachments(
        &self,
        basic: &PlayerBasic,
        _armour: &ArmourAssignment,
    ) -> Result<AttachmentPoints, StageError> {
        let points = self.collect_points(basic);
        // The helm may legitimately be absent (hidden or unequipped).
        for part in [ArmorPart::Body, ArmorPart::Arms, ArmorPart::Coil, ArmorPart::Legs] {
            if points.part(part).is_none() {
                return Err(StageError::AttachmentPoints(format!(
                    "{} transform missing",
                    part.piece()
                )));
            }
        }
        Ok(points)
    }

    fn locate_props(&self, basic: &PlayerBasic, _points: &AttachmentPoints) -> PropObjects {
        if basic.staged {
            return PropObjects::default();
        }
        let host = self.host.as_ref();
        let character = basic.character.handle;

        let weapons = WEAPON_TRANSFORMS
            .iter()
            .filter_map(|name| find_transform(host, basic.transform.handle, name))
            .filter_map(|transform| host.game_object_of(transform))
            .map(ExternalRef::game_object)
            .collect();
        let kinsects = host
            .kinsect_objects(character)
            .into_iter()
            .flatten()
            .map(ExternalRef::game_object)
            .collect();
        let slinger = host
            .armour_part_object(character, ArmorPart::Slinger)
            .and_then(|transform| host.game_object_of(transform))
            .map(ExternalRef::game_object);

        PropObjects {
            weapons,
            kinsects,
            slinger,
        }
    }

    fn model_fingerprint(&self, basic: &PlayerBasic, ctx: &FrameContext) -> Option<Fingerprint> {
        ctx.in_menu()
            .then(|| self.collect_points(basic).fingerprint())
    }

    fn apply_prop_visibility(
        &self,
        frame: &FrameInfo,
        props: &PropObjects,
        hides: PropHides,
        settings: &TrackerSettings,
    ) {
        let host = self.host.as_ref();
        let visibility = weapon_visibility(hides, &frame.behaviour, settings);

        if settings.enable_hide_weapons {
            for weapon in props.weapons.iter().filter(|weapon| weapon.is_live(host)) {
                host.set_draw_self(weapon.handle, visibility.weapon);
            }
            for kinsect in props.kinsects.iter().filter(|kinsect| kinsect.is_live(host)) {
                host.set_draw_self(kinsect.handle, visibility.kinsect);
            }
        }
        if let Some(slinger) = props.slinger.filter(|slinger| slinger.is_live(host)) {
            host.set_draw_self(slinger.handle, visibility.slinger);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::applier::ApplierKind;
    use crate::armour::{ArmorSetId, ArmourPiece, ArmourSet};
    use crate::discovery::BasicResolution;
    use crate::player::{CharacterStatus, CreatorState};
    use crate::preset::Preset;
    use crate::settings::SettingsHandle;
    use crate::sim::{PresetRule, PresetTable, RecordingAppliers, SimCatalog, SimGraph};
    use crate::situation::SituationFlags;
    use crate::slots::SlotState;
    use crate::tracker::Tracker;

    const HOPE: u32 = 1;
    const RATHALOS: u32 = 12;
    const GORE: u32 = 30;

    fn catalog() -> Arc<SimCatalog> {
        Arc::new(
            SimCatalog::default()
                .with_set(HOPE, "Hope")
                .with_set(RATHALOS, "Rathalos")
                .with_set(GORE, "Gore Magala"),
        )
    }

    fn hunter() -> PlayerIdentity {
        PlayerIdentity::new("Aiden", "HX7Q2", false)
    }

    fn rathalos() -> ArmourSet {
        ArmourSet::new("Rathalos", false)
    }

    fn equip_all(graph: &SimGraph, character: crate::handle::Handle, id: ArmorSetId) {
        for part in ArmorPart::ALL {
            graph.equip(character, part, id);
        }
    }

    fn discovery(graph: &Arc<SimGraph>) -> PlayerDiscovery<SimGraph> {
        PlayerDiscovery::new(Arc::clone(graph), catalog())
    }

    fn menu(situation: Situation) -> FrameContext {
        FrameContext {
            situation: Some(situation),
            ..FrameContext::default()
        }
    }

    fn resolved(resolution: BasicResolution<PlayerBasic>) -> PlayerBasic {
        match resolution {
            BasicResolution::Resolved(basic) => basic,
            other => panic!("expected resolved basic info, got {other:?}"),
        }
    }

    #[test]
    fn live_equipment_maps_ids_and_defaults_unknown_sets() {
        let graph = Arc::new(SimGraph::default());
        let player = graph.spawn_player(0, hunter(), 1.0);
        equip_all(&graph, player.character, SimCatalog::set_id(RATHALOS, false));
        graph.equip(player.character, ArmorPart::Helm, ArmorSetId::new(999, 0));
        let discovery = discovery(&graph);

        let ctx = FrameContext::default();
        let basic = resolved(discovery.resolve_basic(0, &ctx));
        assert_eq!(discovery.armour_source(0, &basic, &ctx), ArmourSource::LiveEquipment);

        let armour = discovery.identify_armour(0, &basic, &ctx).expect("armour");
        assert_eq!(armour.body, Some(rathalos()));
        assert_eq!(armour.slinger, Some(rathalos()));
        assert!(armour.helm.as_ref().is_some_and(ArmourSet::is_default));
    }

    #[test]
    fn missing_equip_slot_fails_identification() {
        let graph = Arc::new(SimGraph::default());
        let player = graph.spawn_player(0, hunter(), 1.0);
        graph.equip(player.character, ArmorPart::Body, SimCatalog::set_id(RATHALOS, false));
        let discovery = discovery(&graph);

        let ctx = FrameContext::default();
        let basic = resolved(discovery.resolve_basic(0, &ctx));
        let error = discovery
            .identify_armour(0, &basic, &ctx)
            .expect_err("helm id missing");
        assert_eq!(error.stage(), "equipped_armour");
    }

    #[test]
    fn preview_mode_only_applies_to_local_player() {
        let graph = Arc::new(SimGraph::default());
        let local = graph.spawn_player(0, hunter(), 1.0);
        let remote = graph.spawn_player(1, PlayerIdentity::new("Mina", "K2", true), 1.0);
        equip_all(&graph, local.character, SimCatalog::set_id(RATHALOS, false));
        equip_all(&graph, remote.character, SimCatalog::set_id(RATHALOS, true));
        graph.set_preview(true, Some([SimCatalog::set_id(GORE, false); 5]));
        let discovery = discovery(&graph);
        let ctx = FrameContext::default();

        let basic = resolved(discovery.resolve_basic(0, &ctx));
        assert_eq!(discovery.armour_source(0, &basic, &ctx), ArmourSource::Preview);
        let armour = discovery.identify_armour(0, &basic, &ctx).expect("preview armour");
        assert_eq!(armour.body, Some(ArmourSet::new("Gore Magala", false)));
        assert_eq!(armour.slinger, Some(rathalos()));

        let basic = resolved(discovery.resolve_basic(1, &ctx));
        assert_eq!(discovery.armour_source(1, &basic, &ctx), ArmourSource::LiveEquipment);
    }

    #[test]
    fn pending_character_is_not_yet_available() {
        let graph = Arc::new(SimGraph::default());
        graph.set_player_pending(2);
        let discovery = discovery(&graph);

        let ctx = FrameContext::default();
        assert!(matches!(
            discovery.resolve_basic(2, &ctx),
            BasicResolution::NotYetAvailable(_)
        ));
        assert_eq!(discovery.resolve_basic(3, &ctx), BasicResolution::Absent);
    }

    #[test]
    fn save_record_prefers_shown_outer_layer() {
        let graph = Arc::new(SimGraph::default());
        graph.place_stage_hunter(Situation::SaveSelect, hunter(), Some(1));
        let record = SavePartRecord {
            equipped_series: RATHALOS,
            outer_series: GORE,
            outer_shown: true,
            inner_series: HOPE,
        };
        graph.set_save_armour(1, [Some(record); 5]);
        let discovery = discovery(&graph);
        let ctx = menu(Situation::SaveSelect);

        let basic = resolved(discovery.resolve_basic(0, &ctx));
        assert!(basic.staged);
        let armour = discovery.identify_armour(0, &basic, &ctx).expect("save armour");
        assert_eq!(armour.legs, Some(ArmourSet::new("Gore Magala", false)));
        assert_eq!(armour.slinger, None);

        let hidden_outer = SavePartRecord {
            outer_shown: false,
            ..record
        };
        graph.set_save_armour(1, [Some(hidden_outer); 5]);
        let armour = discovery.identify_armour(0, &basic, &ctx).expect("save armour");
        assert_eq!(armour.legs, Some(rathalos()));
    }

    #[test]
    fn creator_reads_inner_layer_when_armour_hidden() {
        let graph = Arc::new(SimGraph::default());
        graph.place_stage_hunter(Situation::CharacterCreator, hunter(), None);
        let record = SavePartRecord {
            equipped_series: RATHALOS,
            outer_series: 0,
            outer_shown: false,
            inner_series: HOPE,
        };
        graph.set_save_armour(2, [Some(record), None, None, None, None]);
        graph.set_creator_state(Some(CreatorState {
            save_index: 2,
            armour_visible: false,
        }));
        let discovery = discovery(&graph);
        let ctx = menu(Situation::CharacterCreator);

        let basic = resolved(discovery.resolve_basic(0, &ctx));
        assert_eq!(
            discovery.armour_source(0, &basic, &ctx),
            ArmourSource::SaveRecord {
                save_index: Some(2),
                override_inner: true
            }
        );
        let armour = discovery.identify_armour(0, &basic, &ctx).expect("creator armour");
        assert_eq!(armour.helm, Some(ArmourSet::new("Hope", false)));
        assert!(armour.body.as_ref().is_some_and(ArmourSet::is_default));
    }

    #[test]
    fn save_index_out_of_range_fails() {
        let graph = Arc::new(SimGraph::default());
        graph.place_stage_hunter(Situation::MainMenu, hunter(), Some(SAVE_SLOTS));
        let discovery = discovery(&graph);
        let ctx = menu(Situation::MainMenu);

        let basic = resolved(discovery.resolve_basic(0, &ctx));
        assert!(discovery.identify_armour(0, &basic, &ctx).is_err());
    }

    #[test]
    fn guild_card_waits_for_setup_phase() {
        let graph = Arc::new(SimGraph::default());
        graph.place_stage_hunter(Situation::GuildCard, hunter(), None);
        graph.set_profile_armour(Some([SimCatalog::set_id(GORE, false); 6]));
        let discovery = discovery(&graph);
        let ctx = menu(Situation::GuildCard);

        graph.set_guild_card_phase(Some(GUILD_CARD_READY_PHASE - 1));
        assert_eq!(discovery.resolve_basic(0, &ctx), BasicResolution::Absent);

        graph.set_guild_card_phase(Some(GUILD_CARD_READY_PHASE));
        let basic = resolved(discovery.resolve_basic(0, &ctx));
        let armour = discovery.identify_armour(0, &basic, &ctx).expect("profile armour");
        assert_eq!(armour.slinger, Some(ArmourSet::new("Gore Magala", false)));
        assert_eq!(discovery.resolve_basic(1, &ctx), BasicResolution::Absent);
    }

    #[test]
    fn tent_hides_remote_players_only() {
        let graph = Arc::new(SimGraph::default());
        let local = graph.spawn_player(0, hunter(), 1.0);
        let remote = graph.spawn_player(1, PlayerIdentity::new("Mina", "K2", true), 1.0);
        let discovery = discovery(&graph);
        let ctx = FrameContext::default();
        let settings = TrackerSettings::default();

        let in_tent = CharacterStatus {
            set_up: true,
            in_tent: true,
            ..CharacterStatus::default()
        };
        graph.set_character_status(local.character, in_tent);
        graph.set_character_status(remote.character, in_tent);

        let basic = resolved(discovery.resolve_basic(0, &ctx));
        assert!(discovery.evaluate_frame(0, &basic, &ctx, &settings).visible);
        let basic = resolved(discovery.resolve_basic(1, &ctx));
        assert!(!discovery.evaluate_frame(1, &basic, &ctx, &settings).visible);

        graph.set_character_status(remote.character, CharacterStatus::default());
        assert!(!discovery.evaluate_frame(1, &basic, &ctx, &settings).visible);
    }

    #[test]
    fn helm_point_is_optional() {
        let graph = Arc::new(SimGraph::default());
        let player = graph.spawn_player(0, hunter(), 1.0);
        let discovery = discovery(&graph);
        let ctx = FrameContext::default();
        let basic = resolved(discovery.resolve_basic(0, &ctx));
        let armour = ArmourAssignment::default();

        let helm = graph
            .armour_part_object(player.character, ArmorPart::Helm)
            .expect("helm point");
        graph.detach(helm);
        let points = discovery.locate_attachments(&basic, &armour).expect("points");
        assert_eq!(points.helm, None);

        let legs = graph
            .armour_part_object(player.character, ArmorPart::Legs)
            .expect("legs point");
        graph.detach(legs);
        assert!(discovery.locate_attachments(&basic, &armour).is_err());
    }

    struct Fixture {
        graph: Arc<SimGraph>,
        presets: Arc<PresetTable>,
        appliers: Arc<RecordingAppliers>,
        tracker: Tracker<PlayerDiscovery<SimGraph>>,
        start: Instant,
    }

    impl Fixture {
        fn new(settings: TrackerSettings) -> Self {
            let graph = Arc::new(SimGraph::default());
            graph.set_player_slots(4);
            let presets = Arc::new(PresetTable::default());
            let appliers = Arc::new(RecordingAppliers::default());
            let tracker = Tracker::new(
                discovery(&graph),
                presets.clone(),
                appliers.clone(),
                SettingsHandle::new(TrackerSettings {
                    delay_on_equip: 0.0,
                    max_bone_fetches_per_frame: 4,
                    ..settings
                }),
            )
            .expect("player tracker");
            Self {
                graph,
                presets,
                appliers,
                tracker,
                start: Instant::now(),
            }
        }

        fn tick(&mut self, flags: &SituationFlags, millis: u64) -> crate::tracker::FrameReport {
            let now = self.start + Duration::from_millis(millis);
            let report = self.tracker.frame(flags, now);
            self.tracker.apply_all(now);
            report
        }
    }

    #[test]
    fn preset_hides_sheathed_weapon_and_slinger() {
        let mut fixture = Fixture::new(TrackerSettings::default());
        let player = fixture.graph.spawn_player(0, hunter(), 1.0);
        equip_all(&fixture.graph, player.character, SimCatalog::set_id(RATHALOS, false));
        fixture.presets.add_rule(PresetRule::any(Preset {
            hide_weapon: true,
            hide_slinger: true,
            ..Preset::new("stealth", ArmourSet::default_set())
        }));
        let gameplay = SituationFlags::default();

        fixture.tick(&gameplay, 0);
        assert_eq!(fixture.graph.is_drawn(player.weapon), Some(false));
        assert_eq!(fixture.graph.is_drawn(player.kinsect), Some(false));
        assert_eq!(fixture.graph.is_drawn(player.slinger), Some(false));

        fixture.graph.set_character_status(
            player.character,
            CharacterStatus {
                set_up: true,
                weapon_drawn: true,
                ..CharacterStatus::default()
            },
        );
        fixture.tick(&gameplay, 16);
        assert_eq!(fixture.graph.is_drawn(player.weapon), Some(true));
        assert_eq!(fixture.graph.is_drawn(player.kinsect), Some(true));
        assert_eq!(fixture.graph.is_drawn(player.slinger), Some(false));
    }

    #[test]
    fn weapons_untouched_when_hiding_disabled() {
        let mut fixture = Fixture::new(TrackerSettings {
            enable_hide_weapons: false,
            ..TrackerSettings::default()
        });
        let player = fixture.graph.spawn_player(0, hunter(), 1.0);
        equip_all(&fixture.graph, player.character, SimCatalog::set_id(RATHALOS, false));
        fixture.presets.add_rule(PresetRule::any(Preset {
            hide_weapon: true,
            ..Preset::new("stealth", ArmourSet::default_set())
        }));

        fixture.tick(&SituationFlags::default(), 0);
        assert_eq!(fixture.tracker.slot(0).expect("slot").state, SlotState::Resolved);
        assert_eq!(fixture.graph.is_drawn(player.weapon), Some(true));
    }

    #[test]
    fn menu_model_swap_rebuilds_without_signal() {
        let mut fixture = Fixture::new(TrackerSettings::default());
        fixture
            .presets
            .add_rule(PresetRule::any(Preset::new("everyone", ArmourSet::default_set())));
        let stage = fixture
            .graph
            .place_stage_hunter(Situation::MainMenu, hunter(), Some(0));
        fixture.graph.set_save_armour(0, [None; 5]);
        let main_menu = SituationFlags::default().with(Situation::MainMenu, true);

        let report = fixture.tick(&main_menu, 0);
        assert!(report.reset);
        assert_eq!(report.persistent_resolved, 1);
        let builds = fixture.appliers.builds();

        let report = fixture.tick(&main_menu, 16);
        assert_eq!(report.persistent_attempts, 0);

        fixture
            .graph
            .swap_part_object(stage.part_owner, ArmorPart::Helm)
            .expect("helm swapped");
        let report = fixture.tick(&main_menu, 32);
        assert_eq!(report.invalidated, 1);
        assert_eq!(report.persistent_resolved, 1);
        assert_eq!(fixture.appliers.builds(), builds * 2);
    }

    #[test]
    fn equip_signal_rebuilds_player() {
        let mut fixture = Fixture::new(TrackerSettings::default());
        fixture
            .presets
            .add_rule(PresetRule::any(Preset::new("everyone", ArmourSet::default_set())));
        let player = fixture.graph.spawn_player(0, hunter(), 1.0);
        equip_all(&fixture.graph, player.character, SimCatalog::set_id(RATHALOS, false));
        let gameplay = SituationFlags::default();
        fixture.tick(&gameplay, 0);
        fixture.appliers.take_records();

        equip_all(&fixture.graph, player.character, SimCatalog::set_id(GORE, false));
        fixture.tracker.signals().entity_changed(0);
        let slot = fixture.tracker.slot(0).expect("slot");
        assert_eq!(slot.state, SlotState::BasicOnly);
        assert!(slot.needs_refetch);

        let report = fixture.tick(&gameplay, 16);
        assert_eq!(report.persistent_resolved, 1);
        let bones = fixture
            .appliers
            .records()
            .into_iter()
            .filter(|record| record.kind == ApplierKind::Bone)
            .count();
        assert_eq!(bones, ArmourPiece::CUSTOMISABLE.len());
    }

    #[test]
    fn session_flag_picks_player_list() {
        let graph = Arc::new(SimGraph::default());
        graph.set_online(true);
        graph.spawn_player(2, hunter(), 1.0);
        let discovery = discovery(&graph);

        assert_eq!(
            discovery.resolve_basic(2, &FrameContext::default()),
            BasicResolution::Absent
        );
        let online = FrameContext {
            online: true,
            ..FrameContext::default()
        };
        assert_eq!(resolved(discovery.resolve_basic(2, &online)).identity, hunter());
    }
}
