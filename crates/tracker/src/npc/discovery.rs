use std::sync::Arc;

use crate::applier::AttachmentPoints;
use crate::armour::{ArmorPart, ArmourAssignment, ArmourCatalog, ArmourSet};
use crate::discovery::{BasicInfo, BasicResolution, ChangePolicy, Discovery, FrameContext, ScanPlan};
use crate::graph::{child_names, find_transform};
use crate::handle::{ExternalRef, HandleOracle, TypeTag};
use crate::pipeline::{SetupError, StageError};
use crate::preset::PresetOwner;
use crate::settings::TrackerSettings;
use crate::situation::Situation;
use crate::visibility::{evaluate, Behaviour, FrameInfo, VisibilityProbe};

use super::host::{NpcHost, NpcLookup};

pub const MAX_NPCS: usize = 2000;
/// Indices the two main-menu partners are tracked under.
pub const MENU_PARTNER_SLOTS: &[usize] = &[0, 8];
/// Worn by unarmoured hunter-type NPCs in place of a real helm.
const PLACEHOLDER_HELM: &str = "Alloy 0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NpcKind {
    /// Whole-body prefab; armour follows from the path.
    Prefab(String),
    /// Wears individual armour pieces like a player.
    Hunter,
}

impl NpcKind {
    fn from_prefab_path(path: String) -> Self {
        if path.is_empty() {
            NpcKind::Hunter
        } else {
            NpcKind::Prefab(path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcBasic {
    pub index: usize,
    pub transform: ExternalRef,
    pub motion: Option<ExternalRef>,
    pub character: Option<ExternalRef>,
    pub female: bool,
    pub kind: NpcKind,
    /// Mesh boundary and occludee of a menu partner.
    pub menu_probe: Option<(ExternalRef, ExternalRef)>,
}

impl BasicInfo for NpcBasic {
    type Key = usize;

    fn key(&self) -> usize {
        self.index
    }

    fn female(&self) -> bool {
        self.female
    }

    fn is_valid(&self, oracle: &dyn HandleOracle) -> bool {
        self.transform.is_live(oracle)
            && [self.motion, self.character]
                .iter()
                .flatten()
                .all(|reference| reference.is_live(oracle))
            && self
                .menu_probe
                .map_or(true, |(mesh, occludee)| mesh.is_live(oracle) && occludee.is_live(oracle))
    }
}

pub struct NpcDiscovery<H: NpcHost> {
    host: Arc<H>,
    catalog: Arc<dyn ArmourCatalog>,
}

impl<H: NpcHost> NpcDiscovery<H> {
    pub fn new(host: Arc<H>, catalog: Arc<dyn ArmourCatalog>) -> Self {
        Self { host, catalog }
    }

    fn worn_armour(&self, basic: &NpcBasic) -> Result<ArmourAssignment, StageError> {
        let mut assignment = ArmourAssignment::default();
        for (_, name) in child_names(self.host.as_ref(), basic.transform.handle) {
            if let Some((part, armour)) = self.catalog.part_from_prefab_name(&name, basic.female) {
                assignment.set_part(part, Some(armour));
            }
        }

        if assignment
            .helm
            .as_ref()
            .is_some_and(|helm| helm.name == PLACEHOLDER_HELM && !helm.female)
        {
            assignment.helm = Some(ArmourSet::default_set());
        }
        if assignment.body.as_ref().map_or(true, ArmourSet::is_default) {
            return Err(StageError::EquippedArmour(
                "hunter npc body armour unresolved".to_owned(),
            ));
        }
        Ok(assignment)
    }
}

impl<H: NpcHost + 'static> Discovery for NpcDiscovery<H> {
    type Basic = NpcBasic;

    const LABEL: &'static str = "npc";
    const CHANGE_POLICY: ChangePolicy = ChangePolicy::ClearSlot;
    const REFETCH_EDGES: &'static [Situation] = &[Situation::Cutscene];

    fn oracle(&self) -> &dyn HandleOracle {
        self.host.as_ref()
    }

    fn capacity(&self) -> Result<usize, SetupError> {
        let list = self.host.npc_list().ok_or(SetupError::ListUnavailable {
            tracker: "npc",
            list: "npc",
        })?;
        let listed = list
            .take(MAX_NPCS)
            .fold(0, |capacity, index| capacity.max(index + 1))
            .min(MAX_NPCS);
        let menu = MENU_PARTNER_SLOTS.iter().max().map_or(0, |index| index + 1);
        Ok(listed.max(menu))
    }

    fn scan_plan(&self, ctx: &FrameContext, settings: &TrackerSettings) -> ScanPlan {
        match ctx.situation {
            Some(Situation::MainMenu) => ScanPlan::Fixed(MENU_PARTNER_SLOTS),
            Some(situation) if situation.is_menu() => ScanPlan::Idle,
            _ if settings.enable_during_quests_only && !ctx.in_quest => ScanPlan::Idle,
            _ => ScanPlan::All,
        }
    }

    fn resolve_basic(&self, index: usize, ctx: &FrameContext) -> BasicResolution<NpcBasic> {
        if ctx.situation == Some(Situation::MainMenu) {
            let Some(partner) = self.host.main_menu_partner(index) else {
                return BasicResolution::Absent;
            };
            return BasicResolution::Resolved(NpcBasic {
                index,
                transform: ExternalRef::transform(partner.transform),
                motion: None,
                character: None,
                female: partner.female,
                kind: NpcKind::from_prefab_path(partner.prefab_path),
                menu_probe: Some((
                    ExternalRef::new(partner.mesh_boundary, TypeTag::MESH_BOUNDARY),
                    ExternalRef::new(partner.occludee, TypeTag::VOLUME_OCCLUDEE),
                )),
            });
        }

        let record = match self.host.lookup_npc(index) {
            NpcLookup::Empty => return BasicResolution::Absent,
            NpcLookup::Found(record) => record,
        };
        if record.species > 1 {
            return BasicResolution::Unsupported;
        }
        if record.game_object.is_none() {
            return BasicResolution::NotYetAvailable("npc game object missing");
        }
        let Some(transform) = record.transform else {
            return BasicResolution::NotYetAvailable("npc transform missing");
        };
        let Some(motion) = record.motion else {
            return BasicResolution::NotYetAvailable("npc motion missing");
        };
        let Some(character) = record.character else {
            return BasicResolution::NotYetAvailable("npc character missing");
        };

        BasicResolution::Resolved(NpcBasic {
            index,
            transform: ExternalRef::transform(transform),
            motion: Some(ExternalRef::new(motion, TypeTag::MOTION)),
            character: Some(ExternalRef::game_object(character)),
            female: record.female,
            kind: NpcKind::from_prefab_path(record.prefab_path),
            menu_probe: None,
        })
    }

    fn evaluate_frame(
        &self,
        _index: usize,
        basic: &NpcBasic,
        _ctx: &FrameContext,
        settings: &TrackerSettings,
    ) -> FrameInfo {
        if let Some((mesh, occludee)) = basic.menu_probe {
            return FrameInfo::staged(self.host.partner_visible(mesh.handle, occludee.handle));
        }

        let probe = VisibilityProbe {
            motion_skipped: basic
                .motion
                .is_some_and(|motion| self.host.motion_skipped(motion.handle)),
            distance_sq: self
                .host
                .camera_distance_sq(basic.transform.handle)
                .unwrap_or(f64::MAX),
        };
        evaluate(probe, settings.range_sq(), Behaviour::default())
    }

    fn preset_owner(&self, index: usize, basic: &NpcBasic) -> PresetOwner {
        PresetOwner::Npc {
            npc: self.catalog.npc_identity(index),
            female: basic.female,
        }
    }

    fn identify_armour(
        &self,
        _index: usize,
        basic: &NpcBasic,
        _ctx: &FrameContext,
    ) -> Result<ArmourAssignment, StageError> {
        match &basic.kind {
            NpcKind::Prefab(path) => {
                let body = self
                    .catalog
                    .armour_from_npc_prefab(path, basic.female)
                    .filter(|armour| !armour.is_default())
                    .ok_or_else(|| {
                        StageError::EquippedArmour(format!("no armour for prefab {path}"))
                    })?;
                Ok(ArmourAssignment {
                    body: Some(body),
                    ..ArmourAssignment::default()
                })
            }
            NpcKind::Hunter => self.worn_armour(basic),
        }
    }

    fn locate_attachments(
        &self,
        basic: &NpcBasic,
        armour: &ArmourAssignment,
    ) -> Result<AttachmentPoints, StageError> {
        let host = self.host.as_ref();
        let root = basic.transform.handle;
        let mut points = AttachmentPoints::new(basic.transform);

        match &basic.kind {
            NpcKind::Prefab(path) => {
                let name = self.catalog.npc_primary_transform_name(path).ok_or_else(|| {
                    StageError::AttachmentPoints(format!("no primary transform for {path}"))
                })?;
                let body = find_transform(host, root, &name).ok_or_else(|| {
                    StageError::AttachmentPoints(format!("{name} not found"))
                })?;
                points.body = Some(ExternalRef::transform(body));
            }
            NpcKind::Hunter => {
                for part in ArmorPart::OUTFIT {
                    let Some(set) = armour.part(part).filter(|set| !set.is_default()) else {
                        continue;
                    };
                    let Some(id) = self.catalog.set_id_for_armour(set) else {
                        continue;
                    };
                    let name = self.catalog.prefab_name(id, part.piece(), basic.female);
                    points.set_part(
                        part,
                        find_transform(host, root, &name).map(ExternalRef::transform),
                    );
                }
                if points.body.is_none() {
                    return Err(StageError::AttachmentPoints(
                        "body transform not found".to_owned(),
                    ));
                }
            }
        }

        Ok(points)
    }
}
