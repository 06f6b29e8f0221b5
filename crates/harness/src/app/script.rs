use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracker::sim::{PresetRule, PresetTable, SimCatalog};
use tracker::{ArmorPart, ArmourPiece, Preset, PresetOwner, SituationFlags, TrackerSettings};

/// Script used when no path is given on the command line.
pub(crate) const DEMO_SCRIPT: &str = include_str!("../../scripts/demo.json");

const DEFAULT_FRAME_MS: u64 = 16;
const DEFAULT_PLAYER_SLOTS: usize = 4;

#[derive(Debug, Error)]
pub(crate) enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid script {origin} at {field}: {source}")]
    Parse {
        origin: String,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("script {origin} has no steps")]
    Empty { origin: String },
}

/// A scripted session against the simulated host.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Script {
    #[serde(default)]
    pub(crate) catalog: CatalogSpec,
    #[serde(default)]
    pub(crate) presets: Vec<PresetSpec>,
    #[serde(default = "default_player_slots")]
    pub(crate) player_slots: usize,
    #[serde(default = "default_frame_ms")]
    pub(crate) frame_ms: u64,
    pub(crate) steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CatalogSpec {
    #[serde(default)]
    pub(crate) sets: Vec<SetSpec>,
    #[serde(default)]
    pub(crate) npc_prefabs: Vec<PrefabSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SetSpec {
    pub(crate) id: u32,
    pub(crate) name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PrefabSpec {
    pub(crate) path: String,
    pub(crate) armour: String,
    pub(crate) primary_transform: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PresetSpec {
    pub(crate) preset: Preset,
    #[serde(default)]
    pub(crate) owner: Option<PresetOwner>,
    #[serde(default)]
    pub(crate) piece: Option<ArmourPiece>,
}

/// Events applied once, then `frames` ticks under `flags`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Step {
    #[serde(default = "default_step_frames")]
    pub(crate) frames: u32,
    #[serde(default)]
    pub(crate) flags: SituationFlags,
    #[serde(default)]
    pub(crate) events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", deny_unknown_fields)]
pub(crate) enum Event {
    SpawnPlayer {
        index: usize,
        name: String,
        hunter_id: String,
        #[serde(default)]
        female: bool,
        #[serde(default = "default_distance_sq")]
        distance_sq: f64,
        #[serde(default)]
        armour: Option<u32>,
    },
    DespawnPlayer {
        index: usize,
    },
    Equip {
        index: usize,
        part: ArmorPart,
        set: u32,
    },
    SpawnNpc {
        index: usize,
        #[serde(default)]
        female: bool,
        #[serde(default)]
        prefab_path: String,
        #[serde(default)]
        species: u32,
        #[serde(default = "default_distance_sq")]
        distance_sq: f64,
        #[serde(default)]
        armour: Option<u32>,
    },
    DespawnNpc {
        index: usize,
    },
    Settings {
        settings: TrackerSettings,
    },
}

fn default_player_slots() -> usize {
    DEFAULT_PLAYER_SLOTS
}

fn default_frame_ms() -> u64 {
    DEFAULT_FRAME_MS
}

fn default_step_frames() -> u32 {
    1
}

fn default_distance_sq() -> f64 {
    1.0
}

impl Script {
    pub(crate) fn total_frames(&self) -> u64 {
        self.steps.iter().map(|step| u64::from(step.frames)).sum()
    }

    pub(crate) fn build_catalog(&self) -> SimCatalog {
        let catalog = self
            .catalog
            .sets
            .iter()
            .fold(SimCatalog::default(), |catalog, set| {
                catalog.with_set(set.id, &set.name)
            });
        self.catalog
            .npc_prefabs
            .iter()
            .fold(catalog, |catalog, prefab| {
                catalog.with_npc_prefab(&prefab.path, &prefab.armour, &prefab.primary_transform)
            })
    }

    pub(crate) fn build_presets(&self) -> PresetTable {
        let table = PresetTable::default();
        for spec in &self.presets {
            let mut rule = PresetRule::any(spec.preset.clone());
            if let Some(owner) = &spec.owner {
                rule = rule.for_owner(owner.clone());
            }
            if let Some(piece) = spec.piece {
                rule = rule.for_piece(piece);
            }
            table.add_rule(rule);
        }
        table
    }
}

pub(crate) fn load_script(path: &Path) -> Result<Script, ScriptError> {
    let raw = fs::read_to_string(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&raw, &path.display().to_string())
}

pub(crate) fn parse_script(raw: &str, origin: &str) -> Result<Script, ScriptError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let script = serde_path_to_error::deserialize::<_, Script>(&mut deserializer).map_err(
        |error| ScriptError::Parse {
            origin: origin.to_owned(),
            field: error.path().to_string(),
            source: error.into_inner(),
        },
    )?;
    if script.steps.is_empty() {
        return Err(ScriptError::Empty {
            origin: origin.to_owned(),
        });
    }
    Ok(script)
}
