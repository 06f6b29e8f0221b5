//! In-memory host used by the tests and the offline harness.

mod appliers;
mod catalog;
mod graph;
mod presets;

pub use appliers::{ApplyRecord, RecordingAppliers};
pub use catalog::SimCatalog;
pub use graph::{NpcSpawn, SimGraph, SimNpc, SimPlayer, SimStage};
pub use presets::{PresetRule, PresetTable};
