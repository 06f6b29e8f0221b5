//! Per-frame armour tracking for players and NPCs.
//!
//! A [`Tracker`] keeps one slot per host list index, resolves the cheap
//! per-frame state for every occupied slot, spends a bounded budget on the
//! expensive bone and part lookups, and hands visible entities to an
//! [`ApplierFactory`] closest first. [`Runtime`] drives the player and NPC
//! trackers together; [`TrackerService`] adds deferred start-up and a crash
//! guard on top.

pub mod applier;
pub mod armour;
mod cooldown;
pub mod discovery;
pub mod fingerprint;
pub mod graph;
pub mod handle;
pub mod npc;
pub mod pipeline;
pub mod player;
pub mod preset;
pub mod runtime;
mod scheduler;
pub mod settings;
pub mod sim;
pub mod situation;
mod slots;
pub mod stats;
pub mod tracker;
pub mod visibility;

pub use applier::{
    ApplierFactory, ApplierKind, ApplierRequest, ApplyStatus, AttachmentApplier, AttachmentPoints,
};
pub use armour::{
    ArmorPart, ArmorSetId, ArmourAssignment, ArmourCatalog, ArmourPiece, ArmourSet,
    DEFAULT_ARMOUR_NAME,
};
pub use discovery::{BasicResolution, Discovery, FrameContext, ScanPlan};
pub use fingerprint::Fingerprint;
pub use graph::{LiveGraph, TransformTree};
pub use handle::{ExternalRef, Handle, HandleOracle, TypeTag};
pub use pipeline::{SetupError, StageError};
pub use preset::{Preset, PresetId, PresetOwner, PresetSource};
pub use runtime::{DeferredInit, InitError, Runtime, Services, TrackerService};
pub use settings::{SettingsHandle, TrackerSettings};
pub use situation::{Situation, SituationFlags};
pub use slots::SlotState;
pub use stats::{FrameCounters, PhaseTiming, StatsHandle, StatsSnapshot};
pub use tracker::{ApplyReport, FrameReport, SlotCounts, SlotView, Tracker, TrackerSignals};
pub use visibility::{Behaviour, FrameInfo};
