use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use tracker::player::PlayerIdentity;
use tracker::sim::{NpcSpawn, RecordingAppliers, SimCatalog, SimGraph, SimPlayer};
use tracker::{
    ArmorPart, ArmourCatalog, FrameCounters, Services, SettingsHandle, SituationFlags,
    StatsSnapshot, TrackerService, TrackerSettings,
};

use super::bootstrap::AppWiring;
use super::script::{Event, Script};

const INIT_POLL_INTERVAL: Duration = Duration::from_millis(2);
const INIT_POLL_ATTEMPTS: u32 = 1000;
const STATS_LOG_INTERVAL_FRAMES: u64 = 60;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut runner = ScriptRunner::new(&app.script, app.settings);
    if !runner.wait_until_ready() {
        error!("tracker_runtime_unavailable");
        return ExitCode::FAILURE;
    }

    let summary = runner.run(&app.script);
    info!(
        frames = summary.frames,
        applied = summary.applied,
        apply_calls = summary.apply_calls,
        fetch_avg_ms = summary.stats.fetch.avg_ms,
        fetch_max_ms = summary.stats.fetch.max_ms,
        apply_avg_ms = summary.stats.apply.avg_ms,
        apply_max_ms = summary.stats.apply.max_ms,
        "harness_run_complete"
    );

    if summary.disabled {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RunSummary {
    pub(crate) frames: u64,
    pub(crate) applied: u64,
    pub(crate) apply_calls: usize,
    pub(crate) disabled: bool,
    pub(crate) stats: StatsSnapshot,
}

/// Plays a [`Script`] against the simulated host, one tracker tick per
/// scripted frame on a fixed simulated clock.
pub(crate) struct ScriptRunner {
    graph: Arc<SimGraph>,
    catalog: Arc<SimCatalog>,
    appliers: Arc<RecordingAppliers>,
    settings: SettingsHandle,
    service: TrackerService<SimGraph>,
    players: HashMap<usize, (SimPlayer, bool)>,
    start: Instant,
    frame_step: Duration,
    tick: u64,
}

impl ScriptRunner {
    pub(crate) fn new(script: &Script, settings: TrackerSettings) -> Self {
        let graph = Arc::new(SimGraph::default());
        graph.set_player_slots(script.player_slots);
        let catalog = Arc::new(script.build_catalog());
        let appliers = Arc::new(RecordingAppliers::default());
        let settings = SettingsHandle::new(settings);
        let services = Services {
            catalog: catalog.clone(),
            presets: Arc::new(script.build_presets()),
            appliers: appliers.clone(),
            settings: settings.clone(),
        };
        let service = TrackerService::start(Arc::clone(&graph), services);

        Self {
            graph,
            catalog,
            appliers,
            settings,
            service,
            players: HashMap::new(),
            start: Instant::now(),
            frame_step: Duration::from_millis(script.frame_ms),
            tick: 0,
        }
    }

    /// Ticks with empty flags until the deferred runtime is up. `false` when
    /// the service gave up or initialization never finished.
    pub(crate) fn wait_until_ready(&mut self) -> bool {
        for _ in 0..INIT_POLL_ATTEMPTS {
            if self.service.runtime().is_some() {
                info!("harness_tracker_ready");
                return true;
            }
            if self.service.is_disabled() {
                return false;
            }
            self.service.frame(&SituationFlags::default(), self.start);
            thread::sleep(INIT_POLL_INTERVAL);
        }
        warn!(attempts = INIT_POLL_ATTEMPTS, "harness_tracker_init_timed_out");
        false
    }

    pub(crate) fn run(&mut self, script: &Script) -> RunSummary {
        let mut frames = 0u64;
        let mut applied = 0u64;
        for (step_index, step) in script.steps.iter().enumerate() {
            for event in &step.events {
                self.apply_event(event);
            }
            for _ in 0..step.frames {
                let Some(counters) = self.tick(&step.flags) else {
                    continue;
                };
                frames += 1;
                applied += u64::from(counters.applied);
                debug!(
                    step = step_index,
                    visited = counters.visited,
                    resolved = counters.persistent_resolved,
                    applied = counters.applied,
                    reset = counters.reset,
                    "harness_frame"
                );
                if frames % STATS_LOG_INTERVAL_FRAMES == 0 {
                    self.log_stats();
                }
            }
        }

        RunSummary {
            frames,
            applied,
            apply_calls: self.appliers.records().len(),
            disabled: self.service.is_disabled(),
            stats: self.stats(),
        }
    }

    fn tick(&mut self, flags: &SituationFlags) -> Option<FrameCounters> {
        self.tick += 1;
        let now = self.start + self.frame_step.saturating_mul(self.tick_u32());
        self.service.frame(flags, now)
    }

    fn tick_u32(&self) -> u32 {
        u32::try_from(self.tick).unwrap_or(u32::MAX)
    }

    fn stats(&self) -> StatsSnapshot {
        self.service
            .runtime()
            .map(|runtime| runtime.stats().snapshot())
            .unwrap_or_default()
    }

    fn log_stats(&self) {
        let stats = self.stats();
        info!(
            frames = stats.frames,
            resets = stats.resets,
            fetch_last_ms = stats.fetch.last_ms,
            fetch_avg_ms = stats.fetch.avg_ms,
            apply_last_ms = stats.apply.last_ms,
            apply_avg_ms = stats.apply.avg_ms,
            "tracker_stats"
        );
    }

    fn apply_event(&mut self, event: &Event) {
        match event {
            Event::SpawnPlayer {
                index,
                name,
                hunter_id,
                female,
                distance_sq,
                armour,
            } => {
                let identity = PlayerIdentity::new(name.as_str(), hunter_id.as_str(), *female);
                let player = self.graph.spawn_player(*index, identity, *distance_sq);
                if let Some(set) = armour {
                    for part in ArmorPart::ALL {
                        self.graph
                            .equip(player.character, part, SimCatalog::set_id(*set, *female));
                    }
                }
                self.players.insert(*index, (player, *female));
                self.player_changed(*index);
            }
            Event::DespawnPlayer { index } => {
                self.graph.despawn_player(*index);
                self.players.remove(index);
                self.player_changed(*index);
            }
            Event::Equip { index, part, set } => {
                let Some((player, female)) = self.players.get(index).copied() else {
                    warn!(index, "harness_equip_unknown_player");
                    return;
                };
                self.graph
                    .equip(player.character, *part, SimCatalog::set_id(*set, female));
                self.player_changed(*index);
            }
            Event::SpawnNpc {
                index,
                female,
                prefab_path,
                species,
                distance_sq,
                armour,
            } => {
                let npc = self.graph.spawn_npc(
                    *index,
                    NpcSpawn {
                        female: *female,
                        prefab_path: prefab_path.clone(),
                        species: *species,
                    },
                    *distance_sq,
                );
                if let Some(primary) = self.catalog.npc_primary_transform_name(prefab_path) {
                    self.graph.attach(npc.transform, &primary);
                }
                if let Some(set) = armour {
                    let id = SimCatalog::set_id(*set, *female);
                    for part in ArmorPart::OUTFIT {
                        let name = self.catalog.prefab_name(id, part.piece(), *female);
                        self.graph.attach(npc.transform, &name);
                    }
                }
                self.npc_changed(*index);
            }
            Event::DespawnNpc { index } => {
                self.graph.despawn_npc(*index);
                self.npc_changed(*index);
            }
            Event::Settings { settings } => {
                info!("harness_settings_published");
                self.settings.publish(settings.clone());
            }
        }
    }

    fn player_changed(&self, index: usize) {
        if let Some(runtime) = self.service.runtime() {
            runtime.player_signals().entity_changed(index);
        }
    }

    fn npc_changed(&self, index: usize) {
        if let Some(runtime) = self.service.runtime() {
            runtime.npc_signals().entity_changed(index);
        }
    }
}
