use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::applier::ApplierFactory;
use crate::armour::ArmourCatalog;
use crate::npc::{NpcBasic, NpcDiscovery, NpcHost};
use crate::pipeline::SetupError;
use crate::player::{PlayerBasic, PlayerDiscovery, PlayerHost};
use crate::preset::PresetSource;
use crate::settings::SettingsHandle;
use crate::situation::SituationFlags;
use crate::stats::{FrameCounters, StatsHandle, TrackerStats};
use crate::tracker::{Tracker, TrackerSignals};

const INIT_THREAD_NAME: &str = "tracker-init";

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("failed to spawn tracker-init thread")]
    Spawn(#[source] std::io::Error),
    #[error("tracker-init thread exited without a result")]
    Aborted,
}

/// Collaborators shared by both trackers.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn ArmourCatalog>,
    pub presets: Arc<dyn PresetSource>,
    pub appliers: Arc<dyn ApplierFactory>,
    pub settings: SettingsHandle,
}

/// Player and NPC trackers driven together, once per host frame.
pub struct Runtime<H: PlayerHost + NpcHost + 'static> {
    players: Tracker<PlayerDiscovery<H>>,
    npcs: Tracker<NpcDiscovery<H>>,
    stats: TrackerStats,
    stats_handle: StatsHandle,
}

impl<H: PlayerHost + NpcHost + 'static> Runtime<H> {
    pub fn new(host: Arc<H>, services: Services) -> Result<Self, SetupError> {
        let players = Tracker::new(
            PlayerDiscovery::new(Arc::clone(&host), Arc::clone(&services.catalog)),
            Arc::clone(&services.presets),
            Arc::clone(&services.appliers),
            services.settings.clone(),
        )?;
        let npcs = Tracker::new(
            NpcDiscovery::new(host, services.catalog),
            services.presets,
            services.appliers,
            services.settings,
        )?;

        Ok(Self {
            players,
            npcs,
            stats: TrackerStats::default(),
            stats_handle: StatsHandle::default(),
        })
    }

    /// Fetch phase for both trackers, then the apply phase for both.
    pub fn frame(&mut self, flags: &SituationFlags, now: Instant) -> FrameCounters {
        let fetch_started = Instant::now();
        let player_frame = self.players.frame(flags, now);
        let npc_frame = self.npcs.frame(flags, now);
        let fetch = fetch_started.elapsed();

        let apply_started = Instant::now();
        let player_apply = self.players.apply_all(now);
        let npc_apply = self.npcs.apply_all(now);
        let apply = apply_started.elapsed();

        let mut counters = FrameCounters::default();
        counters.absorb(&player_frame, &player_apply);
        counters.absorb(&npc_frame, &npc_apply);
        self.stats.record_frame(fetch, apply, counters);
        self.stats_handle.publish(self.stats.snapshot());
        counters
    }

    pub fn players(&self) -> &Tracker<PlayerDiscovery<H>> {
        &self.players
    }

    pub fn npcs(&self) -> &Tracker<NpcDiscovery<H>> {
        &self.npcs
    }

    pub fn player_signals(&self) -> TrackerSignals<PlayerBasic> {
        self.players.signals()
    }

    pub fn npc_signals(&self) -> TrackerSignals<NpcBasic> {
        self.npcs.signals()
    }

    pub fn stats(&self) -> StatsHandle {
        self.stats_handle.clone()
    }
}

/// Builds a [`Runtime`] on a worker thread so host startup is not blocked on
/// list discovery.
pub struct DeferredInit<H: PlayerHost + NpcHost + 'static> {
    rx: mpsc::Receiver<Result<Runtime<H>, SetupError>>,
}

impl<H: PlayerHost + NpcHost + 'static> DeferredInit<H> {
    pub fn start(host: Arc<H>, services: Services) -> Result<Self, InitError> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(INIT_THREAD_NAME.to_owned())
            .spawn(move || {
                let result = Runtime::new(host, services);
                if tx.send(result).is_err() {
                    debug!("tracker_init_result_dropped");
                }
            })
            .map_err(InitError::Spawn)?;
        Ok(Self { rx })
    }

    /// `None` while the worker is still running.
    pub fn poll(&self) -> Option<Result<Runtime<H>, InitError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result.map_err(InitError::from)),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(InitError::Aborted)),
        }
    }
}

enum ServiceState<H: PlayerHost + NpcHost + 'static> {
    Initializing(DeferredInit<H>),
    Running(Box<Runtime<H>>),
    Disabled,
}

/// Host-facing entry point: a no-op until initialization finishes, and for
/// good once initialization fails or a frame panics.
pub struct TrackerService<H: PlayerHost + NpcHost + 'static> {
    state: ServiceState<H>,
}

impl<H: PlayerHost + NpcHost + 'static> TrackerService<H> {
    pub fn start(host: Arc<H>, services: Services) -> Self {
        let state = match DeferredInit::start(host, services) {
            Ok(init) => ServiceState::Initializing(init),
            Err(err) => {
                error!(error = %err, "tracker_init_failed");
                ServiceState::Disabled
            }
        };
        Self { state }
    }

    pub fn frame(&mut self, flags: &SituationFlags, now: Instant) -> Option<FrameCounters> {
        if let ServiceState::Initializing(init) = &self.state {
            match init.poll()? {
                Ok(runtime) => {
                    info!("tracker_runtime_ready");
                    self.state = ServiceState::Running(Box::new(runtime));
                }
                Err(err) => {
                    error!(error = %err, "tracker_init_failed");
                    self.state = ServiceState::Disabled;
                }
            }
        }

        let ServiceState::Running(runtime) = &mut self.state else {
            return None;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| runtime.frame(flags, now))) {
            Ok(counters) => Some(counters),
            Err(_) => {
                error!("tracker_frame_panicked; tracking disabled");
                self.state = ServiceState::Disabled;
                None
            }
        }
    }

    pub fn runtime(&self) -> Option<&Runtime<H>> {
        match &self.state {
            ServiceState::Running(runtime) => Some(runtime.as_ref()),
            _ => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.state, ServiceState::Disabled)
    }

    /// Stops tracking without waiting for a pending initialization.
    pub fn shutdown(&mut self) {
        if !self.is_disabled() {
            warn!("tracker_service_shutdown");
        }
        self.state = ServiceState::Disabled;
    }
}
