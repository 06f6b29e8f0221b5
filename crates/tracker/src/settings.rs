use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_RETRY_CEILING: u32 = 100;

static SETTINGS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_settings_lock_poison_once(operation: &'static str) {
    if SETTINGS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "settings lock poisoned; recovered inner value");
    }
}

/// Tuning knobs read by both trackers every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Camera distance beyond which entities are ignored. `<= 0` is unbounded.
    pub application_range: f32,
    /// Closest-N cap per apply pass. `<= 0` applies to everyone visible.
    pub max_concurrent_applications: i32,
    pub max_bone_fetches_per_frame: u32,
    /// Seconds to wait after a rebuild before applying.
    pub delay_on_equip: f32,
    pub enable_during_quests_only: bool,
    pub enable_hide_weapons: bool,
    pub hide_weapons_outside_of_combat_only: bool,
    pub force_show_weapon_in_tent: bool,
    pub force_show_weapon_when_on_seikret: bool,
    pub force_show_weapon_when_sharpening: bool,
    pub enable_hide_kinsect: bool,
    pub hide_slinger_outside_of_combat_only: bool,
    pub retry_ceiling: u32,
    /// Seconds between full slot rescans in normal gameplay. `<= 0` disables.
    pub full_rescan_interval: f32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            application_range: 0.0,
            max_concurrent_applications: 0,
            max_bone_fetches_per_frame: 1,
            delay_on_equip: 0.1,
            enable_during_quests_only: false,
            enable_hide_weapons: true,
            hide_weapons_outside_of_combat_only: true,
            force_show_weapon_in_tent: false,
            force_show_weapon_when_on_seikret: false,
            force_show_weapon_when_sharpening: true,
            enable_hide_kinsect: true,
            hide_slinger_outside_of_combat_only: false,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            full_rescan_interval: 5.0,
        }
    }
}

impl TrackerSettings {
    pub fn equip_delay(&self) -> Duration {
        seconds(self.delay_on_equip)
    }

    pub fn rescan_interval(&self) -> Option<Duration> {
        (self.full_rescan_interval > 0.0).then(|| seconds(self.full_rescan_interval))
    }

    /// Squared application radius, `None` when unbounded.
    pub fn range_sq(&self) -> Option<f64> {
        (self.application_range > 0.0).then(|| {
            let range = f64::from(self.application_range);
            range * range
        })
    }
}

fn seconds(value: f32) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f32(value)
    } else {
        Duration::ZERO
    }
}

/// Shared view of the settings owned by the host's configuration layer.
///
/// The tracker only ever calls [`SettingsHandle::snapshot`]; the owner calls
/// [`SettingsHandle::publish`] whenever the user changes something.
#[derive(Clone, Debug, Default)]
pub struct SettingsHandle {
    current: Arc<RwLock<TrackerSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            current: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> TrackerSettings {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn_settings_lock_poison_once("read");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn publish(&self, settings: TrackerSettings) {
        match self.current.write() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => {
                warn_settings_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = settings;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<TrackerSettings>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison settings lock");
                })
                .join();
        });
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: TrackerSettings =
            serde_json::from_str(r#"{ "retry_ceiling": 3, "application_range": 25.0 }"#)
                .expect("parse settings");

        assert_eq!(settings.retry_ceiling, 3);
        assert_eq!(settings.application_range, 25.0);
        assert_eq!(
            settings.max_bone_fetches_per_frame,
            TrackerSettings::default().max_bone_fetches_per_frame
        );
    }

    #[test]
    fn non_positive_range_is_unbounded() {
        let mut settings = TrackerSettings::default();
        settings.application_range = 0.0;
        assert_eq!(settings.range_sq(), None);
        settings.application_range = -3.0;
        assert_eq!(settings.range_sq(), None);
        settings.application_range = 4.0;
        assert_eq!(settings.range_sq(), Some(16.0));
    }

    #[test]
    fn equip_delay_converts_seconds() {
        let settings = TrackerSettings {
            delay_on_equip: 2.0,
            ..TrackerSettings::default()
        };
        assert_eq!(settings.equip_delay(), Duration::from_secs(2));

        let settings = TrackerSettings {
            delay_on_equip: f32::NAN,
            ..TrackerSettings::default()
        };
        assert_eq!(settings.equip_delay(), Duration::ZERO);
    }

    #[test]
    fn rescan_can_be_disabled() {
        let settings = TrackerSettings {
            full_rescan_interval: 0.0,
            ..TrackerSettings::default()
        };
        assert_eq!(settings.rescan_interval(), None);
    }

    #[test]
    fn publish_is_visible_to_clones() {
        let handle = SettingsHandle::default();
        let reader = handle.clone();
        handle.publish(TrackerSettings {
            retry_ceiling: 7,
            ..TrackerSettings::default()
        });
        assert_eq!(reader.snapshot().retry_ceiling, 7);
    }

    #[test]
    fn snapshot_recovers_after_poison_without_panic() {
        let handle = SettingsHandle::default();
        poison_lock(handle.current.as_ref());

        assert_eq!(handle.snapshot(), TrackerSettings::default());
        handle.publish(TrackerSettings {
            enable_hide_weapons: false,
            ..TrackerSettings::default()
        });
        assert!(!handle.snapshot().enable_hide_weapons);
    }
}
