use crate::discovery::PropHides;
use crate::settings::TrackerSettings;
use crate::visibility::Behaviour;

/// Item ids the host reports while a whetstone is in use.
pub const SHARPENING_ITEM_IDS: [u32; 3] = [20, 270, 683];

pub(crate) fn is_sharpening(used_item_id: Option<u32>) -> bool {
    used_item_id.is_some_and(|id| SHARPENING_ITEM_IDS.contains(&id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropVisibility {
    pub weapon: bool,
    pub kinsect: bool,
    pub slinger: bool,
}

/// Derives draw flags for weapon, kinsect and slinger from the accumulated
/// preset hides and the hunter's current behaviour.
pub fn weapon_visibility(
    hides: PropHides,
    behaviour: &Behaviour,
    settings: &TrackerSettings,
) -> PropVisibility {
    let weapon = behaviour.weapon_drawn
        || !hides.weapon
        || (behaviour.in_combat && settings.hide_weapons_outside_of_combat_only)
        || (behaviour.in_tent && settings.force_show_weapon_in_tent)
        || (behaviour.riding && settings.force_show_weapon_when_on_seikret)
        || (behaviour.sharpening && settings.force_show_weapon_when_sharpening);
    let kinsect = !settings.enable_hide_kinsect || weapon;
    let slinger = !hides.slinger
        || (behaviour.in_combat && settings.hide_slinger_outside_of_combat_only);

    PropVisibility {
        weapon,
        kinsect,
        slinger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hide_all() -> PropHides {
        PropHides {
            weapon: true,
            slinger: true,
        }
    }

    #[test]
    fn nothing_hidden_without_preset_request() {
        let visibility = weapon_visibility(
            PropHides::default(),
            &Behaviour::default(),
            &TrackerSettings::default(),
        );
        assert!(visibility.weapon && visibility.kinsect && visibility.slinger);
    }

    #[test]
    fn sheathed_weapon_hides_outside_combat() {
        let settings = TrackerSettings::default();
        let idle = weapon_visibility(hide_all(), &Behaviour::default(), &settings);
        assert!(!idle.weapon);
        assert!(!idle.kinsect);
        assert!(!idle.slinger);

        let fighting = Behaviour {
            in_combat: true,
            ..Behaviour::default()
        };
        assert!(weapon_visibility(hide_all(), &fighting, &settings).weapon);
    }

    #[test]
    fn combat_only_off_hides_in_combat_too() {
        let settings = TrackerSettings {
            hide_weapons_outside_of_combat_only: false,
            ..TrackerSettings::default()
        };
        let fighting = Behaviour {
            in_combat: true,
            ..Behaviour::default()
        };
        assert!(!weapon_visibility(hide_all(), &fighting, &settings).weapon);

        let drawn = Behaviour {
            weapon_drawn: true,
            ..Behaviour::default()
        };
        assert!(weapon_visibility(hide_all(), &drawn, &settings).weapon);
    }

    #[test]
    fn overrides_force_weapon_visible() {
        let settings = TrackerSettings {
            force_show_weapon_in_tent: true,
            force_show_weapon_when_on_seikret: true,
            ..TrackerSettings::default()
        };
        for behaviour in [
            Behaviour {
                in_tent: true,
                ..Behaviour::default()
            },
            Behaviour {
                riding: true,
                ..Behaviour::default()
            },
            Behaviour {
                sharpening: true,
                ..Behaviour::default()
            },
        ] {
            assert!(weapon_visibility(hide_all(), &behaviour, &settings).weapon);
        }
    }

    #[test]
    fn kinsect_follows_weapon_unless_hiding_disabled() {
        let settings = TrackerSettings {
            enable_hide_kinsect: false,
            ..TrackerSettings::default()
        };
        let visibility = weapon_visibility(hide_all(), &Behaviour::default(), &settings);
        assert!(!visibility.weapon);
        assert!(visibility.kinsect);
    }

    #[test]
    fn slinger_combat_exception() {
        let settings = TrackerSettings {
            hide_slinger_outside_of_combat_only: true,
            ..TrackerSettings::default()
        };
        let fighting = Behaviour {
            in_combat: true,
            ..Behaviour::default()
        };
        assert!(weapon_visibility(hide_all(), &fighting, &settings).slinger);
        assert!(!weapon_visibility(hide_all(), &Behaviour::default(), &settings).slinger);
    }

    #[test]
    fn whetstone_items_count_as_sharpening() {
        assert!(is_sharpening(Some(270)));
        assert!(!is_sharpening(Some(21)));
        assert!(!is_sharpening(None));
    }
}
