use std::fmt;

use serde::{Deserialize, Serialize};

/// Mutually exclusive host modes that invalidate every captured handle when
/// entered or left. `None` (no special situation) is normal gameplay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Situation {
    MainMenu,
    SaveSelect,
    CharacterCreator,
    GuildCard,
    Cutscene,
}

impl Situation {
    pub fn is_menu(self) -> bool {
        matches!(
            self,
            Situation::MainMenu
                | Situation::SaveSelect
                | Situation::CharacterCreator
                | Situation::GuildCard
        )
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Situation::MainMenu => "main_menu",
            Situation::SaveSelect => "save_select",
            Situation::CharacterCreator => "character_creator",
            Situation::GuildCard => "guild_card",
            Situation::Cutscene => "cutscene",
        })
    }
}

/// Raw per-frame flags from the situation collaborator. Several may be set at
/// once; [`SituationFlags::special`] picks the one that wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SituationFlags {
    pub main_menu: bool,
    pub save_select: bool,
    pub character_creator: bool,
    pub guild_card: bool,
    pub cutscene: bool,
    pub in_quest: bool,
    pub online: bool,
}

impl SituationFlags {
    pub fn special(&self) -> Option<Situation> {
        if self.main_menu {
            Some(Situation::MainMenu)
        } else if self.save_select {
            Some(Situation::SaveSelect)
        } else if self.character_creator {
            Some(Situation::CharacterCreator)
        } else if self.guild_card {
            Some(Situation::GuildCard)
        } else if self.cutscene {
            Some(Situation::Cutscene)
        } else {
            None
        }
    }

    pub fn is_set(&self, situation: Situation) -> bool {
        match situation {
            Situation::MainMenu => self.main_menu,
            Situation::SaveSelect => self.save_select,
            Situation::CharacterCreator => self.character_creator,
            Situation::GuildCard => self.guild_card,
            Situation::Cutscene => self.cutscene,
        }
    }

    pub fn with(mut self, situation: Situation, value: bool) -> Self {
        match situation {
            Situation::MainMenu => self.main_menu = value,
            Situation::SaveSelect => self.save_select = value,
            Situation::CharacterCreator => self.character_creator = value,
            Situation::GuildCard => self.guild_card = value,
            Situation::Cutscene => self.cutscene = value,
        }
        self
    }
}

/// What the tracker must do this frame in response to situation changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub situation: Option<Situation>,
    /// Wipe every slot, cooldown and retry counter.
    pub reset: bool,
    /// Rescan every slot once, ignoring cached basic info.
    pub refetch_all: bool,
}

/// Compares each frame's situation with the last one.
#[derive(Debug)]
pub struct SituationWatcher {
    last: Option<Situation>,
    refetch_edges: &'static [Situation],
    edge_state: Vec<bool>,
}

impl SituationWatcher {
    /// `refetch_edges` lists raw flags whose rising or falling edge forces a
    /// one-shot full refetch, independent of the reset.
    pub fn new(refetch_edges: &'static [Situation]) -> Self {
        Self {
            last: None,
            refetch_edges,
            edge_state: vec![false; refetch_edges.len()],
        }
    }

    pub fn observe(&mut self, flags: &SituationFlags) -> Transition {
        let mut refetch_all = false;
        for (situation, was_set) in self.refetch_edges.iter().zip(self.edge_state.iter_mut()) {
            let set = flags.is_set(*situation);
            refetch_all |= set != *was_set;
            *was_set = set;
        }

        let situation = flags.special();
        let reset = situation != self.last;
        self.last = situation;

        Transition {
            situation,
            reset,
            refetch_all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_picks_main_menu_first() {
        let flags = SituationFlags::default()
            .with(Situation::Cutscene, true)
            .with(Situation::GuildCard, true)
            .with(Situation::MainMenu, true);
        assert_eq!(flags.special(), Some(Situation::MainMenu));

        let flags = SituationFlags::default()
            .with(Situation::Cutscene, true)
            .with(Situation::GuildCard, true);
        assert_eq!(flags.special(), Some(Situation::GuildCard));
        assert_eq!(SituationFlags::default().special(), None);
    }

    #[test]
    fn first_gameplay_frame_does_not_reset() {
        let mut watcher = SituationWatcher::new(&[Situation::Cutscene]);
        let transition = watcher.observe(&SituationFlags::default());
        assert!(!transition.reset);
        assert!(!transition.refetch_all);
    }

    #[test]
    fn context_change_resets_exactly_once() {
        let mut watcher = SituationWatcher::new(&[]);
        let menu = SituationFlags::default().with(Situation::MainMenu, true);

        assert!(watcher.observe(&menu).reset);
        assert!(!watcher.observe(&menu).reset);
        assert!(watcher.observe(&SituationFlags::default()).reset);
        assert!(!watcher.observe(&SituationFlags::default()).reset);
    }

    #[test]
    fn cutscene_edges_force_refetch_both_ways() {
        let mut watcher = SituationWatcher::new(&[Situation::Cutscene]);
        let cutscene = SituationFlags::default().with(Situation::Cutscene, true);

        let entering = watcher.observe(&cutscene);
        assert!(entering.refetch_all);
        assert!(entering.reset);
        assert!(!watcher.observe(&cutscene).refetch_all);

        let leaving = watcher.observe(&SituationFlags::default());
        assert!(leaving.refetch_all);
        assert!(leaving.reset);
    }

    #[test]
    fn edge_is_tracked_even_when_outranked() {
        let mut watcher = SituationWatcher::new(&[Situation::Cutscene]);
        let menu = SituationFlags::default().with(Situation::MainMenu, true);
        watcher.observe(&menu);

        let transition = watcher.observe(&menu.with(Situation::Cutscene, true));
        assert_eq!(transition.situation, Some(Situation::MainMenu));
        assert!(!transition.reset);
        assert!(transition.refetch_all);
    }

    #[test]
    fn untracked_edges_are_ignored() {
        let mut watcher = SituationWatcher::new(&[Situation::Cutscene]);
        watcher.observe(&SituationFlags::default());
        let quest = SituationFlags {
            in_quest: true,
            ..SituationFlags::default()
        };
        let transition = watcher.observe(&quest);
        assert!(!transition.reset);
        assert!(!transition.refetch_all);
    }
}
