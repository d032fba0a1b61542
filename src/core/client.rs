//! Live view of the game client.
//!
//! Trackers never cache client state themselves; they read it through
//! [`GameClient`] each time a trigger arrives. The bridge process keeps the
//! latest snapshot pushed over the host feed in a [`SnapshotClient`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::model::{GameState, PlayerView, Skill};

pub trait GameClient {
    fn game_state(&self) -> GameState;
    fn local_player(&self) -> Option<&PlayerView>;
    fn boosted_level(&self, skill: Skill) -> i32;
    fn real_level(&self, skill: Skill) -> i32;
    fn skill_experience(&self, skill: Skill) -> i32;
    /// Run energy, 0-10000
    fn energy(&self) -> i32;
    fn world(&self) -> i32;
    /// Special attack energy, 0-1000
    fn special_attack(&self) -> i32;
}

/// Logged in with a player entity present.
pub fn is_online(client: &dyn GameClient) -> bool {
    client.game_state() == GameState::LoggedIn && client.local_player().is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillLevels {
    pub boosted: i32,
    pub real: i32,
    pub xp: i32,
}

/// Full live state as pushed by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    #[serde(default)]
    pub game_state: GameState,
    #[serde(default)]
    pub player: Option<PlayerView>,
    #[serde(default)]
    pub world: i32,
    #[serde(default)]
    pub energy: i32,
    #[serde(default)]
    pub special_attack: i32,
    #[serde(default)]
    pub skills: HashMap<Skill, SkillLevels>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotClient {
    snapshot: ClientSnapshot,
}

impl SnapshotClient {
    pub fn new(snapshot: ClientSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn apply(&mut self, snapshot: ClientSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn set_game_state(&mut self, state: GameState) {
        self.snapshot.game_state = state;
    }

    pub fn set_player(&mut self, player: Option<PlayerView>) {
        self.snapshot.player = player;
    }

    /// Folds a stat-change notice into the snapshot so later reads agree with it.
    pub fn record_stat(&mut self, skill: Skill, xp: i32, boosted: Option<i32>, real: Option<i32>) {
        let levels = self.snapshot.skills.entry(skill).or_default();
        levels.xp = xp;
        if let Some(boosted) = boosted {
            levels.boosted = boosted;
        }
        if let Some(real) = real {
            levels.real = real;
        }
    }

    pub fn snapshot(&self) -> &ClientSnapshot {
        &self.snapshot
    }

    pub fn snapshot_mut(&mut self) -> &mut ClientSnapshot {
        &mut self.snapshot
    }

    fn levels(&self, skill: Skill) -> SkillLevels {
        self.snapshot.skills.get(&skill).copied().unwrap_or_default()
    }
}

impl GameClient for SnapshotClient {
    fn game_state(&self) -> GameState {
        self.snapshot.game_state
    }

    fn local_player(&self) -> Option<&PlayerView> {
        self.snapshot.player.as_ref()
    }

    fn boosted_level(&self, skill: Skill) -> i32 {
        self.levels(skill).boosted
    }

    fn real_level(&self, skill: Skill) -> i32 {
        self.levels(skill).real
    }

    fn skill_experience(&self, skill: Skill) -> i32 {
        self.levels(skill).xp
    }

    fn energy(&self) -> i32 {
        self.snapshot.energy
    }

    fn world(&self) -> i32 {
        self.snapshot.world
    }

    fn special_attack(&self) -> i32 {
        self.snapshot.special_attack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::WorldPoint;

    fn player() -> PlayerView {
        PlayerView {
            name: "Zezima".to_string(),
            interacting: None,
            animation: -1,
            position: WorldPoint::new(3222, 3218, 0),
        }
    }

    #[test]
    fn test_online_requires_player_and_login() {
        let mut client = SnapshotClient::default();
        assert!(!is_online(&client));

        client.set_game_state(GameState::LoggedIn);
        assert!(!is_online(&client), "no player entity yet");

        client.set_player(Some(player()));
        assert!(is_online(&client));

        client.set_game_state(GameState::Hopping);
        assert!(!is_online(&client));
    }

    #[test]
    fn test_snapshot_parses_with_defaults() {
        let json = r#"{
            "game_state": "LOGGED_IN",
            "player": {"name": "Zezima", "position": {"x": 3222, "y": 3218}},
            "skills": {"ATTACK": {"boosted": 99, "real": 99, "xp": 13034431}}
        }"#;
        let snapshot: ClientSnapshot = serde_json::from_str(json).unwrap();
        let client = SnapshotClient::new(snapshot);

        assert!(is_online(&client));
        assert_eq!(client.local_player().unwrap().animation, -1);
        assert_eq!(client.skill_experience(Skill::Attack), 13_034_431);
        assert_eq!(client.skill_experience(Skill::Mining), 0);
        assert_eq!(client.energy(), 0);
    }

    #[test]
    fn test_record_stat_keeps_unreported_levels() {
        let mut client = SnapshotClient::default();
        client.record_stat(Skill::Prayer, 1000, Some(40), Some(43));
        client.record_stat(Skill::Prayer, 1200, None, None);

        assert_eq!(client.skill_experience(Skill::Prayer), 1200);
        assert_eq!(client.boosted_level(Skill::Prayer), 40);
        assert_eq!(client.real_level(Skill::Prayer), 43);
    }
}
