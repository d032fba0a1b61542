// Per-signal readings taken from the live client.
//
// Every probe returns `None` when the player entity is absent so the tracker
// can skip the evaluation entirely.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::client::GameClient;
use crate::core::location::location_name;
use crate::core::model::{Payload, PlayerView, SignalId, Skill, WorldPoint, NO_ANIMATION};

/// Stat pushes arriving this soon after a (re)login are load-time noise.
pub const SKILL_START_DELAY: Duration = Duration::from_secs(5);

/// Current value of a passthrough signal.
pub fn current_value(id: SignalId, client: &dyn GameClient) -> Option<Payload> {
    let player = client.local_player()?;
    let payload = match id {
        SignalId::Health => gauge(client, Skill::Hitpoints),
        SignalId::Prayer => gauge(client, Skill::Prayer),
        SignalId::Energy => Payload::Gauge {
            current: client.energy() / 100,
            max: 100,
        },
        SignalId::Special => Payload::Gauge {
            current: client.special_attack() / 10,
            max: 100,
        },
        SignalId::World => Payload::World {
            world: client.world(),
        },
        SignalId::Location => Payload::Location {
            location: location_name(&player.position),
        },
        SignalId::Opponent | SignalId::Skill | SignalId::Idle => return None,
    };
    Some(payload)
}

fn gauge(client: &dyn GameClient, skill: Skill) -> Payload {
    Payload::Gauge {
        current: client.boosted_level(skill),
        max: client.real_level(skill),
    }
}

/// Stat whose change notices refresh a passthrough gauge.
pub fn gauge_skill(id: SignalId) -> Option<Skill> {
    match id {
        SignalId::Health => Some(Skill::Hitpoints),
        SignalId::Prayer => Some(Skill::Prayer),
        _ => None,
    }
}

/// Name of the current combat target. The outer `None` means no player.
pub fn interacting_target(client: &dyn GameClient) -> Option<Option<String>> {
    let player = client.local_player()?;
    Some(player.interacting.clone())
}

/// Experience baseline used to decide which skill is being trained.
#[derive(Debug, Clone)]
pub struct SkillBaseline {
    baseline: HashMap<Skill, i32>,
    snapshot_taken: bool,
    allow_from: Instant,
}

impl SkillBaseline {
    pub fn new(now: Instant) -> Self {
        Self {
            baseline: HashMap::new(),
            snapshot_taken: false,
            allow_from: now + SKILL_START_DELAY,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.baseline.clear();
        self.snapshot_taken = false;
        self.allow_from = now + SKILL_START_DELAY;
    }

    /// Returns the skill when `xp` rose above its stored baseline.
    pub fn observe(
        &mut self,
        client: &dyn GameClient,
        skill: Skill,
        xp: i32,
        now: Instant,
    ) -> Option<Skill> {
        if now < self.allow_from || skill == Skill::Hitpoints {
            return None;
        }

        if !self.snapshot_taken {
            for tracked in Skill::all() {
                self.baseline
                    .insert(*tracked, client.skill_experience(*tracked));
            }
            self.snapshot_taken = true;
        }

        let previous = self.baseline.get(&skill).copied().unwrap_or(xp);
        if xp <= previous {
            return None;
        }
        self.baseline.insert(skill, xp);
        Some(skill)
    }

    pub fn is_empty(&self) -> bool {
        self.baseline.is_empty()
    }
}

/// Detects movement between consecutive samples.
#[derive(Debug, Clone, Default)]
pub struct MotionProbe {
    last_position: Option<WorldPoint>,
}

impl MotionProbe {
    /// Animating, or moved since the previous sample.
    pub fn sample(&mut self, player: &PlayerView) -> bool {
        let animating = player.animation != NO_ANIMATION;
        let moved = self
            .last_position
            .is_some_and(|last| last != player.position);
        self.last_position = Some(player.position);
        animating || moved
    }

    pub fn reset(&mut self) {
        self.last_position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::{ClientSnapshot, SkillLevels, SnapshotClient};
    use crate::core::model::GameState;

    fn client_with_player() -> SnapshotClient {
        let mut client = SnapshotClient::new(ClientSnapshot {
            game_state: GameState::LoggedIn,
            player: Some(PlayerView {
                name: "Zezima".to_string(),
                interacting: Some("Goblin".to_string()),
                animation: NO_ANIMATION,
                position: WorldPoint::new(3222, 3218, 0),
            }),
            world: 302,
            energy: 8734,
            special_attack: 550,
            ..ClientSnapshot::default()
        });
        client.record_stat(Skill::Hitpoints, 1_154, Some(8), Some(10));
        client
    }

    #[test]
    fn test_current_values() {
        let client = client_with_player();
        assert_eq!(
            current_value(SignalId::Health, &client),
            Some(Payload::Gauge { current: 8, max: 10 })
        );
        assert_eq!(
            current_value(SignalId::Energy, &client),
            Some(Payload::Gauge { current: 87, max: 100 })
        );
        assert_eq!(
            current_value(SignalId::Special, &client),
            Some(Payload::Gauge { current: 55, max: 100 })
        );
        assert_eq!(
            current_value(SignalId::World, &client),
            Some(Payload::World { world: 302 })
        );
        assert_eq!(
            current_value(SignalId::Location, &client),
            Some(Payload::Location {
                location: "Lumbridge".to_string()
            })
        );
        assert_eq!(current_value(SignalId::Opponent, &client), None);
    }

    #[test]
    fn test_missing_player_reads_nothing() {
        let mut client = client_with_player();
        client.set_player(None);
        assert_eq!(current_value(SignalId::World, &client), None);
        assert_eq!(interacting_target(&client), None);
    }

    #[test]
    fn test_baseline_waits_for_start_delay() {
        let client = client_with_player();
        let base = Instant::now();
        let mut baseline = SkillBaseline::new(base);

        assert_eq!(baseline.observe(&client, Skill::Mining, 500, base), None);
        assert!(baseline.is_empty(), "no snapshot before the delay elapses");

        let later = base + SKILL_START_DELAY;
        assert_eq!(baseline.observe(&client, Skill::Mining, 500, later), Some(Skill::Mining));
        assert_eq!(baseline.observe(&client, Skill::Mining, 500, later), None);
        assert_eq!(baseline.observe(&client, Skill::Mining, 540, later), Some(Skill::Mining));
    }

    #[test]
    fn test_baseline_ignores_hitpoints_and_non_increase() {
        let mut client = client_with_player();
        client
            .snapshot_mut()
            .skills
            .insert(Skill::Attack, SkillLevels { boosted: 60, real: 60, xp: 300_000 });
        let base = Instant::now();
        let later = base + SKILL_START_DELAY;
        let mut baseline = SkillBaseline::new(base);

        assert_eq!(baseline.observe(&client, Skill::Hitpoints, 9_999, later), None);
        assert_eq!(baseline.observe(&client, Skill::Attack, 300_000, later), None);
        assert_eq!(baseline.observe(&client, Skill::Attack, 300_040, later), Some(Skill::Attack));

        baseline.reset(later);
        assert!(baseline.is_empty());
        assert_eq!(baseline.observe(&client, Skill::Attack, 300_080, later), None);
    }

    #[test]
    fn test_motion_probe() {
        let client = client_with_player();
        let mut player = client.local_player().cloned().unwrap();
        let mut motion = MotionProbe::default();

        assert!(!motion.sample(&player), "first sample has nothing to compare");
        assert!(!motion.sample(&player));

        player.position = WorldPoint::new(3223, 3218, 0);
        assert!(motion.sample(&player));

        player.animation = 625;
        assert!(motion.sample(&player));
    }
}
