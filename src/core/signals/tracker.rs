// One tracker per signal: enable flag, emission policy and whatever probe
// state the signal needs. The registry feeds it triggers; it answers with the
// payloads that must be posted.

use std::time::Instant;

use super::policy::{
    BinaryDebounce, IdentityChange, IdentityDebounce, OPPONENT_IDLE_TIMEOUT, SKILL_IDLE_TIMEOUT,
};
use super::probes::{self, MotionProbe, SkillBaseline};
use crate::core::client::GameClient;
use crate::core::model::{IdleState, Payload, SignalId, Skill, DISABLED_SENTINEL, NONE_SENTINEL};

/// Everything a tracker may look at while evaluating one trigger.
pub struct TriggerContext<'a> {
    pub client: &'a dyn GameClient,
    /// Computed once per trigger by the registry
    pub online: bool,
    pub now: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Process start
    Startup,
    /// Per-tick pulse
    Tick,
    /// Any login-state transition
    LoginStateChanged,
    Spawned,
    StatChanged { skill: Skill, xp: i32 },
    Heartbeat,
    Toggle { enabled: bool },
}

/// Broadcast trigger classes a tracker can subscribe to. Toggles are routed
/// by key and are not a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerClass {
    Startup,
    Tick,
    LoginState,
    Spawn,
    StatChange,
    Heartbeat,
}

impl Trigger {
    pub fn class(&self) -> Option<TriggerClass> {
        match self {
            Self::Startup => Some(TriggerClass::Startup),
            Self::Tick => Some(TriggerClass::Tick),
            Self::LoginStateChanged => Some(TriggerClass::LoginState),
            Self::Spawned => Some(TriggerClass::Spawn),
            Self::StatChanged { .. } => Some(TriggerClass::StatChange),
            Self::Heartbeat => Some(TriggerClass::Heartbeat),
            Self::Toggle { .. } => None,
        }
    }
}

/// Which broadcast triggers each signal listens to.
pub fn subscriptions(id: SignalId) -> &'static [TriggerClass] {
    use TriggerClass::*;
    match id {
        SignalId::Health | SignalId::Prayer => {
            &[Startup, LoginState, Spawn, StatChange, Heartbeat]
        }
        SignalId::World => &[Startup, LoginState, Spawn, Heartbeat],
        SignalId::Energy | SignalId::Special | SignalId::Location | SignalId::Opponent => {
            &[Startup, Tick, LoginState, Spawn, Heartbeat]
        }
        SignalId::Skill => &[Startup, Tick, LoginState, Spawn, StatChange],
        SignalId::Idle => &[Startup, Tick, LoginState],
    }
}

#[derive(Debug, Clone)]
pub enum Policy {
    /// Re-read and post on every relevant trigger
    Passthrough,
    IdentityDebounce(IdentityDebounce),
    BinaryDebounce(BinaryDebounce),
}

impl Policy {
    pub fn is_debounced(&self) -> bool {
        !matches!(self, Self::Passthrough)
    }
}

#[derive(Debug, Clone)]
enum Probe {
    Value,
    Target,
    Training(SkillBaseline),
    Motion(MotionProbe),
}

#[derive(Debug, Clone)]
pub struct SignalTracker {
    id: SignalId,
    enabled: bool,
    policy: Policy,
    probe: Probe,
}

impl SignalTracker {
    /// Builds the tracker with the policy this signal is specified to use.
    pub fn for_signal(id: SignalId, enabled: bool, idle_threshold_secs: u64, now: Instant) -> Self {
        let (policy, probe) = match id {
            SignalId::Health
            | SignalId::Prayer
            | SignalId::Energy
            | SignalId::Special
            | SignalId::World
            | SignalId::Location => (Policy::Passthrough, Probe::Value),
            SignalId::Opponent => (
                Policy::IdentityDebounce(IdentityDebounce::new(OPPONENT_IDLE_TIMEOUT)),
                Probe::Target,
            ),
            SignalId::Skill => (
                Policy::IdentityDebounce(IdentityDebounce::new(SKILL_IDLE_TIMEOUT)),
                Probe::Training(SkillBaseline::new(now)),
            ),
            SignalId::Idle => (
                Policy::BinaryDebounce(BinaryDebounce::new(idle_threshold_secs)),
                Probe::Motion(MotionProbe::default()),
            ),
        };
        Self {
            id,
            enabled,
            policy,
            probe,
        }
    }

    pub fn id(&self) -> SignalId {
        self.id
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn listens_to(&self, class: TriggerClass) -> bool {
        subscriptions(self.id).contains(&class)
    }

    /// Name currently remembered by an identity-debounced signal.
    pub fn remembered(&self) -> Option<&str> {
        match &self.policy {
            Policy::IdentityDebounce(policy) => policy.remembered(),
            _ => None,
        }
    }

    /// True when the skill baseline holds no snapshot.
    pub fn baseline_is_empty(&self) -> bool {
        match &self.probe {
            Probe::Training(baseline) => baseline.is_empty(),
            _ => true,
        }
    }

    pub fn idle_state(&self) -> Option<IdleState> {
        match &self.policy {
            Policy::BinaryDebounce(policy) => Some(policy.state()),
            _ => None,
        }
    }

    pub fn set_idle_threshold(&mut self, secs: u64) {
        if let Policy::BinaryDebounce(policy) = &mut self.policy {
            policy.set_threshold(secs);
        }
    }

    pub fn handle(&mut self, trigger: Trigger, ctx: &TriggerContext) -> Vec<Payload> {
        match trigger {
            Trigger::Toggle { enabled } => self.on_toggle(enabled, ctx),
            Trigger::Startup | Trigger::LoginStateChanged => self.on_login(ctx),
            Trigger::Spawned => self.on_spawn(ctx),
            Trigger::Tick => self.on_tick(ctx),
            Trigger::StatChanged { skill, xp } => self.on_attribute_event(skill, xp, ctx),
            Trigger::Heartbeat => self.on_heartbeat(ctx),
        }
    }

    fn on_toggle(&mut self, enabled: bool, ctx: &TriggerContext) -> Vec<Payload> {
        self.enabled = enabled;
        if !ctx.online {
            if self.id == SignalId::Skill {
                self.reset(ctx.now);
            }
            return Vec::new();
        }

        let mut out = vec![Payload::Enabled { enabled }];
        match self.id {
            SignalId::Skill => {
                self.reset(ctx.now);
                let label = if enabled { NONE_SENTINEL } else { DISABLED_SENTINEL };
                out.extend(Payload::named(self.id, label));
            }
            SignalId::Idle if enabled => {
                out.extend(self.idle_state().map(|state| Payload::Idle { state }));
            }
            // forget the last name so an unchanged target is reported again
            _ if enabled => {
                self.reset(ctx.now);
                out.extend(self.evaluate(ctx));
            }
            _ => {}
        }
        out
    }

    fn on_login(&mut self, ctx: &TriggerContext) -> Vec<Payload> {
        match self.id {
            SignalId::Skill => {
                self.reset(ctx.now);
                if self.active(ctx) {
                    return Payload::named(self.id, NONE_SENTINEL).into_iter().collect();
                }
                Vec::new()
            }
            SignalId::Idle => {
                self.reset(ctx.now);
                if self.active(ctx) {
                    return vec![Payload::Idle {
                        state: IdleState::NotIdle,
                    }];
                }
                Vec::new()
            }
            _ => self.evaluate_if_active(ctx),
        }
    }

    fn on_spawn(&mut self, ctx: &TriggerContext) -> Vec<Payload> {
        if self.id == SignalId::Skill {
            self.reset(ctx.now);
            return Vec::new();
        }
        self.evaluate_if_active(ctx)
    }

    fn on_tick(&mut self, ctx: &TriggerContext) -> Vec<Payload> {
        if !self.active(ctx) {
            return Vec::new();
        }
        match self.id {
            // only the absence timeout can fire between stat changes
            SignalId::Skill => self.observe_name(None, ctx.now),
            _ => self.evaluate(ctx),
        }
    }

    fn on_attribute_event(&mut self, skill: Skill, xp: i32, ctx: &TriggerContext) -> Vec<Payload> {
        if !self.active(ctx) {
            return Vec::new();
        }
        if let Probe::Training(baseline) = &mut self.probe {
            let trained = baseline.observe(ctx.client, skill, xp, ctx.now);
            return match trained {
                Some(trained) => self.observe_name(Some(trained.name()), ctx.now),
                None => Vec::new(),
            };
        }
        if probes::gauge_skill(self.id) == Some(skill) {
            return self.evaluate(ctx);
        }
        Vec::new()
    }

    fn on_heartbeat(&mut self, ctx: &TriggerContext) -> Vec<Payload> {
        match self.id {
            SignalId::Skill | SignalId::Idle => Vec::new(),
            // opponent is re-evaluated, never forced
            _ => self.evaluate_if_active(ctx),
        }
    }

    fn active(&self, ctx: &TriggerContext) -> bool {
        self.enabled && ctx.online
    }

    fn evaluate_if_active(&mut self, ctx: &TriggerContext) -> Vec<Payload> {
        if !self.active(ctx) {
            return Vec::new();
        }
        self.evaluate(ctx)
    }

    /// Reads the live value and runs it through the policy.
    fn evaluate(&mut self, ctx: &TriggerContext) -> Vec<Payload> {
        match &mut self.probe {
            Probe::Value => probes::current_value(self.id, ctx.client).into_iter().collect(),
            Probe::Target => match probes::interacting_target(ctx.client) {
                Some(target) => self.observe_name(target.as_deref(), ctx.now),
                None => Vec::new(),
            },
            // driven by stat changes only
            Probe::Training(_) => Vec::new(),
            Probe::Motion(motion) => {
                let Some(player) = ctx.client.local_player() else {
                    return Vec::new();
                };
                let active = motion.sample(player);
                match &mut self.policy {
                    Policy::BinaryDebounce(policy) => match policy.observe(active, ctx.now) {
                        Some(state) => vec![Payload::Idle { state }],
                        None => Vec::new(),
                    },
                    _ => Vec::new(),
                }
            }
        }
    }

    fn observe_name(&mut self, observed: Option<&str>, now: Instant) -> Vec<Payload> {
        let Policy::IdentityDebounce(policy) = &mut self.policy else {
            return Vec::new();
        };
        let label = match policy.observe(observed, now) {
            Some(IdentityChange::Became(name)) => name,
            Some(IdentityChange::Cleared) => NONE_SENTINEL.to_string(),
            None => return Vec::new(),
        };
        Payload::named(self.id, label).into_iter().collect()
    }

    fn reset(&mut self, now: Instant) {
        match &mut self.policy {
            Policy::IdentityDebounce(policy) => policy.reset(),
            Policy::BinaryDebounce(policy) => policy.reset(),
            Policy::Passthrough => {}
        }
        match &mut self.probe {
            Probe::Training(baseline) => baseline.reset(now),
            Probe::Motion(motion) => motion.reset(),
            Probe::Value | Probe::Target => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::{ClientSnapshot, SnapshotClient};
    use crate::core::model::{GameState, PlayerView, WorldPoint, NO_ANIMATION};
    use crate::core::signals::probes::SKILL_START_DELAY;
    use std::time::Duration;

    fn online_client() -> SnapshotClient {
        let mut client = SnapshotClient::new(ClientSnapshot {
            game_state: GameState::LoggedIn,
            player: Some(PlayerView {
                name: "Zezima".to_string(),
                interacting: None,
                animation: NO_ANIMATION,
                position: WorldPoint::new(3222, 3218, 0),
            }),
            world: 330,
            energy: 10_000,
            ..ClientSnapshot::default()
        });
        client.record_stat(Skill::Hitpoints, 1_154, Some(10), Some(10));
        client.record_stat(Skill::Prayer, 0, Some(1), Some(1));
        client
    }

    fn ctx(client: &SnapshotClient, online: bool, now: Instant) -> TriggerContext<'_> {
        TriggerContext {
            client,
            online,
            now,
        }
    }

    #[test]
    fn test_passthrough_reemits_identical_values() {
        let client = online_client();
        let now = Instant::now();
        let mut tracker = SignalTracker::for_signal(SignalId::World, true, 5, now);

        let first = tracker.handle(Trigger::Heartbeat, &ctx(&client, true, now));
        let second = tracker.handle(Trigger::Heartbeat, &ctx(&client, true, now));

        assert_eq!(first, vec![Payload::World { world: 330 }]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_disabled_or_offline_is_silent() {
        let client = online_client();
        let now = Instant::now();
        let mut disabled = SignalTracker::for_signal(SignalId::Energy, false, 5, now);
        let mut enabled = SignalTracker::for_signal(SignalId::Energy, true, 5, now);

        assert!(disabled.handle(Trigger::Tick, &ctx(&client, true, now)).is_empty());
        assert!(enabled.handle(Trigger::Tick, &ctx(&client, false, now)).is_empty());
    }

    #[test]
    fn test_health_only_follows_its_own_stat() {
        let client = online_client();
        let now = Instant::now();
        let mut health = SignalTracker::for_signal(SignalId::Health, true, 5, now);
        let c = ctx(&client, true, now);

        let other = Trigger::StatChanged { skill: Skill::Mining, xp: 10 };
        assert!(health.handle(other, &c).is_empty());

        let own = Trigger::StatChanged { skill: Skill::Hitpoints, xp: 1_200 };
        assert_eq!(
            health.handle(own, &c),
            vec![Payload::Gauge { current: 10, max: 10 }]
        );
    }

    #[test]
    fn test_toggle_marker_then_value() {
        let client = online_client();
        let now = Instant::now();
        let mut energy = SignalTracker::for_signal(SignalId::Energy, false, 5, now);

        let on = energy.handle(Trigger::Toggle { enabled: true }, &ctx(&client, true, now));
        assert_eq!(
            on,
            vec![
                Payload::Enabled { enabled: true },
                Payload::Gauge { current: 100, max: 100 },
            ]
        );

        let off = energy.handle(Trigger::Toggle { enabled: false }, &ctx(&client, true, now));
        assert_eq!(off, vec![Payload::Enabled { enabled: false }]);
        assert!(!energy.enabled());
    }

    #[test]
    fn test_toggle_offline_updates_flag_silently() {
        let client = online_client();
        let now = Instant::now();
        let mut world = SignalTracker::for_signal(SignalId::World, false, 5, now);

        assert!(world
            .handle(Trigger::Toggle { enabled: true }, &ctx(&client, false, now))
            .is_empty());
        assert!(world.enabled());
    }

    #[test]
    fn test_skill_toggle_sentinels() {
        let client = online_client();
        let now = Instant::now();
        let mut skill = SignalTracker::for_signal(SignalId::Skill, false, 5, now);
        let c = ctx(&client, true, now);

        assert_eq!(
            skill.handle(Trigger::Toggle { enabled: true }, &c),
            vec![
                Payload::Enabled { enabled: true },
                Payload::Skill { skill: NONE_SENTINEL.to_string() },
            ]
        );
        assert_eq!(
            skill.handle(Trigger::Toggle { enabled: false }, &c),
            vec![
                Payload::Enabled { enabled: false },
                Payload::Skill { skill: DISABLED_SENTINEL.to_string() },
            ]
        );
    }

    #[test]
    fn test_skill_training_is_deduplicated_and_reset_on_spawn() {
        let client = online_client();
        let base = Instant::now();
        let mut skill = SignalTracker::for_signal(SignalId::Skill, true, 5, base);
        let later = base + SKILL_START_DELAY;
        let c = ctx(&client, true, later);

        let gain = |xp| Trigger::StatChanged { skill: Skill::Woodcutting, xp };
        assert_eq!(
            skill.handle(gain(25), &c),
            vec![Payload::Skill { skill: "Woodcutting".to_string() }]
        );
        assert!(skill.handle(gain(50), &c).is_empty());
        assert_eq!(skill.remembered(), Some("Woodcutting"));

        assert!(skill.handle(Trigger::Spawned, &c).is_empty());
        assert_eq!(skill.remembered(), None);
        assert!(skill.baseline_is_empty());
    }

    #[test]
    fn test_skill_clears_after_long_absence() {
        let client = online_client();
        let base = Instant::now();
        let mut skill = SignalTracker::for_signal(SignalId::Skill, true, 5, base);
        let start = base + SKILL_START_DELAY;

        skill.handle(
            Trigger::StatChanged { skill: Skill::Fishing, xp: 10 },
            &ctx(&client, true, start),
        );
        let early = start + Duration::from_secs(119);
        assert!(skill.handle(Trigger::Tick, &ctx(&client, true, early)).is_empty());

        let late = start + Duration::from_secs(120);
        assert_eq!(
            skill.handle(Trigger::Tick, &ctx(&client, true, late)),
            vec![Payload::Skill { skill: NONE_SENTINEL.to_string() }]
        );
    }

    #[test]
    fn test_opponent_heartbeat_never_forces() {
        let mut client = online_client();
        if let Some(player) = client.snapshot_mut().player.as_mut() {
            player.interacting = Some("Goblin".to_string());
        }
        let now = Instant::now();
        let mut opponent = SignalTracker::for_signal(SignalId::Opponent, true, 5, now);
        let c = ctx(&client, true, now);

        assert_eq!(
            opponent.handle(Trigger::Tick, &c),
            vec![Payload::Opponent { opponent: "Goblin".to_string() }]
        );
        assert!(opponent.handle(Trigger::Heartbeat, &c).is_empty());
    }

    #[test]
    fn test_opponent_reenable_reports_unchanged_target() {
        let mut client = online_client();
        if let Some(player) = client.snapshot_mut().player.as_mut() {
            player.interacting = Some("Goblin".to_string());
        }
        let now = Instant::now();
        let mut opponent = SignalTracker::for_signal(SignalId::Opponent, true, 5, now);
        let c = ctx(&client, true, now);
        let goblin = Payload::Opponent { opponent: "Goblin".to_string() };

        assert_eq!(opponent.handle(Trigger::Tick, &c), vec![goblin.clone()]);
        assert_eq!(
            opponent.handle(Trigger::Toggle { enabled: false }, &c),
            vec![Payload::Enabled { enabled: false }]
        );
        assert_eq!(
            opponent.handle(Trigger::Toggle { enabled: true }, &c),
            vec![Payload::Enabled { enabled: true }, goblin]
        );
    }

    #[test]
    fn test_idle_login_and_toggle() {
        let client = online_client();
        let base = Instant::now();
        let mut idle = SignalTracker::for_signal(SignalId::Idle, true, 2, base);

        assert_eq!(
            idle.handle(Trigger::LoginStateChanged, &ctx(&client, true, base)),
            vec![Payload::Idle { state: IdleState::NotIdle }]
        );

        let mut emitted = Vec::new();
        for secs in 0..5 {
            let now = base + Duration::from_secs(secs);
            emitted.extend(idle.handle(Trigger::Tick, &ctx(&client, true, now)));
        }
        assert_eq!(emitted, vec![Payload::Idle { state: IdleState::Idle }]);
        assert!(idle
            .handle(Trigger::Heartbeat, &ctx(&client, true, base))
            .is_empty());

        let toggled = idle.handle(Trigger::Toggle { enabled: true }, &ctx(&client, true, base));
        assert_eq!(
            toggled,
            vec![
                Payload::Enabled { enabled: true },
                Payload::Idle { state: IdleState::Idle },
            ]
        );
    }

    #[test]
    fn test_subscriptions_follow_routing_table() {
        let now = Instant::now();
        let world = SignalTracker::for_signal(SignalId::World, true, 5, now);
        let skill = SignalTracker::for_signal(SignalId::Skill, true, 5, now);
        let idle = SignalTracker::for_signal(SignalId::Idle, true, 5, now);

        assert!(!world.listens_to(TriggerClass::Tick));
        assert!(world.listens_to(TriggerClass::Heartbeat));
        assert!(!skill.listens_to(TriggerClass::Heartbeat));
        assert!(skill.listens_to(TriggerClass::StatChange));
        assert!(!idle.listens_to(TriggerClass::Spawn));
        assert!(!world.policy().is_debounced());
        assert!(idle.policy().is_debounced());
    }
}
