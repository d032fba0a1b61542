use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::client::SnapshotClient;
use super::config::{Profile, Settings};
use super::feed::HostEvent;
use super::heartbeat::HeartbeatScheduler;
use super::model::GameState;
use super::notifier::Notifier;
use super::presence::{HeartbeatAction, PresenceTracker};
use super::registry::TrackerRegistry;

/// Everything that can land on the trigger queue.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    Host(HostEvent),
    Heartbeat,
    Shutdown,
}

enum Engine {
    Full(TrackerRegistry),
    StatusOnly(PresenceTracker),
}

/// Single consumer of the trigger queue. Owns the live client view, the
/// settings snapshot and every tracker, so none of them need locking.
pub struct Coordinator {
    client: SnapshotClient,
    settings: Settings,
    engine: Engine,
    heartbeat: HeartbeatScheduler,
    notifier: Arc<dyn Notifier>,
}

impl Coordinator {
    pub fn new(
        settings: Settings,
        notifier: Arc<dyn Notifier>,
        tx: mpsc::Sender<CoordinatorEvent>,
        now: Instant,
    ) -> Self {
        let (engine, heartbeat) = match settings.profile {
            Profile::Full => (
                Engine::Full(TrackerRegistry::new(&settings, notifier.clone(), now)),
                HeartbeatScheduler::full(tx),
            ),
            Profile::StatusOnly => (
                Engine::StatusOnly(PresenceTracker::new(notifier.clone())),
                HeartbeatScheduler::status_only(tx),
            ),
        };
        Self {
            client: SnapshotClient::default(),
            settings,
            engine,
            heartbeat,
            notifier,
        }
    }

    pub fn client(&self) -> &SnapshotClient {
        &self.client
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> Option<&TrackerRegistry> {
        match &self.engine {
            Engine::Full(registry) => Some(registry),
            Engine::StatusOnly(_) => None,
        }
    }

    pub fn heartbeat_active(&self) -> bool {
        self.heartbeat.is_active()
    }

    /// Initial evaluation. Needs a tokio runtime for the heartbeat.
    pub fn start(&mut self, now: Instant) {
        match &mut self.engine {
            Engine::Full(registry) => {
                registry.startup(&self.client, now);
                self.heartbeat.schedule();
            }
            Engine::StatusOnly(presence) => {
                let action = presence.startup(&self.client);
                apply_heartbeat(&mut self.heartbeat, action);
            }
        }
    }

    /// Processes one queued event. Returns `false` once shut down.
    pub fn handle(&mut self, event: CoordinatorEvent, now: Instant) -> bool {
        match event {
            CoordinatorEvent::Host(host) => self.on_host_event(host, now),
            CoordinatorEvent::Heartbeat => match &mut self.engine {
                Engine::Full(registry) => registry.on_heartbeat(&self.client, now),
                Engine::StatusOnly(presence) => presence.on_heartbeat(&self.client),
            },
            CoordinatorEvent::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// Drains the queue until shutdown or until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<CoordinatorEvent>) {
        self.start(Instant::now());
        while let Some(event) = rx.recv().await {
            if !self.handle(event, Instant::now()) {
                return;
            }
        }
        log::info!("Trigger queue closed");
        self.shutdown();
    }

    fn on_host_event(&mut self, event: HostEvent, now: Instant) {
        match event {
            HostEvent::Snapshot(snapshot) => self.client.apply(snapshot),
            HostEvent::GameStateChanged { state } => {
                log::debug!("Game state {:?}", state);
                self.client.set_game_state(state);
                if matches!(
                    state,
                    GameState::Starting | GameState::LoginScreen | GameState::LoginScreenAuthenticator
                ) {
                    self.client.set_player(None);
                }
                match &mut self.engine {
                    Engine::Full(registry) => registry.on_game_state_changed(&self.client, now),
                    Engine::StatusOnly(presence) => {
                        let action = presence.on_game_state_changed(&self.client);
                        apply_heartbeat(&mut self.heartbeat, action);
                    }
                }
            }
            HostEvent::PlayerSpawned { player } => {
                if player.is_some() {
                    self.client.set_player(player);
                }
                match &mut self.engine {
                    Engine::Full(registry) => registry.on_player_spawned(&self.client, now),
                    Engine::StatusOnly(presence) => {
                        let action = presence.on_player_spawned(&self.client);
                        apply_heartbeat(&mut self.heartbeat, action);
                    }
                }
            }
            HostEvent::StatChanged {
                skill,
                xp,
                boosted_level,
                real_level,
            } => {
                self.client.record_stat(skill, xp, boosted_level, real_level);
                if let Engine::Full(registry) = &mut self.engine {
                    registry.on_stat_changed(&self.client, skill, xp, now);
                }
            }
            HostEvent::GameTick => {
                if let Engine::Full(registry) = &mut self.engine {
                    registry.on_tick(&self.client, now);
                }
            }
            HostEvent::ConfigChanged(change) => match self.settings.apply_change(&change) {
                Ok(true) => {
                    if change.touches_endpoint() {
                        self.notifier.update_endpoint(&self.settings);
                    }
                    if let Engine::Full(registry) = &mut self.engine {
                        registry.on_config_changed(&change, &self.settings, &self.client, now);
                    }
                }
                Ok(false) => log::debug!("Ignoring config change {}.{}", change.group, change.key),
                Err(e) => log::warn!("Rejected config change: {}", e),
            },
        }
    }

    fn shutdown(&mut self) {
        self.heartbeat.cancel();
        if let Engine::Full(registry) = &mut self.engine {
            registry.shutdown(&self.client);
        }
        log::info!("Bridge stopped");
    }
}

fn apply_heartbeat(heartbeat: &mut HeartbeatScheduler, action: HeartbeatAction) {
    match action {
        HeartbeatAction::Start => heartbeat.schedule(),
        HeartbeatAction::Stop => heartbeat.cancel(),
        HeartbeatAction::Keep => {}
    }
}
