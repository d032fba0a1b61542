// Owns every signal tracker, routes triggers to them and posts what they
// produce. Connectivity is computed once per trigger here and handed down,
// so every tracker in one cycle sees the same value.

use std::sync::Arc;
use std::time::Instant;

use super::client::{is_online, GameClient};
use super::config::{ConfigChange, Settings, KEY_IDLE_THRESHOLD};
use super::model::{ConnectionStatus, Payload, SignalId, Skill, STATUS_TOPIC};
use super::notifier::{user_id, Notification, Notifier};
use super::signals::{SignalTracker, Trigger, TriggerContext};

pub struct TrackerRegistry {
    trackers: Vec<SignalTracker>,
    notifier: Arc<dyn Notifier>,
    /// Last connectivity reported to the hub
    online: Option<bool>,
}

impl TrackerRegistry {
    pub fn new(settings: &Settings, notifier: Arc<dyn Notifier>, now: Instant) -> Self {
        let trackers = SignalId::all()
            .iter()
            .map(|id| {
                SignalTracker::for_signal(
                    *id,
                    settings.toggles.get(*id),
                    settings.idle_threshold(),
                    now,
                )
            })
            .collect();
        Self {
            trackers,
            notifier,
            online: None,
        }
    }

    pub fn tracker(&self, id: SignalId) -> Option<&SignalTracker> {
        self.trackers.iter().find(|t| t.id() == id)
    }

    pub fn online(&self) -> Option<bool> {
        self.online
    }

    pub fn startup(&mut self, client: &dyn GameClient, now: Instant) {
        let online = is_online(client);
        self.online = Some(online);
        if online {
            log::info!("Started while logged in");
            self.post_status(client, online);
        }
        self.broadcast(Trigger::Startup, client, online, now);
    }

    pub fn on_game_state_changed(&mut self, client: &dyn GameClient, now: Instant) {
        let online = is_online(client);
        self.report_connectivity(client, online, true);
        self.broadcast(Trigger::LoginStateChanged, client, online, now);
    }

    pub fn on_player_spawned(&mut self, client: &dyn GameClient, now: Instant) {
        let online = is_online(client);
        self.report_connectivity(client, online, online);
        self.broadcast(Trigger::Spawned, client, online, now);
    }

    pub fn on_stat_changed(
        &mut self,
        client: &dyn GameClient,
        skill: Skill,
        xp: i32,
        now: Instant,
    ) {
        let online = is_online(client);
        self.report_connectivity(client, online, false);
        self.broadcast(Trigger::StatChanged { skill, xp }, client, online, now);
    }

    pub fn on_tick(&mut self, client: &dyn GameClient, now: Instant) {
        let online = is_online(client);
        self.report_connectivity(client, online, false);
        self.broadcast(Trigger::Tick, client, online, now);
    }

    pub fn on_heartbeat(&mut self, client: &dyn GameClient, now: Instant) {
        let online = is_online(client);
        self.report_connectivity(client, online, true);
        self.broadcast(Trigger::Heartbeat, client, online, now);
    }

    /// Reacts to a runtime configuration change that `settings` already reflects.
    pub fn on_config_changed(
        &mut self,
        change: &ConfigChange,
        settings: &Settings,
        client: &dyn GameClient,
        now: Instant,
    ) {
        if !change.is_ours() {
            return;
        }

        if let Some(id) = change.signal() {
            let enabled = settings.toggles.get(id);
            log::info!("{} {}", id.config_key(), if enabled { "enabled" } else { "disabled" });
            let ctx = TriggerContext {
                client,
                online: is_online(client),
                now,
            };
            let notifier = &self.notifier;
            if let Some(tracker) = self.trackers.iter_mut().find(|t| t.id() == id) {
                let payloads = tracker.handle(Trigger::Toggle { enabled }, &ctx);
                post_all(notifier.as_ref(), id, client, payloads);
            }
            return;
        }

        if change.key == KEY_IDLE_THRESHOLD {
            let secs = settings.idle_threshold();
            log::info!("Idle threshold set to {}s", secs);
            for tracker in &mut self.trackers {
                tracker.set_idle_threshold(secs);
            }
        }
    }

    /// Best-effort final Offline, sent whatever the last known state was.
    pub fn shutdown(&mut self, client: &dyn GameClient) {
        self.online = Some(false);
        self.post_status(client, false);
    }

    fn broadcast(&mut self, trigger: Trigger, client: &dyn GameClient, online: bool, now: Instant) {
        let Some(class) = trigger.class() else {
            return;
        };
        let ctx = TriggerContext {
            client,
            online,
            now,
        };
        let notifier = &self.notifier;
        for tracker in self.trackers.iter_mut().filter(|t| t.listens_to(class)) {
            let payloads = tracker.handle(trigger, &ctx);
            post_all(notifier.as_ref(), tracker.id(), client, payloads);
        }
    }

    /// Posts the status when connectivity flipped, or always when `force` is set.
    fn report_connectivity(&mut self, client: &dyn GameClient, online: bool, force: bool) {
        let flipped = self.online != Some(online);
        if flipped {
            log::info!(
                "Connectivity now {}",
                ConnectionStatus::from_online(online).label()
            );
        }
        self.online = Some(online);
        if flipped || force {
            self.post_status(client, online);
        }
    }

    fn post_status(&self, client: &dyn GameClient, online: bool) {
        self.notifier.send(Notification {
            topic: STATUS_TOPIC,
            user_id: user_id(client.local_player()),
            payload: Payload::status(ConnectionStatus::from_online(online)),
        });
    }
}

fn post_all(
    notifier: &dyn Notifier,
    id: SignalId,
    client: &dyn GameClient,
    payloads: Vec<Payload>,
) {
    if payloads.is_empty() {
        return;
    }
    let user = user_id(client.local_player());
    for payload in payloads {
        notifier.send(Notification {
            topic: id.topic(),
            user_id: user.clone(),
            payload,
        });
    }
}
