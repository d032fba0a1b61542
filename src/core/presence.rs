//! Status-only profile: a lowercase online/offline presence heartbeat and
//! nothing else.

use std::sync::Arc;

use super::client::{is_online, GameClient};
use super::model::{GameState, Payload, STATUS_TOPIC};
use super::notifier::{sanitize_user, Notification, Notifier};

pub const PRESENCE_ONLINE: &str = "online";
pub const PRESENCE_OFFLINE: &str = "offline";

/// What the caller must do with the heartbeat after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    Start,
    Stop,
    Keep,
}

pub struct PresenceTracker {
    notifier: Arc<dyn Notifier>,
    last_username: Option<String>,
}

impl PresenceTracker {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            last_username: None,
        }
    }

    pub fn last_username(&self) -> Option<&str> {
        self.last_username.as_deref()
    }

    pub fn startup(&mut self, client: &dyn GameClient) -> HeartbeatAction {
        if !is_online(client) {
            return HeartbeatAction::Keep;
        }
        log::info!("Started while logged in");
        self.send(client, PRESENCE_ONLINE);
        HeartbeatAction::Start
    }

    pub fn on_game_state_changed(&mut self, client: &dyn GameClient) -> HeartbeatAction {
        if client.game_state() != GameState::LoginScreen {
            return HeartbeatAction::Keep;
        }
        self.send(client, PRESENCE_OFFLINE);
        HeartbeatAction::Stop
    }

    /// A spawn guarantees a loaded player.
    pub fn on_player_spawned(&mut self, client: &dyn GameClient) -> HeartbeatAction {
        self.send(client, PRESENCE_ONLINE);
        HeartbeatAction::Start
    }

    pub fn on_heartbeat(&mut self, client: &dyn GameClient) {
        self.send(client, PRESENCE_ONLINE);
    }

    fn send(&mut self, client: &dyn GameClient, status: &str) {
        if let Some(player) = client.local_player() {
            self.last_username = Some(sanitize_user(&player.name));
        }
        let Some(user) = self.last_username.clone() else {
            log::warn!("No player name seen yet, skipping {} status", status);
            return;
        };

        self.notifier.send(Notification {
            topic: STATUS_TOPIC,
            user_id: user,
            payload: Payload::Status {
                status: status.to_string(),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::{ClientSnapshot, SnapshotClient};
    use crate::core::model::{PlayerView, WorldPoint};
    use crate::core::notifier::RecordingNotifier;

    fn status(label: &str) -> Payload {
        Payload::Status {
            status: label.to_string(),
        }
    }

    fn spawned() -> SnapshotClient {
        SnapshotClient::new(ClientSnapshot {
            game_state: GameState::LoggedIn,
            player: Some(PlayerView {
                name: "Lynx Titan".to_string(),
                interacting: None,
                animation: -1,
                position: WorldPoint::default(),
            }),
            ..ClientSnapshot::default()
        })
    }

    #[test]
    fn test_spawn_then_login_screen() {
        let recorder = Arc::new(RecordingNotifier::default());
        let mut presence = PresenceTracker::new(recorder.clone());
        let mut client = spawned();

        assert_eq!(presence.on_player_spawned(&client), HeartbeatAction::Start);
        assert_eq!(presence.last_username(), Some("lynxtitan"));

        client.set_player(None);
        client.set_game_state(GameState::LoginScreen);
        assert_eq!(presence.on_game_state_changed(&client), HeartbeatAction::Stop);

        let sent = recorder.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].payload, status(PRESENCE_OFFLINE));
        assert_eq!(sent[1].user_id, "lynxtitan", "falls back to the last known name");
    }

    #[test]
    fn test_other_states_keep_heartbeat() {
        let recorder = Arc::new(RecordingNotifier::default());
        let mut presence = PresenceTracker::new(recorder.clone());
        let mut client = spawned();
        client.set_game_state(GameState::Loading);

        assert_eq!(presence.on_game_state_changed(&client), HeartbeatAction::Keep);
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn test_unknown_user_skips_send() {
        let recorder = Arc::new(RecordingNotifier::default());
        let mut presence = PresenceTracker::new(recorder.clone());
        let client = SnapshotClient::new(ClientSnapshot {
            game_state: GameState::LoginScreen,
            ..ClientSnapshot::default()
        });

        assert_eq!(presence.on_game_state_changed(&client), HeartbeatAction::Stop);
        presence.on_heartbeat(&client);
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn test_startup_only_starts_when_online() {
        let recorder = Arc::new(RecordingNotifier::default());
        let mut presence = PresenceTracker::new(recorder.clone());

        assert_eq!(presence.startup(&SnapshotClient::default()), HeartbeatAction::Keep);
        assert_eq!(presence.startup(&spawned()), HeartbeatAction::Start);
        assert_eq!(recorder.payloads_for(STATUS_TOPIC), vec![status(PRESENCE_ONLINE)]);
    }
}
