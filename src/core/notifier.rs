//! Outbound notifications to the automation hub.
//!
//! Sends are fire-and-forget: [`Notifier::send`] returns immediately and any
//! failure is logged on the spawned task. There is no retry and no queue.

use std::sync::RwLock;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::runtime::Handle;

use super::config::Settings;
use super::model::{Payload, PlayerView};

/// User id used when no player name is available.
pub const UNKNOWN_USER: &str = "unknown";

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]").expect("Invalid user id regex");
}

/// Lower-cased, alphanumeric-only form of a player name.
pub fn sanitize_user(name: &str) -> String {
    NON_ALNUM.replace_all(&name.to_lowercase(), "").into_owned()
}

pub fn user_id(player: Option<&PlayerView>) -> String {
    match player {
        Some(player) => sanitize_user(&player.name),
        None => UNKNOWN_USER.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub topic: &'static str,
    pub user_id: String,
    pub payload: Payload,
}

pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification);

    /// Called after the hub url or token changed at runtime.
    fn update_endpoint(&self, _settings: &Settings) {}
}

/// Where and how events are posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub token: String,
    pub event_prefix: String,
}

impl Endpoint {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_url: settings.ha_url.trim().trim_end_matches('/').to_string(),
            token: settings.ha_token.clone(),
            event_prefix: settings.event_prefix.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    /// `<base>/api/events/<prefix>_<topic>_<user>`
    pub fn event_url(&self, topic: &str, user_id: &str) -> String {
        format!(
            "{}/api/events/{}_{}_{}",
            self.base_url, self.event_prefix, topic, user_id
        )
    }
}

pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: RwLock<Endpoint>,
    runtime: Handle,
}

impl HttpNotifier {
    pub fn new(settings: &Settings, runtime: Handle) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            endpoint: RwLock::new(Endpoint::from_settings(settings)),
            runtime,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self.endpoint.read() {
            Ok(endpoint) => endpoint.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for HttpNotifier {
    fn send(&self, notification: Notification) {
        let endpoint = self.endpoint();
        if !endpoint.is_configured() {
            log::debug!("No hub url configured, dropping {} event", notification.topic);
            return;
        }

        let url = endpoint.event_url(notification.topic, &notification.user_id);
        log::debug!("POST {} {:?}", url, notification.payload);

        let request = self
            .client
            .post(&url)
            .bearer_auth(&endpoint.token)
            .json(&notification.payload);

        self.runtime.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    log::warn!("Hub rejected {}: {}", url, response.status());
                }
                Ok(_) => {}
                Err(e) => log::warn!("Failed to post {}: {}", url, e),
            }
        });
    }

    fn update_endpoint(&self, settings: &Settings) {
        let next = Endpoint::from_settings(settings);
        match self.endpoint.write() {
            Ok(mut endpoint) => *endpoint = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        log::info!("Hub endpoint updated");
    }
}

/// Collects notifications instead of sending them.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Drains everything recorded so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.sent().iter().map(|n| n.topic).collect()
    }

    pub fn payloads_for(&self, topic: &str) -> Vec<Payload> {
        self.sent()
            .into_iter()
            .filter(|n| n.topic == topic)
            .map(|n| n.payload)
            .collect()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn send(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}
