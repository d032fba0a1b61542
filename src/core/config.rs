use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{BridgeError, Result};
use super::model::SignalId;
use super::signals::policy::{MAX_IDLE_THRESHOLD_SECS, MIN_IDLE_THRESHOLD_SECS};

/// Config group whose changes the bridge reacts to.
pub const CONFIG_GROUP: &str = "kp_home_assistant";

pub const KEY_HA_URL: &str = "haUrl";
pub const KEY_HA_TOKEN: &str = "haToken";
pub const KEY_IDLE_THRESHOLD: &str = "idleThresholdSeconds";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Every signal tracker plus the online/offline status
    #[default]
    Full,
    /// Lowercase online/offline heartbeat only
    StatusOnly,
}

/// One enable flag per signal. Everything starts disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalToggles {
    pub health: bool,
    pub prayer: bool,
    pub energy: bool,
    pub special: bool,
    pub world: bool,
    pub opponent: bool,
    pub skill: bool,
    pub location: bool,
    pub idle: bool,
}

impl SignalToggles {
    pub fn get(&self, id: SignalId) -> bool {
        match id {
            SignalId::Health => self.health,
            SignalId::Prayer => self.prayer,
            SignalId::Energy => self.energy,
            SignalId::Special => self.special,
            SignalId::World => self.world,
            SignalId::Opponent => self.opponent,
            SignalId::Skill => self.skill,
            SignalId::Location => self.location,
            SignalId::Idle => self.idle,
        }
    }

    pub fn set(&mut self, id: SignalId, enabled: bool) {
        let slot = match id {
            SignalId::Health => &mut self.health,
            SignalId::Prayer => &mut self.prayer,
            SignalId::Energy => &mut self.energy,
            SignalId::Special => &mut self.special,
            SignalId::World => &mut self.world,
            SignalId::Opponent => &mut self.opponent,
            SignalId::Skill => &mut self.skill,
            SignalId::Location => &mut self.location,
            SignalId::Idle => &mut self.idle,
        };
        *slot = enabled;
    }

    pub fn all_enabled() -> Self {
        let mut toggles = Self::default();
        for id in SignalId::all() {
            toggles.set(*id, true);
        }
        toggles
    }
}

/// Backoff for the command channel. Unlimited attempts unless capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(63)).unwrap_or(u64::MAX);
        let millis = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(millis.min(self.max_delay_ms))
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Application settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Base url of the automation hub, e.g. `http://homeassistant.local:8123`
    pub ha_url: String,
    pub ha_token: String,
    pub event_prefix: String,
    pub command_event_type: String,
    pub profile: Profile,
    /// NDJSON file the game client appends host events to
    pub feed_path: PathBuf,
    pub toggles: SignalToggles,
    pub idle_threshold_seconds: u64,
    pub reconnect: ReconnectPolicy,
    /// Bumped on every applied runtime change
    #[serde(skip)]
    pub version: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());

        Self {
            ha_url: String::new(),
            ha_token: String::new(),
            event_prefix: "kp_runelite".to_string(),
            command_event_type: "kp_runelite_button_check".to_string(),
            profile: Profile::Full,
            feed_path: PathBuf::from(home).join(".runelite/kp-ha/events.jsonl"),
            toggles: SignalToggles::default(),
            idle_threshold_seconds: 5,
            reconnect: ReconnectPolicy::default(),
            version: 0,
        }
    }
}

/// A single runtime configuration edit, as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChange {
    pub group: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl ConfigChange {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            group: CONFIG_GROUP.to_string(),
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn is_ours(&self) -> bool {
        self.group == CONFIG_GROUP
    }

    /// Signal whose enable flag this change flips, if any.
    pub fn signal(&self) -> Option<SignalId> {
        if !self.is_ours() {
            return None;
        }
        SignalId::from_config_key(&self.key)
    }

    pub fn touches_endpoint(&self) -> bool {
        self.is_ours() && (self.key == KEY_HA_URL || self.key == KEY_HA_TOKEN)
    }
}

impl Settings {
    pub fn idle_threshold(&self) -> u64 {
        self.idle_threshold_seconds
            .clamp(MIN_IDLE_THRESHOLD_SECS, MAX_IDLE_THRESHOLD_SECS)
    }

    /// Folds a runtime change into the snapshot.
    ///
    /// Returns `Ok(false)` for foreign groups and unknown keys, and an error
    /// when a known key carries a value of the wrong shape.
    pub fn apply_change(&mut self, change: &ConfigChange) -> Result<bool> {
        if !change.is_ours() {
            return Ok(false);
        }

        if let Some(id) = SignalId::from_config_key(&change.key) {
            let enabled = parse_bool(change)?;
            self.toggles.set(id, enabled);
        } else {
            match change.key.as_str() {
                KEY_HA_URL => self.ha_url = change.value.trim().to_string(),
                KEY_HA_TOKEN => self.ha_token = change.value.trim().to_string(),
                KEY_IDLE_THRESHOLD => {
                    let secs: u64 = change.value.trim().parse().map_err(|_| {
                        BridgeError::InvalidConfig {
                            details: format!("{} is not a number of seconds", change.value),
                        }
                    })?;
                    self.idle_threshold_seconds = secs;
                }
                _ => return Ok(false),
            }
        }

        self.version += 1;
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.ha_url.trim();
        if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(BridgeError::InvalidConfig {
                details: format!("ha_url must be an http(s) url, got {}", url),
            });
        }
        if self.event_prefix.trim().is_empty() {
            return Err(BridgeError::InvalidConfig {
                details: "event_prefix is empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_bool(change: &ConfigChange) -> Result<bool> {
    match change.value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(BridgeError::InvalidConfig {
            details: format!("{} expects true or false, got {}", change.key, other),
        }),
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Settings from disk, or defaults when the file is missing or broken.
    pub fn load(&self) -> Settings {
        if self.config_path.exists() {
            match self.load_strict() {
                Ok(settings) => return settings,
                Err(e) => log::warn!("Ignoring {}: {}", self.config_path.display(), e),
            }
        }
        Settings::default()
    }

    pub fn load_strict(&self) -> Result<Settings> {
        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| BridgeError::io(&self.config_path, e))?;
        let settings: Settings =
            serde_json::from_str(&content).map_err(|e| BridgeError::ConfigParse {
                details: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BridgeError::io(parent, e))?;
        }
        let content =
            serde_json::to_string_pretty(settings).map_err(|e| BridgeError::ConfigParse {
                details: e.to_string(),
            })?;
        fs::write(&self.config_path, content).map_err(|e| BridgeError::io(&self.config_path, e))
    }
}
