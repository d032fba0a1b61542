// Model types shared by the trackers, the host feed and the notifier.

use serde::{Deserialize, Serialize};

/// Login-state of the game client, named the way the client reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    #[default]
    Unknown,
    Starting,
    LoginScreen,
    LoginScreenAuthenticator,
    LoggingIn,
    Loading,
    LoggedIn,
    ConnectionLost,
    Hopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Skill {
    Attack,
    Defence,
    Strength,
    Hitpoints,
    Ranged,
    Prayer,
    Magic,
    Cooking,
    Woodcutting,
    Fletching,
    Fishing,
    Firemaking,
    Crafting,
    Smithing,
    Mining,
    Herblore,
    Agility,
    Thieving,
    Slayer,
    Farming,
    Runecraft,
    Hunter,
    Construction,
}

impl Skill {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Attack => "Attack",
            Self::Defence => "Defence",
            Self::Strength => "Strength",
            Self::Hitpoints => "Hitpoints",
            Self::Ranged => "Ranged",
            Self::Prayer => "Prayer",
            Self::Magic => "Magic",
            Self::Cooking => "Cooking",
            Self::Woodcutting => "Woodcutting",
            Self::Fletching => "Fletching",
            Self::Fishing => "Fishing",
            Self::Firemaking => "Firemaking",
            Self::Crafting => "Crafting",
            Self::Smithing => "Smithing",
            Self::Mining => "Mining",
            Self::Herblore => "Herblore",
            Self::Agility => "Agility",
            Self::Thieving => "Thieving",
            Self::Slayer => "Slayer",
            Self::Farming => "Farming",
            Self::Runecraft => "Runecraft",
            Self::Hunter => "Hunter",
            Self::Construction => "Construction",
        }
    }

    pub fn all() -> &'static [Skill] {
        &[
            Self::Attack,
            Self::Defence,
            Self::Strength,
            Self::Hitpoints,
            Self::Ranged,
            Self::Prayer,
            Self::Magic,
            Self::Cooking,
            Self::Woodcutting,
            Self::Fletching,
            Self::Fishing,
            Self::Firemaking,
            Self::Crafting,
            Self::Smithing,
            Self::Mining,
            Self::Herblore,
            Self::Agility,
            Self::Thieving,
            Self::Slayer,
            Self::Farming,
            Self::Runecraft,
            Self::Hunter,
            Self::Construction,
        ]
    }
}

/// Tile coordinate in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub plane: i32,
}

impl WorldPoint {
    pub fn new(x: i32, y: i32, plane: i32) -> Self {
        Self { x, y, plane }
    }

    /// 64x64 map region containing this point.
    pub fn region_id(&self) -> i32 {
        ((self.x >> 6) << 8) | (self.y >> 6)
    }
}

/// Animation id reported while the player is not animating.
pub const NO_ANIMATION: i32 = -1;

/// What the trackers can see of the local player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,
    /// Name of the actor the player is interacting with
    #[serde(default)]
    pub interacting: Option<String>,
    #[serde(default = "default_animation")]
    pub animation: i32,
    pub position: WorldPoint,
}

fn default_animation() -> i32 {
    NO_ANIMATION
}

/// Identifies one tracked attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalId {
    Health,
    Prayer,
    Energy,
    Special,
    World,
    Opponent,
    Skill,
    Location,
    Idle,
}

impl SignalId {
    /// Topic segment of the event name this signal posts to.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Prayer => "prayer",
            Self::Energy => "energy",
            Self::Special => "special",
            Self::World => "world",
            Self::Opponent => "opponent",
            Self::Skill => "skill",
            Self::Location => "location",
            Self::Idle => "idle",
        }
    }

    /// Configuration key whose change toggles this signal.
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::Health => "showHealth",
            Self::Prayer => "showPrayer",
            Self::Energy => "showEnergy",
            Self::Special => "showSpecialAttack",
            Self::World => "showCurrentWorld",
            Self::Opponent => "showCurrentOpponent",
            Self::Skill => "showCurrentSkill",
            Self::Location => "showCurrentLocation",
            Self::Idle => "showIdleStatus",
        }
    }

    pub fn from_config_key(key: &str) -> Option<SignalId> {
        Self::all().iter().copied().find(|id| id.config_key() == key)
    }

    pub fn all() -> &'static [SignalId] {
        &[
            Self::Health,
            Self::Prayer,
            Self::Energy,
            Self::Special,
            Self::World,
            Self::Opponent,
            Self::Skill,
            Self::Location,
            Self::Idle,
        ]
    }
}

/// Topic of the process-wide connectivity event.
pub const STATUS_TOPIC: &str = "update";

/// Sentinel posted when a remembered name is cleared.
pub const NONE_SENTINEL: &str = "None";

/// Posted to the skill topic when skill tracking is switched off.
pub const DISABLED_SENTINEL: &str = "Disabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Online,
    Offline,
}

impl ConnectionStatus {
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Offline => "Offline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdleState {
    Idle,
    #[serde(rename = "Not Idle")]
    NotIdle,
}

impl IdleState {
    pub fn from_idle(idle: bool) -> Self {
        if idle {
            Self::Idle
        } else {
            Self::NotIdle
        }
    }
}

/// JSON body of one outbound notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Status { status: String },
    Gauge { current: i32, max: i32 },
    World { world: i32 },
    Opponent { opponent: String },
    Skill { skill: String },
    Location { location: String },
    Idle { state: IdleState },
    Enabled { enabled: bool },
}

impl Payload {
    pub fn status(status: ConnectionStatus) -> Self {
        Self::Status {
            status: status.label().to_string(),
        }
    }

    /// Wraps a tracked name in the payload shape of the given signal.
    pub fn named(id: SignalId, name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        match id {
            SignalId::Opponent => Some(Self::Opponent { opponent: name }),
            SignalId::Skill => Some(Self::Skill { skill: name }),
            SignalId::Location => Some(Self::Location { location: name }),
            _ => None,
        }
    }
}
