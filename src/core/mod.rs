pub mod client;
pub mod command_channel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod heartbeat;
pub mod location;
pub mod model;
pub mod notifier;
pub mod presence;
pub mod registry;
pub mod signals;
