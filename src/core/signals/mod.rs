//! Per-signal trackers and the debounce policies they run.

pub mod policy;
pub mod probes;
pub mod tracker;

pub use policy::{BinaryDebounce, IdentityChange, IdentityDebounce};
pub use tracker::{SignalTracker, Trigger, TriggerClass, TriggerContext};
