mod watcher;

pub use watcher::{BehaviorEvent, BehaviorWatcher};
pub(crate) use watcher::BehaviorOutcome;
