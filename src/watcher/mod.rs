// Watcher module - Resource watchers and command reloaders

pub mod dispatcher;
pub mod evaluator;
pub mod monitor;
pub mod registry;
pub mod reloader;
pub mod resource;

pub use dispatcher::{dispatch, ActionDispatcher, RemediationTarget};
pub use evaluator::{evaluate, Evaluation, Metric};
pub use monitor::Monitor;
pub use registry::{EntityId, MonitorRegistry, Reconciled};
pub use reloader::{mtime_of_path, CommandReloader, WatchedPath};
pub use resource::{ResourceWatcher, TickOutcome};
