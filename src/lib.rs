// Library exports for adasa-watch

pub mod cli;
pub mod config;
pub mod error;
pub mod ipc;
pub mod perf;
pub mod stats;
pub mod watcher;
