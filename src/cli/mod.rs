// CLI module - User-facing command-line interface

mod output;

pub use output::print_error;

use crate::config::WatchConfig;
use crate::ipc::{IpcClient, Supervisor};
use crate::stats::{MetricsSink, NoopSink, ProcessSampler, StatsdSink};
use crate::watcher::{CommandReloader, ResourceWatcher};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// adasa-watch - resource watchers and command reloaders for adasa
#[derive(Parser)]
#[command(name = "adasa-watch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every plugin defined in a config file until interrupted
    Run {
        /// Path to the config file (.toml or .json)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the supervisor control socket
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Validate a config file and show what would run
    Check {
        /// Path to the config file (.toml or .json)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Sample CPU and memory usage of running processes
    Sample {
        /// Process IDs to sample
        #[arg(required = true)]
        pids: Vec<u32>,
    },
}

impl Cli {
    /// Run the CLI application
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.init_logging();
        cli.execute().await
    }

    fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Run { config, socket } => {
                let config = load_config(config)?;
                run_plugins(config, socket.clone()).await
            }

            Commands::Check { config } => {
                let loaded = load_config(config)?;
                output::print_success_msg(&format!("{} is valid", config.display()));
                output::print_watcher_table(&loaded.resource_watcher_configs()?);
                output::print_reloader_table(&loaded.command_reloader_configs()?);
                Ok(())
            }

            Commands::Sample { pids } => {
                let mut sampler = ProcessSampler::new();
                let samples = sampler.sample(pids).await;
                output::print_sample_table(&samples);
                Ok(())
            }
        }
    }
}

fn load_config(path: &Path) -> Result<WatchConfig> {
    WatchConfig::from_file(path)
        .with_context(|| format!("Invalid configuration in {}", path.display()))
}

fn build_sink(config: &WatchConfig) -> Arc<dyn MetricsSink> {
    match &config.statsd {
        Some(statsd) => match StatsdSink::new(statsd) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                warn!("Statsd disabled: {}", e);
                Arc::new(NoopSink)
            }
        },
        None => Arc::new(NoopSink),
    }
}

/// Start one task per configured plugin and stop them all on Ctrl-C
pub async fn run_plugins(config: WatchConfig, socket: Option<PathBuf>) -> Result<()> {
    let socket_path = socket.unwrap_or_else(|| config.socket_path.clone());
    let supervisor: Arc<dyn Supervisor> =
        Arc::new(IpcClient::with_socket_path(&socket_path).with_timeout(config.rpc_timeout()));
    let sink = build_sink(&config);

    // Validate everything before the first task starts
    let watchers = config.resource_watcher_configs()?;
    let reloaders = config.command_reloader_configs()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    for watcher in watchers {
        let plugin = ResourceWatcher::new(watcher, Arc::clone(&supervisor), Arc::clone(&sink));
        tasks.push(tokio::spawn(plugin.run(shutdown_rx.clone())));
    }
    for reloader in reloaders {
        let plugin = CommandReloader::new(reloader, Arc::clone(&supervisor), Arc::clone(&sink));
        tasks.push(tokio::spawn(plugin.run(shutdown_rx.clone())));
    }

    output::print_info(&format!(
        "Running {} plugin(s) against {}",
        tasks.len(),
        socket_path.display()
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received shutdown signal, stopping plugins...");

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Plugin task ended abnormally: {}", e);
        }
    }

    Ok(())
}
