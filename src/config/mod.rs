mod units;

pub use units::{bytes2human, human2bytes};

use crate::error::{Result, WatchError};
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Default supervisor control socket (shared with the adasa daemon)
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/adasa.sock";

/// Top level configuration file for adasa-watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Supervisor control socket
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Upper bound for a single RPC call (in seconds)
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,

    /// Statsd endpoint; events are discarded when absent
    #[serde(default)]
    pub statsd: Option<StatsdConfig>,

    #[serde(default)]
    pub resource_watchers: Vec<ResourceWatcherOptions>,

    #[serde(default)]
    pub command_reloaders: Vec<CommandReloaderOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsdConfig {
    #[serde(default = "default_statsd_host")]
    pub host: String,
    #[serde(default = "default_statsd_port")]
    pub port: u16,
    #[serde(default = "default_statsd_prefix")]
    pub prefix: String,
}

/// A threshold as written in the config file: `90`, `"90"`, `"500M"` or `"none"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdValue {
    Number(f64),
    Text(String),
}

/// Raw options of one resource watcher, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceWatcherOptions {
    /// Target group name (mandatory)
    #[serde(default)]
    pub watcher: Option<String>,

    /// Deprecated alias of `watcher`
    #[serde(default)]
    pub service: Option<String>,

    #[serde(default)]
    pub max_cpu: Option<ThresholdValue>,

    #[serde(default)]
    pub min_cpu: Option<ThresholdValue>,

    #[serde(default)]
    pub max_mem: Option<ThresholdValue>,

    #[serde(default)]
    pub min_mem: Option<ThresholdValue>,

    #[serde(default)]
    pub health_threshold: Option<ThresholdValue>,

    /// Consecutive breaches tolerated before acting
    #[serde(default)]
    pub max_count: Option<u32>,

    /// `restart`, `reload` or a signal name
    #[serde(default)]
    pub action: Option<String>,

    /// Deprecated spelling of `action = "reload"`
    #[serde(default)]
    pub use_reload: bool,

    #[serde(default)]
    pub per_process: bool,

    /// Tick interval (in seconds)
    #[serde(default)]
    pub loop_rate: Option<u64>,

    /// Minimum time between two actions on the same entity (in seconds)
    #[serde(default)]
    pub debounce_secs: Option<u64>,
}

/// Which supervisor watchers a command reloader looks after
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatcherSelection {
    /// `"*"` or a comma separated list
    Pattern(String),
    List(Vec<String>),
}

/// Raw options of one command reloader, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandReloaderOptions {
    #[serde(default)]
    pub watchers: Option<WatcherSelection>,

    /// Watch the working directory instead of the command
    #[serde(default)]
    pub use_working_dir: bool,

    #[serde(default)]
    pub use_reload: bool,

    #[serde(default)]
    pub loop_rate: Option<u64>,
}

/// Memory threshold, either relative to total memory or absolute
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemLimit {
    Percent(f64),
    Bytes(u64),
}

/// Remediation issued once an entity stays in breach for too long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Restart,
    Reload,
    Signal(Signal),
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Restart => write!(f, "restart"),
            Action::Reload => write!(f, "reload"),
            Action::Signal(signal) => write!(f, "{}", signal.as_str()),
        }
    }
}

/// Validated thresholds and remediation policy, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    pub max_cpu: Option<f64>,
    pub min_cpu: Option<f64>,
    pub max_mem: Option<MemLimit>,
    pub min_mem: Option<MemLimit>,
    pub health_threshold: Option<f64>,
    pub max_count: u32,
    pub action: Action,
    pub per_process: bool,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_cpu: Some(DEFAULT_MAX_CPU),
            min_cpu: None,
            max_mem: Some(MemLimit::Percent(DEFAULT_MAX_MEM)),
            min_mem: None,
            health_threshold: Some(DEFAULT_HEALTH_THRESHOLD),
            max_count: DEFAULT_MAX_COUNT,
            action: Action::Restart,
            per_process: false,
        }
    }
}

/// Everything a resource watcher needs to run
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceWatcherConfig {
    pub watcher: String,
    pub thresholds: ThresholdConfig,
    pub loop_rate: Duration,
    pub debounce: Duration,
}

/// Everything a command reloader needs to run
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReloaderConfig {
    /// `None` means every watcher
    pub watchers: Option<Vec<String>>,
    pub use_working_dir: bool,
    pub use_reload: bool,
    pub loop_rate: Duration,
}

const DEFAULT_MAX_CPU: f64 = 90.0;
const DEFAULT_MAX_MEM: f64 = 90.0;
const DEFAULT_HEALTH_THRESHOLD: f64 = 75.0;
const DEFAULT_MAX_COUNT: u32 = 3;
const DEFAULT_LOOP_RATE_SECS: u64 = 1;
const DEFAULT_DEBOUNCE_SECS: u64 = 5;

// Default value functions for serde
fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_rpc_timeout() -> u64 {
    5
}

fn default_statsd_host() -> String {
    "127.0.0.1".to_string()
}

fn default_statsd_port() -> u16 {
    8125
}

fn default_statsd_prefix() -> String {
    "adasa".to_string()
}

impl WatchConfig {
    /// Load the configuration from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<WatchConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WatchError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(WatchError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.socket_path = expand_env_in_path(&config.socket_path);
        config.validate()?;

        Ok(config)
    }

    fn parse_toml(contents: &str) -> Result<WatchConfig> {
        toml::from_str(contents)
            .map_err(|e| WatchError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<WatchConfig> {
        serde_json::from_str(contents)
            .map_err(|e| WatchError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Validate every plugin section; nothing is started on error
    pub fn validate(&self) -> Result<()> {
        if self.resource_watchers.is_empty() && self.command_reloaders.is_empty() {
            return Err(WatchError::InvalidConfig(
                "No resource_watchers or command_reloaders found in file".to_string(),
            ));
        }

        if self.rpc_timeout_secs == 0 {
            return Err(WatchError::ConfigValidationError(
                "rpc_timeout_secs must be at least 1".to_string(),
            ));
        }

        self.resource_watcher_configs()?;
        self.command_reloader_configs()?;

        Ok(())
    }

    pub fn resource_watcher_configs(&self) -> Result<Vec<ResourceWatcherConfig>> {
        self.resource_watchers
            .iter()
            .map(ResourceWatcherConfig::from_options)
            .collect()
    }

    pub fn command_reloader_configs(&self) -> Result<Vec<CommandReloaderConfig>> {
        self.command_reloaders
            .iter()
            .map(CommandReloaderConfig::from_options)
            .collect()
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

impl ResourceWatcherConfig {
    /// Validate raw options into a runnable configuration
    pub fn from_options(options: &ResourceWatcherOptions) -> Result<Self> {
        let watcher = match (&options.watcher, &options.service) {
            (Some(watcher), _) => watcher.clone(),
            (None, Some(service)) => {
                warn!(
                    "resource watcher option 'service' is deprecated, use 'watcher' instead"
                );
                service.clone()
            }
            (None, None) => return Err(WatchError::MissingConfigField("watcher".to_string())),
        };

        if watcher.trim().is_empty() {
            return Err(WatchError::MissingConfigField("watcher".to_string()));
        }

        let action = match &options.action {
            Some(action) => {
                let action = parse_action(action)?;
                if options.use_reload && action != Action::Reload {
                    warn!(
                        "watcher {}: 'use_reload' ignored because 'action' is set to {}",
                        watcher, action
                    );
                }
                action
            }
            None if options.use_reload => Action::Reload,
            None => Action::Restart,
        };

        match (action, options.per_process) {
            (Action::Restart | Action::Reload, true) => {
                return Err(WatchError::ConfigValidationError(format!(
                    "action '{}' applies to a whole watcher and cannot be used with per_process",
                    action
                )))
            }
            (Action::Signal(_), false) => {
                return Err(WatchError::ConfigValidationError(format!(
                    "signal action '{}' requires per_process = true",
                    action
                )))
            }
            _ => {}
        }

        let thresholds = ThresholdConfig {
            max_cpu: parse_percent("max_cpu", options.max_cpu.as_ref(), Some(DEFAULT_MAX_CPU))?,
            min_cpu: parse_percent("min_cpu", options.min_cpu.as_ref(), None)?,
            max_mem: parse_mem_limit(
                "max_mem",
                options.max_mem.as_ref(),
                Some(MemLimit::Percent(DEFAULT_MAX_MEM)),
            )?,
            min_mem: parse_mem_limit("min_mem", options.min_mem.as_ref(), None)?,
            health_threshold: parse_percent(
                "health_threshold",
                options.health_threshold.as_ref(),
                Some(DEFAULT_HEALTH_THRESHOLD),
            )?,
            max_count: options.max_count.unwrap_or(DEFAULT_MAX_COUNT),
            action,
            per_process: options.per_process,
        };

        let loop_rate = options.loop_rate.unwrap_or(DEFAULT_LOOP_RATE_SECS);
        if loop_rate == 0 {
            return Err(WatchError::ConfigValidationError(
                "loop_rate must be at least 1 second".to_string(),
            ));
        }

        Ok(Self {
            watcher,
            thresholds,
            loop_rate: Duration::from_secs(loop_rate),
            debounce: Duration::from_secs(options.debounce_secs.unwrap_or(DEFAULT_DEBOUNCE_SECS)),
        })
    }
}

impl CommandReloaderConfig {
    pub fn from_options(options: &CommandReloaderOptions) -> Result<Self> {
        let watchers = match &options.watchers {
            None => None,
            Some(WatcherSelection::Pattern(pattern)) if pattern.trim() == "*" => None,
            Some(WatcherSelection::Pattern(pattern)) => Some(
                pattern
                    .split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect::<Vec<_>>(),
            ),
            Some(WatcherSelection::List(names)) => Some(names.clone()),
        };

        if matches!(&watchers, Some(names) if names.is_empty()) {
            return Err(WatchError::ConfigValidationError(
                "command reloader 'watchers' selects nothing".to_string(),
            ));
        }

        let loop_rate = options.loop_rate.unwrap_or(DEFAULT_LOOP_RATE_SECS);
        if loop_rate == 0 {
            return Err(WatchError::ConfigValidationError(
                "loop_rate must be at least 1 second".to_string(),
            ));
        }

        Ok(Self {
            watchers,
            use_working_dir: options.use_working_dir,
            use_reload: options.use_reload,
            loop_rate: Duration::from_secs(loop_rate),
        })
    }
}

fn is_disabled(text: &str) -> bool {
    matches!(text.trim().to_ascii_lowercase().as_str(), "none" | "off")
}

fn checked_percent(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(WatchError::ConfigValidationError(format!(
            "{} must be a non-negative percentage, got {}",
            field, value
        )));
    }
    Ok(value)
}

fn parse_percent(
    field: &str,
    value: Option<&ThresholdValue>,
    default: Option<f64>,
) -> Result<Option<f64>> {
    match value {
        None => Ok(default),
        Some(ThresholdValue::Number(n)) => checked_percent(field, *n).map(Some),
        Some(ThresholdValue::Text(text)) if is_disabled(text) => Ok(None),
        Some(ThresholdValue::Text(text)) => {
            let n = text.trim().parse::<f64>().map_err(|_| {
                WatchError::ConfigValidationError(format!(
                    "{} must be a percentage, got '{}'",
                    field, text
                ))
            })?;
            checked_percent(field, n).map(Some)
        }
    }
}

fn parse_mem_limit(
    field: &str,
    value: Option<&ThresholdValue>,
    default: Option<MemLimit>,
) -> Result<Option<MemLimit>> {
    match value {
        None => Ok(default),
        Some(ThresholdValue::Number(n)) => {
            checked_percent(field, *n).map(|p| Some(MemLimit::Percent(p)))
        }
        Some(ThresholdValue::Text(text)) if is_disabled(text) => Ok(None),
        Some(ThresholdValue::Text(text)) => match text.trim().parse::<f64>() {
            Ok(n) => checked_percent(field, n).map(|p| Some(MemLimit::Percent(p))),
            Err(_) => human2bytes(text)
                .map(|bytes| Some(MemLimit::Bytes(bytes)))
                .map_err(|e| WatchError::ConfigValidationError(format!("{}: {}", field, e))),
        },
    }
}

/// Parse `restart`, `reload` or a signal name
pub fn parse_action(value: &str) -> Result<Action> {
    match value.trim().to_ascii_lowercase().as_str() {
        "restart" => Ok(Action::Restart),
        "reload" => Ok(Action::Reload),
        _ => parse_signal(value).map(Action::Signal),
    }
}

/// Parse a signal given as `SIGTERM`, `term` or `15`
pub fn parse_signal(value: &str) -> Result<Signal> {
    let value = value.trim();

    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        let signum: i32 = value
            .parse()
            .map_err(|_| WatchError::SignalError(format!("Invalid signal: {}", value)))?;
        return Signal::try_from(signum)
            .map_err(|_| WatchError::SignalError(format!("Invalid signal number: {}", value)));
    }

    let upper = value.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };

    Signal::from_str(&name)
        .map_err(|_| WatchError::SignalError(format!("Invalid signal: {}", value)))
}

/// Expand `$VAR` and `${VAR}` occurrences in a string
///
/// A bare `$VAR` name runs over ASCII alphanumerics and `_`. Unset
/// variables are left as written.
fn expand_env_in_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find('$') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        match std::env::var(name) {
            Ok(value) if !name.is_empty() => {
                result.push_str(&value);
                rest = &after[consumed..];
            }
            _ => {
                result.push('$');
                rest = after;
            }
        }
    }

    result.push_str(rest);
    result
}

fn expand_env_in_path(path: &Path) -> PathBuf {
    PathBuf::from(expand_env_in_string(&path.to_string_lossy()))
}
