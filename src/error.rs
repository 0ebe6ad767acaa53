use thiserror::Error;

/// Main error type for the adasa-watch plugins
#[derive(Debug, Error)]
pub enum WatchError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Missing required configuration field: {0}")]
    MissingConfigField(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // Control channel errors
    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Failed to connect to supervisor: {0}")]
    ConnectionError(String),

    #[error("IPC protocol error: {0}")]
    ProtocolError(String),

    #[error("Supervisor not running")]
    SupervisorNotRunning,

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Supervisor reported an error: {0}")]
    SupervisorError(String),

    // Stats errors
    #[error("Stats collection failed for {0}")]
    StatsUnavailable(String),

    #[error("Invalid byte quantity: {0}")]
    InvalidByteQuantity(String),

    // System errors
    #[error("Signal error: {0}")]
    SignalError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

/// Result type alias for adasa-watch operations
pub type Result<T> = std::result::Result<T, WatchError>;
