use thiserror::Error;

/// Result type used across the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Canonical error representation shared by the workspace crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    LoggingError(String),
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {key}: {value}")]
    InvalidEnvVar { key: String, value: String },
}
