use std::env;
use std::path::PathBuf;

use crate::errors::ConfigError;

/// Tag key stamped on every object once its rules have run.
pub const DEFAULT_MARKER_KEY: &str = "importer_rules_applied";
/// Value written under [`DEFAULT_MARKER_KEY`]; re-processing is detected by exact equality.
pub const DEFAULT_MARKER_VALUE: &str = "True";

const DEFAULT_PREFIX: &str = "IMPORTRULES_";

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

/// Process-wide configuration for the rules engine and its tools.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub environment: Environment,
    /// Default tracing filter, used when `RUST_LOG` is not set.
    pub log_level: String,
    /// File or directory holding rule modules loaded at start-up.
    pub rules_path: Option<PathBuf>,
    pub marker_key: String,
    pub marker_value: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_level: "info".to_string(),
            rules_path: None,
            marker_key: DEFAULT_MARKER_KEY.to_string(),
            marker_value: DEFAULT_MARKER_VALUE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the process environment (`IMPORTRULES_*`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_with_prefix(DEFAULT_PREFIX)
    }

    /// Loads configuration from env vars prefixed with the provided value.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);
        let defaults = Self::default();

        let environment = env::var(key("ENV"))
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        let log_level = env::var(key("LOG")).unwrap_or(defaults.log_level);

        let rules_path = env::var(key("RULES_PATH"))
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from);

        let marker_key_name = key("MARKER_KEY");
        let marker_key = match env::var(&marker_key_name) {
            Ok(value) if value.trim().is_empty() => {
                return Err(ConfigError::InvalidEnvVar {
                    key: marker_key_name,
                    value,
                })
            }
            Ok(value) => value,
            Err(_) => defaults.marker_key,
        };

        let marker_value = env::var(key("MARKER_VALUE")).unwrap_or(defaults.marker_value);

        Ok(Self {
            environment,
            log_level,
            rules_path,
            marker_key,
            marker_value,
        })
    }

    /// Whether the process is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }

    /// Returns the configured rules location, if any.
    pub fn rules_path(&self) -> Option<&PathBuf> {
        self.rules_path.as_ref()
    }
}
