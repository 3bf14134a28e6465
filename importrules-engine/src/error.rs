use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building, loading or registering rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rules path does not exist: {0}")]
    MissingPath(String),
    #[error("failed to read rules from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules from {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid rule '{label}': {reason}")]
    InvalidRule { label: String, reason: String },
    #[error("invalid category name: '{0}'")]
    InvalidCategory(String),
}

impl RuleError {
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RuleError::Io {
            path: path.into().display().to_string(),
            source,
        }
    }

    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        RuleError::Parse {
            path: path.into().display().to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_rule(label: impl Into<String>, reason: impl Into<String>) -> Self {
        RuleError::InvalidRule {
            label: label.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by a host capability (property or tag writes).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    #[error("object has no property named '{0}'")]
    UnknownProperty(String),
    #[error("property '{name}' expects {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("metadata tag '{key}' could not be written: {reason}")]
    TagRejected { key: String, reason: String },
}

/// Failure of a single action while it was being applied.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("setting properties failed")]
    Properties(#[source] HostError),
    #[error("setting tags {keys:?} failed")]
    Tags {
        /// Keys whose write failed; `source` is the first of those failures.
        keys: Vec<String>,
        /// Keys that were written before or after the failures.
        written: Vec<String>,
        #[source]
        source: HostError,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Renders an error followed by every `source()` in its chain.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        current = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_includes_host_cause() {
        let err = ActionError::Tags {
            keys: vec!["obsolete".into()],
            written: vec![],
            source: HostError::TagRejected {
                key: "obsolete".into(),
                reason: "read-only package".into(),
            },
        };
        assert_eq!(
            error_chain(&err),
            "setting tags [\"obsolete\"] failed: metadata tag 'obsolete' could not be written: read-only package"
        );
    }
}
