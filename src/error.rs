use std::io;

use thiserror::Error;

/// Failures of the announcement core.
/// None of them is fatal to the process: each one rejects a single
/// operation or defers a single cycle.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("failed to persist the configuration overrides: {0}")]
    Persistence(#[source] io::Error),
    #[error("failed to load the configuration: {0}")]
    Load(String),
    #[error("platform communication failed while trying to {action}: {source}")]
    PlatformCommunication {
        action: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("the `{0}` template is missing from the configuration")]
    MissingTemplate(String),
    #[error("a confirmation cycle is already outstanding")]
    CycleOutstanding,
}

impl Error {
    pub fn invalid<K: ToString, V: ToString, R: Into<String>>(key: K, value: V, reason: R) -> Self {
        Error::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn platform<A: Into<String>>(action: A, source: anyhow::Error) -> Self {
        Error::PlatformCommunication {
            action: action.into(),
            source: source.into(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Load(err.to_string())
    }
}
