use blescale_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// Spread or plausibility never satisfied within the retry budget.
    #[error("no stable reading after {attempts} attempts")]
    NoStableReading { attempts: u32 },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("persist failure: {0}")]
    PersistFailure(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("radio error: {0}")]
    Radio(String),
}

impl From<ConfigError> for NodeError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue { key, value, .. } => NodeError::InvalidValue {
                key: key.to_owned(),
                value,
            },
            ConfigError::Persist(msg) => NodeError::PersistFailure(msg),
            ConfigError::Io(io) => NodeError::PersistFailure(io.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing load cell")]
    MissingLoadCell,
    #[error("missing radio")]
    MissingRadio,
    #[error("missing config storage")]
    MissingStorage,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
