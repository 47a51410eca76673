use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("persist failure: {0}")]
    Persist(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
