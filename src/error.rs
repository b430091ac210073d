use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ArloError {
    #[error("Mode {mode} is not recognised for location {location_id}")]
    UnknownMode { location_id: String, mode: String },

    #[error("Cloud backend request failed: {0}")]
    Backend(String),

    #[error("Discovery snapshot is missing {0}")]
    MissingField(&'static str),

    #[error("Malformed resource event: {0}")]
    InvalidEvent(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArloError>;
