//! Errors for the AIS tracker
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SailtrackError {
    #[error("Upstream rejected the API key: {0}")]
    AuthenticationError(String),

    #[error("Stream connection error: {0}")]
    ConnectionError(String),

    #[error("Failed to parse AIS message: {0}")]
    ParseError(String),

    #[error("Database error")]
    StorageError(#[from] sqlx::Error),

    #[error("Database schema error: {0}")]
    SchemaError(String),

    #[error("No data for vessel")]
    NotFound,

    #[error("Unprocessable data: {0}")]
    UnprocessableData(String),

    #[error("Map rendering failed: {0}")]
    RenderError(#[from] crate::render::RenderError),

    #[error("Invalid MMSI: {0}")]
    InvalidMmsi(String),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    TaskError(String),

    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for SailtrackError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SailtrackError::ConnectionError(err.to_string())
    }
}
