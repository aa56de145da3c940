use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[cfg(feature = "backend")]
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {status} for table '{table}': {body}")]
    BackendStatus {
        table: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected payload from table '{table}': {details}")]
    UnexpectedPayload { table: String, details: String },

    #[error("Row source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KpiError>;
