use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Missing required column '{column}' in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("Feature column mismatch: {0}")]
    FeatureMismatch(String),

    #[error("No {variable} data between {start} and {end}")]
    NoMatch {
        variable: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Expected exactly one {variable} record, found {count}")]
    AmbiguousMatch { variable: String, count: usize },

    #[error("Invalid model artifact {artifact}: {message}")]
    InvalidArtifact { artifact: String, message: String },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Prediction worker error: {0}")]
    Worker(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub fn missing_column(column: impl Into<String>, source_name: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            column: column.into(),
            source_name: source_name.into(),
        }
    }

    pub fn invalid_artifact(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::InvalidArtifact {
            artifact: artifact.into(),
            message: message.into(),
        }
    }
}
