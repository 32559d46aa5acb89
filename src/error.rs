use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleaningError {
    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Row {row}: column '{column}' holds non-numeric value '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Invalid artifact reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Artifact {artifact} is corrupt: {reason}")]
    CorruptArtifact { artifact: String, reason: String },

    #[error("Artifact {artifact} has {count} files, expected exactly one")]
    UnexpectedFileCount { artifact: String, count: usize },

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),
}

pub type Result<T> = std::result::Result<T, CleaningError>;
