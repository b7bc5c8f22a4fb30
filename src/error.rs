use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeppyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog processing failed: {0}")]
    Catalog(String),

    #[error("Registry lookup failed: {0}")]
    Registry(String),

    #[error("External command failed: {0}")]
    Process(String),

    #[error("Source control operation failed: {0}")]
    SourceControl(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Path validation failed: {0}")]
    PathValidation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DeppyError>;
