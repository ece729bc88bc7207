use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ValidationError(String),
    SourceNotFound(String),
    SourceReadError(String),
    SchemaError(String),
    InsertError(String),
    DatabaseError(String),
    EmbeddingError(String),
    ConfigError(String),
    IoError(String),
}

impl AppError {
    /// Short machine-readable name used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal",
            AppError::NotFound(_) => "not_found",
            AppError::ValidationError(_) => "validation",
            AppError::SourceNotFound(_) => "source_not_found",
            AppError::SourceReadError(_) => "source_read",
            AppError::SchemaError(_) => "schema",
            AppError::InsertError(_) => "insert",
            AppError::DatabaseError(_) => "database",
            AppError::EmbeddingError(_) => "embedding",
            AppError::ConfigError(_) => "config",
            AppError::IoError(_) => "io",
        }
    }

    /// True for failures of the backing stores or the model runtime, as
    /// opposed to problems with the caller's input.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseError(_)
                | AppError::EmbeddingError(_)
                | AppError::IoError(_)
                | AppError::Internal(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::SourceNotFound(msg) => write!(f, "Source not found: {}", msg),
            AppError::SourceReadError(msg) => write!(f, "Source read error: {}", msg),
            AppError::SchemaError(msg) => write!(f, "Schema error: {}", msg),
            AppError::InsertError(msg) => write!(f, "Insert error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::EmbeddingError(msg) => write!(f, "Embedding error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON serialization failed: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
