use thiserror::Error;

/// Main error type for ontomap
#[derive(Error, Debug)]
pub enum OntomapError {
    /// Ontology store errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM API errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// LLM response / JSON parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Customer datasource adapter errors
    #[error("Datasource error: {0}")]
    Datasource(String),

    /// Required record missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tenant scope acquisition errors
    #[error("Tenant context error: {0}")]
    TenantContext(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using OntomapError
pub type Result<T> = std::result::Result<T, OntomapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OntomapError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: OntomapError = rusqlite_err.into();
        assert!(matches!(err, OntomapError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: OntomapError = io_err.into();
        assert!(matches!(err, OntomapError::Io(_)));
    }

    #[test]
    fn test_not_found_message() {
        let err = OntomapError::NotFound("column workflow state not found: users.id".to_string());
        assert!(err.to_string().contains("users.id"));
    }
}
