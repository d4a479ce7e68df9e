//! Application-wide error types.

use std::time::Duration;

use thiserror::Error;

use crate::catalog::CatalogError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No API key configured")]
    MissingCredential,

    #[error("Manual check is cooling down, {}s remaining", remaining.as_secs())]
    CoolingDown { remaining: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooling_down_message() {
        let err = Error::CoolingDown {
            remaining: Duration::from_secs(12),
        };
        assert_eq!(err.to_string(), "Manual check is cooling down, 12s remaining");
    }

    #[test]
    fn test_catalog_error_converts() {
        let err: Error = CatalogError::NotFound(42).into();
        assert!(matches!(err, Error::Catalog(CatalogError::NotFound(42))));
    }
}
