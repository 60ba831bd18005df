//! Error types for the ORM system
//!
//! Configuration errors surface while models and relations are declared and
//! are never retried. Normalization errors abort a whole `save`. Lookups that
//! simply find nothing are not errors: they resolve to null or an empty
//! collection.

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Invalid model or relation declaration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A model type that was never registered
    #[error("Model '{0}' is not registered")]
    UnknownModel(String),

    /// Relationship lookup or construction failed
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// A record reached the normalizer without a usable primary key
    #[error("Record of '{entity}' at '{path}' is missing its primary key")]
    MissingPrimaryKey { entity: String, path: String },

    /// Payload could not be normalized
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// Query building error
    #[error("Query error: {0}")]
    Query(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ModelError {
    /// Returns true for errors raised while declaring models and relations
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::UnknownModel(_))
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_primary_key_message() {
        let err = ModelError::MissingPrimaryKey {
            entity: "posts".to_string(),
            path: "users[0].posts[1]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Record of 'posts' at 'users[0].posts[1]' is missing its primary key"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(ModelError::Configuration("bad keys".into()).is_configuration());
        assert!(ModelError::UnknownModel("ghosts".into()).is_configuration());
        assert!(!ModelError::Query("bad".into()).is_configuration());
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: ModelError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ModelError::Serialization(_)));
    }
}
