//! ORM Configuration - Tunables for normalization, storage and eager loading

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Configuration shared by the normalizer, the store and the query layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// Maximum nesting depth accepted by the normalizer and by recursive
    /// eager loading
    pub max_depth: usize,

    /// Merge saved fields into existing records instead of replacing them
    pub merge_on_save: bool,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            merge_on_save: true,
        }
    }
}

impl OrmConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum nesting depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Choose between field merging and whole-record replacement on save
    pub fn with_merge_on_save(mut self, merge: bool) -> Self {
        self.merge_on_save = merge;
        self
    }

    /// Parse a configuration from a JSON document; missing keys keep their defaults
    pub fn from_json(source: &str) -> ModelResult<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ModelResult<()> {
        if self.max_depth == 0 {
            return Err(ModelError::Configuration(
                "max_depth must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrmConfig::default();
        assert_eq!(config.max_depth, 32);
        assert!(config.merge_on_save);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = OrmConfig::new().with_max_depth(4).with_merge_on_save(false);
        assert_eq!(config.max_depth, 4);
        assert!(!config.merge_on_save);
    }

    #[test]
    fn test_from_json_keeps_defaults() {
        let config = OrmConfig::from_json(r#"{ "max_depth": 8 }"#).unwrap();
        assert_eq!(config.max_depth, 8);
        assert!(config.merge_on_save);
    }

    #[test]
    fn test_from_json_rejects_zero_depth() {
        let err = OrmConfig::from_json(r#"{ "max_depth": 0 }"#).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_from_json_rejects_malformed_input() {
        assert!(matches!(
            OrmConfig::from_json("max_depth = 3"),
            Err(ModelError::Serialization(_))
        ));
    }
}
