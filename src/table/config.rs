//! Table configuration file parsing.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::error::TableError;
use super::guard::FailurePolicy;

/// Per-table settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    /// Display name used in logs and error messages.
    pub name: String,
    /// What the reentrancy guard does after a failed handler call.
    pub failure_policy: FailurePolicy,
    /// Whether `objects()` results are kept as the table's cached names.
    pub cache_names: bool,
}

impl TableConfig {
    pub fn new() -> Self {
        TableConfig {
            name: "UserDefinedDatabase".to_string(),
            failure_policy: FailurePolicy::default(),
            cache_names: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_cache_names(mut self, cache_names: bool) -> Self {
        self.cache_names = cache_names;
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// Expected format:
    /// ```toml
    /// name = "sales"
    /// failure_policy = "latch-active-on-failure"
    /// cache_names = false
    /// ```
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let content = fs::read_to_string(path).map_err(|e| {
            TableError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing keys keep their defaults.
    pub fn parse(content: &str) -> Result<Self, TableError> {
        toml::from_str(content).map_err(|e| TableError::Config(e.to_string()))
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = TableConfig::parse("").unwrap();
        assert_eq!(config, TableConfig::default());
        assert_eq!(config.failure_policy, FailurePolicy::RestoreAlways);
        assert!(config.cache_names);
    }

    #[test]
    fn test_parse_full_config() {
        let config = TableConfig::parse(
            r#"
            name = "sales"
            failure_policy = "latch-active-on-failure"
            cache_names = false
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "sales");
        assert_eq!(config.failure_policy, FailurePolicy::LatchActiveOnFailure);
        assert!(!config.cache_names);
    }

    #[test]
    fn test_parse_rejects_unknown_policy() {
        let err = TableConfig::parse(r#"failure_policy = "sometimes""#).unwrap_err();
        assert!(matches!(err, TableError::Config(_)));
        assert!(TableConfig::parse("colour = 3").is_err());
    }
}
