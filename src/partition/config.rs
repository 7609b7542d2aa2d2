//! Partition configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Property keys a run writes its results under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyKeys {
    /// Integer level of the node.
    pub level: String,
    /// Token of the run that last visited the node.
    pub visited: String,
    /// Token of the run that last inverted the node (lazy strategy only).
    pub inverted: String,
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self {
            level: "level".into(),
            visited: "visited".into(),
            inverted: "inverted".into(),
        }
    }
}

/// Configuration for a [`crate::Graph`]'s partition runs.
///
/// ```rust
/// use dag_partition::PartitionConfig;
///
/// let config = PartitionConfig::from_json(
///     r#"{ "keys": { "level": "_level", "visited": "_visited", "inverted": "_inverted" } }"#,
/// ).unwrap();
/// assert_eq!(config.keys.level, "_level");
/// assert_eq!(config.token_prefix, "run");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub keys: PropertyKeys,
    /// Prefix of issued run tokens.
    pub token_prefix: String,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            keys: PropertyKeys::default(),
            token_prefix: "run".into(),
        }
    }
}

impl PartitionConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let keys = &self.keys;
        if keys.level.is_empty() || keys.visited.is_empty() || keys.inverted.is_empty() {
            return Err(Error::Config("property keys must not be empty".into()));
        }
        if keys.level == keys.visited || keys.level == keys.inverted || keys.visited == keys.inverted {
            return Err(Error::Config(format!(
                "property keys must be distinct, got level={:?} visited={:?} inverted={:?}",
                keys.level, keys.visited, keys.inverted,
            )));
        }
        if self.token_prefix.is_empty() {
            return Err(Error::Config("token_prefix must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PartitionConfig::default();
        assert_eq!(config.keys.level, "level");
        assert_eq!(config.keys.visited, "visited");
        assert_eq!(config.keys.inverted, "inverted");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PartitionConfig::from_json(r#"{ "token_prefix": "pipeline" }"#).unwrap();
        assert_eq!(config.token_prefix, "pipeline");
        assert_eq!(config.keys, PropertyKeys::default());
    }

    #[test]
    fn test_rejects_clashing_keys() {
        let err = PartitionConfig::from_json(r#"{ "keys": { "level": "x", "visited": "x" } }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(PartitionConfig::from_json("{"), Err(Error::Config(_))));
    }
}
