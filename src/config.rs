use crate::accumulator::net::NettingStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Engine settings. Every field has a default, so `{}` is a valid config.
///
/// ```json
/// { "close_out_strategy": "delta_only" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Netting algebra for the close-out ledger. Time slots always keep
    /// totals and are not affected.
    pub close_out_strategy: NettingStrategy,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.close_out_strategy, NettingStrategy::TotalsBased);
    }

    #[test]
    fn test_delta_only_selectable() {
        let config = EngineConfig::from_json_str(r#"{"close_out_strategy":"delta_only"}"#).unwrap();
        assert_eq!(config.close_out_strategy, NettingStrategy::DeltaOnly);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = EngineConfig::from_json_str(r#"{"strategy":"delta_only"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_json_file("/nonexistent/engine.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/engine.json"));
    }
}
