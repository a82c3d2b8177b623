//! Engine configuration
//!
//! Loads `EngineConfig` from a YAML file. Every field has a default, so an
//! empty file (or no file) yields the stock engine.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CanonError, Result};
use crate::snapshot::TaxonomyCounts;

pub const CONFIG_PATH_ENV: &str = "CANON_CONFIG_PATH";
pub const CACHE_ENABLED_ENV: &str = "CANON_CACHE_ENABLED";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub naming: NamingConfig,
    pub adapter: AdapterConfig,
    /// Declared taxonomy size, checked once at registry load.
    pub expected_counts: Option<TaxonomyCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub concept_capacity: usize,
    pub value_set_capacity: usize,
    pub value_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let capacities = CacheCapacities::DEFAULT;
        Self {
            enabled: true,
            concept_capacity: capacities.concepts.get(),
            value_set_capacity: capacities.value_sets.get(),
            value_capacity: capacities.values.get(),
        }
    }
}

/// Validated per-kind LRU capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCapacities {
    pub concepts: NonZeroUsize,
    pub value_sets: NonZeroUsize,
    pub values: NonZeroUsize,
}

impl CacheCapacities {
    pub const DEFAULT: Self = Self {
        concepts: non_zero_or_min(500),
        value_sets: non_zero_or_min(200),
        values: non_zero_or_min(1000),
    };
}

const fn non_zero_or_min(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => NonZeroUsize::MIN,
    }
}

impl CacheConfig {
    pub fn capacities(&self) -> Result<CacheCapacities> {
        let non_zero = |name: &str, n: usize| {
            NonZeroUsize::new(n).ok_or_else(|| {
                CanonError::ContractMismatch(format!("cache.{name} must be greater than zero"))
            })
        };
        Ok(CacheCapacities {
            concepts: non_zero("concept_capacity", self.concept_capacity)?,
            value_sets: non_zero("value_set_capacity", self.value_set_capacity)?,
            values: non_zero("value_capacity", self.value_capacity)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub enforce_value_prefixes: bool,
}

/// Timeout and retry policy for the persistent second-tier cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            max_retries: 2,
        }
    }
}

impl AdapterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl EngineConfig {
    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading engine configuration from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
            .map_err(|e| CanonError::ContractMismatch(format!("{}: {e}", path.display())))
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty document deserialises as unit, not as an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Load from `CANON_CONFIG_PATH` if set, else defaults. `CANON_CACHE_ENABLED`
    /// overrides `cache.enabled` either way.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        if let Ok(flag) = std::env::var(CACHE_ENABLED_ENV) {
            config.cache.enabled = parse_flag(&flag).ok_or_else(|| {
                CanonError::ContractMismatch(format!(
                    "{CACHE_ENABLED_ENV}='{flag}' is not a boolean"
                ))
            })?;
        }
        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_capacities() {
        let c = EngineConfig::default();
        assert!(c.cache.enabled);
        assert_eq!(c.cache.concept_capacity, 500);
        assert_eq!(c.cache.value_set_capacity, 200);
        assert_eq!(c.cache.value_capacity, 1000);
        assert!(!c.naming.enforce_value_prefixes);
        assert_eq!(c.adapter.timeout(), Duration::from_secs(2));
        assert!(c.expected_counts.is_none());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let c = EngineConfig::from_yaml("cache:\n  value_capacity: 10\nnaming:\n  enforce_value_prefixes: true\n")
            .unwrap();
        assert_eq!(c.cache.value_capacity, 10);
        assert_eq!(c.cache.concept_capacity, 500);
        assert!(c.naming.enforce_value_prefixes);
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(EngineConfig::from_yaml("  \n").unwrap(), EngineConfig::default());
    }

    #[test]
    fn expected_counts_from_yaml() {
        let c = EngineConfig::from_yaml("expected_counts:\n  concepts: 3\n  value_sets: 2\n  values: 9\n")
            .unwrap();
        assert_eq!(c.expected_counts.unwrap().values, 9);
    }

    #[test]
    fn default_capacities_agree_with_default_config() {
        assert_eq!(CacheConfig::default().capacities().unwrap(), CacheCapacities::DEFAULT);
    }

    #[test]
    fn zero_capacity_rejected() {
        let cache = CacheConfig {
            value_set_capacity: 0,
            ..CacheConfig::default()
        };
        let err = cache.capacities().unwrap_err();
        assert!(matches!(err, CanonError::ContractMismatch(_)));
        assert!(err.to_string().contains("value_set_capacity"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "adapter:\n  timeout_ms: 50\n  max_retries: 0").unwrap();
        let c = EngineConfig::load(file.path()).unwrap();
        assert_eq!(c.adapter.timeout_ms, 50);
        assert_eq!(c.adapter.max_retries, 0);
    }

    #[test]
    fn missing_file_is_internal() {
        let err = EngineConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, CanonError::Internal(_)));
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag("FALSE"), Some(false));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }
}
