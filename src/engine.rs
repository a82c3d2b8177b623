//! Engine context.
//!
//! `CanonEngine` owns everything a validation call may touch: the naming
//! configuration, the result cache and the monitoring hooks. Build one at
//! startup and share it (`Arc<CanonEngine>`); build a fresh one per test.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{input_digest, Cacheable, ShapeCache};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::manifest::{self, Manifest, ManifestCreateInput, ManifestDefinition};
use crate::monitor::{MonitoringHooks, PerformanceSample, TrackedError};
use crate::naming::NamingLaw;
use crate::shapes::{ConceptShape, KernelRegistryShape, PackShape, ValueSetShape, ValueShape};
use crate::snapshot::{verify_counts, TaxonomyCounts};
use crate::validate::{validate_coded, validate_pack_with, validate_registry_with};

#[derive(Debug)]
pub struct CanonEngine {
    config: EngineConfig,
    cache: Arc<ShapeCache>,
    naming: NamingLaw,
    hooks: MonitoringHooks,
}

impl CanonEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let cache = Arc::new(ShapeCache::from_config(&config.cache)?);
        Ok(Self::with_cache(config, cache))
    }

    /// Engine over an existing cache, e.g. one also fronting a
    /// [`TieredShapeCache`](crate::adapter::TieredShapeCache).
    pub fn with_cache(config: EngineConfig, cache: Arc<ShapeCache>) -> Self {
        let naming = NamingLaw::new(config.naming.enforce_value_prefixes);
        info!(
            cache_enabled = cache.is_enabled(),
            enforce_value_prefixes = naming.enforce_value_prefixes,
            "canon engine initialised"
        );
        Self {
            config,
            cache,
            naming,
            hooks: MonitoringHooks::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::new(EngineConfig::from_env()?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ShapeCache> {
        &self.cache
    }

    pub fn naming(&self) -> &NamingLaw {
        &self.naming
    }

    pub fn hooks(&self) -> &MonitoringHooks {
        &self.hooks
    }

    // ── Shapes ───────────────────────────────────────────────────

    pub fn validate_concept(&self, input: &Value) -> Result<Arc<ConceptShape>> {
        self.observe("validate_concept", || self.cached(input))
    }

    pub fn validate_value_set(&self, input: &Value) -> Result<Arc<ValueSetShape>> {
        self.observe("validate_value_set", || self.cached(input))
    }

    pub fn validate_value(&self, input: &Value) -> Result<Arc<ValueShape>> {
        self.observe("validate_value", || self.cached(input))
    }

    pub fn validate_pack(&self, input: &Value) -> Result<PackShape> {
        self.observe("validate_pack", || {
            validate_pack_with(&self.naming, input).map(|pack| (pack, false))
        })
    }

    pub fn validate_kernel_registry(&self, input: &Value) -> Result<KernelRegistryShape> {
        self.observe("validate_kernel_registry", || {
            validate_registry_with(&self.naming, input).map(|reg| (reg, false))
        })
    }

    /// Compare live counts against `expected_counts`, if configured.
    pub fn check_counts(&self, registry: &KernelRegistryShape) -> Result<()> {
        let Some(declared) = &self.config.expected_counts else {
            return Ok(());
        };
        self.observe("check_counts", || {
            verify_counts(&TaxonomyCounts::of(registry), declared).map(|()| ((), false))
        })
    }

    // ── Manifests ────────────────────────────────────────────────

    pub fn validate_manifest_definition(&self, input: &Value) -> Result<ManifestDefinition> {
        self.observe("validate_manifest_definition", || {
            manifest::validate_manifest_definition(input).map(|d| (d, false))
        })
    }

    pub fn validate_manifest(&self, input: &Value) -> Result<Manifest> {
        self.observe("validate_manifest", || {
            manifest::validate_manifest(input).map(|m| (m, false))
        })
    }

    pub fn validate_manifest_create_input(&self, input: &Value) -> Result<ManifestCreateInput> {
        self.observe("validate_manifest_create_input", || {
            manifest::validate_manifest_create_input(input).map(|c| (c, false))
        })
    }

    // ── Internals ────────────────────────────────────────────────

    /// Cache-backed validation of a coded shape. A hit needs both the same
    /// cache key and byte-identical (canonical) input.
    fn cached<T: Cacheable>(&self, input: &Value) -> Result<(Arc<T>, bool)> {
        let digest = self.cache.is_enabled().then(|| input_digest(input));
        if let (Some(key), Some(digest)) = (T::input_key(input), &digest) {
            if let Some(hit) = self.cache.get_matching::<T>(&key, digest) {
                return Ok((hit, true));
            }
        }

        let shape = Arc::new(validate_coded::<T>(&self.naming, input)?);
        if let Some(digest) = digest {
            self.cache.store_with_digest(Arc::clone(&shape), digest);
        }
        Ok((shape, false))
    }

    fn observe<T>(
        &self,
        operation: &'static str,
        run: impl FnOnce() -> Result<(T, bool)>,
    ) -> Result<T> {
        let started = Instant::now();
        let outcome = run();
        let duration = started.elapsed();

        let cache_hit = matches!(outcome, Ok((_, true)));
        self.hooks.performance_measured(&PerformanceSample {
            operation,
            duration,
            cache_hit,
            success: outcome.is_ok(),
            at: Utc::now(),
        });

        match outcome {
            Ok((value, _)) => {
                debug!(operation, cache_hit, elapsed_us = duration.as_micros() as u64, "validation passed");
                Ok(value)
            }
            Err(e) => {
                debug!(operation, kind = %e.kind(), error = %e, "validation failed");
                self.hooks.error_tracked(&TrackedError::from_error(operation, &e));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::error::ValidationErrorType;
    use crate::monitor::RecordingSink;
    use serde_json::json;

    fn engine() -> CanonEngine {
        CanonEngine::new(EngineConfig::default()).unwrap()
    }

    fn open() -> Value {
        json!({ "code": "OPEN", "value_set_code": "STATUS", "label": "Open" })
    }

    #[test]
    fn repeated_identical_input_hits_cache() {
        let engine = engine();
        let a = engine.validate_value(&open()).unwrap();
        let b = engine.validate_value(&open()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let stats = engine.cache().stats().values;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn changed_input_with_same_code_revalidates() {
        let engine = engine();
        engine.validate_value(&open()).unwrap();
        let mut changed = open();
        changed["label"] = json!("");
        assert!(engine.validate_value(&changed).unwrap_err().is_structural());
    }

    #[test]
    fn disabled_cache_still_validates() {
        let config = EngineConfig {
            cache: CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
            ..EngineConfig::default()
        };
        let engine = CanonEngine::new(config).unwrap();
        let a = engine.validate_value(&open()).unwrap();
        let b = engine.validate_value(&open()).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(engine.cache().stats().total_size(), 0);
    }

    #[test]
    fn naming_failures_are_never_cached() {
        let engine = engine();
        let bad = json!({ "code": "open", "value_set_code": "STATUS", "label": "Open" });
        assert!(engine.validate_value(&bad).is_err());
        assert!(!engine.cache().contains::<ValueShape>("STATUS:open"));
    }

    #[test]
    fn shared_value_code_cached_per_set() {
        let engine = engine();
        let phase = json!({ "code": "OPEN", "value_set_code": "PHASE", "label": "Open" });
        for _ in 0..2 {
            engine.validate_value(&open()).unwrap();
            engine.validate_value(&phase).unwrap();
        }
        let stats = engine.cache().stats().values;
        assert_eq!(stats.size, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert!(engine.cache().contains::<ValueShape>("PHASE:OPEN"));
    }

    #[test]
    fn hooks_see_every_call() {
        let engine = engine();
        let sink = Arc::new(RecordingSink::default());
        engine.hooks().subscribe(sink.clone());

        engine.validate_value(&open()).unwrap();
        engine.validate_value(&open()).unwrap();
        let _ = engine.validate_concept(&json!({ "code": "PARTY" }));

        let samples = sink.samples();
        assert_eq!(samples.len(), 3);
        assert!(!samples[0].cache_hit);
        assert!(samples[1].cache_hit);
        assert!(!samples[2].success);

        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].operation, "validate_concept");
        assert_eq!(errors[0].error_type, Some(ValidationErrorType::SchemaViolation));
    }

    #[test]
    fn count_check_uses_configured_totals() {
        let registry =
            crate::validate::validate_kernel_registry(&json!({ "version": "1.0.0" })).unwrap();
        let engine = engine();
        assert!(engine.check_counts(&registry).is_ok());

        let engine = CanonEngine::new(EngineConfig {
            expected_counts: Some(TaxonomyCounts {
                concepts: 1,
                value_sets: 0,
                values: 0,
            }),
            ..EngineConfig::default()
        })
        .unwrap();
        let err = engine.check_counts(&registry).unwrap_err();
        assert_eq!(err.error_type(), Some(ValidationErrorType::RegistryCountMismatch));
    }
}
