//! Registry loading.
//!
//! Reads a kernel registry file (JSON, or YAML by extension), validates it
//! through the engine, runs the declared-count check and computes the
//! snapshot id. The result is immutable and indexed for lookups.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::CanonEngine;
use crate::error::{CanonError, Result};
use crate::shapes::{ConceptShape, KernelRegistryShape, ValueSetShape, ValueShape};
use crate::snapshot::{registry_snapshot_id, TaxonomyCounts};

#[derive(Debug, Clone)]
pub struct LoadedRegistry {
    registry: KernelRegistryShape,
    snapshot_id: String,
    concepts: HashMap<String, usize>,
    value_sets: HashMap<String, usize>,
    /// value set code -> value indices, in declaration order
    members: HashMap<String, Vec<usize>>,
}

impl LoadedRegistry {
    /// Index an already validated registry.
    pub fn new(registry: KernelRegistryShape) -> Self {
        let snapshot_id = registry_snapshot_id(&registry);
        let concepts = index_by_code(registry.concepts.iter().map(|c| c.code.as_str()));
        let value_sets = index_by_code(registry.value_sets.iter().map(|vs| vs.code.as_str()));
        let mut members: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, value) in registry.values.iter().enumerate() {
            members
                .entry(value.value_set_code.clone())
                .or_default()
                .push(i);
        }
        Self {
            registry,
            snapshot_id,
            concepts,
            value_sets,
            members,
        }
    }

    pub fn registry(&self) -> &KernelRegistryShape {
        &self.registry
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn counts(&self) -> TaxonomyCounts {
        TaxonomyCounts::of(&self.registry)
    }

    pub fn concept(&self, code: &str) -> Option<&ConceptShape> {
        self.concepts.get(code).map(|&i| &self.registry.concepts[i])
    }

    pub fn value_set(&self, code: &str) -> Option<&ValueSetShape> {
        self.value_sets.get(code).map(|&i| &self.registry.value_sets[i])
    }

    pub fn values_of(&self, value_set_code: &str) -> Vec<&ValueShape> {
        self.members
            .get(value_set_code)
            .map(|idx| idx.iter().map(|&i| &self.registry.values[i]).collect())
            .unwrap_or_default()
    }

    pub fn value(&self, value_set_code: &str, code: &str) -> Option<&ValueShape> {
        self.values_of(value_set_code)
            .into_iter()
            .find(|v| v.code == code)
    }
}

fn index_by_code<'a>(codes: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, code) in codes.enumerate() {
        // First declaration wins; duplicates are rejected earlier when enabled
        index.entry(code.to_string()).or_insert(i);
    }
    index
}

/// Parse registry text. `.yaml`/`.yml` paths are YAML, anything else JSON.
pub fn parse_registry_document(path: &Path, content: &str) -> Result<Value> {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(content)
            .map_err(|e| CanonError::ContractMismatch(format!("{}: {e}", path.display())))
    } else {
        serde_json::from_str(content)
            .map_err(|e| CanonError::ContractMismatch(format!("{}: {e}", path.display())))
    }
}

pub fn load_registry(path: impl AsRef<Path>, engine: &CanonEngine) -> Result<LoadedRegistry> {
    let path = path.as_ref();
    info!("Loading kernel registry from {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document = parse_registry_document(path, &content)?;

    let registry = engine
        .validate_kernel_registry(&document)
        .inspect_err(|e| warn!(path = %path.display(), error = %e, "registry rejected"))?;
    engine
        .check_counts(&registry)
        .inspect_err(|e| warn!(path = %path.display(), error = %e, "registry counts drifted"))?;

    let loaded = LoadedRegistry::new(registry);
    info!(
        snapshot_id = loaded.snapshot_id(),
        counts = %loaded.counts(),
        "kernel registry loaded"
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::{ErrorKind, ValidationErrorType};
    use std::io::Write;

    const REGISTRY_YAML: &str = r#"
version: 2.0.0
concepts:
  - code: INVOICE
    category: ENTITY
    domain: FINANCE
    description: A bill
value_sets:
  - code: INVOICE_STATUS
    domain: FINANCE
    description: Invoice lifecycle
values:
  - code: DRAFT
    value_set_code: INVOICE_STATUS
    label: Draft
    sort_order: 1
  - code: PAID
    value_set_code: INVOICE_STATUS
    label: Paid
    sort_order: 2
"#;

    fn write(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn engine() -> CanonEngine {
        CanonEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn loads_yaml_and_indexes() {
        let file = write(".yaml", REGISTRY_YAML);
        let loaded = load_registry(file.path(), &engine()).unwrap();
        assert!(loaded.snapshot_id().starts_with("snapshot:2.0.0:"));
        assert_eq!(loaded.counts().values, 2);
        assert_eq!(loaded.concept("INVOICE").unwrap().description, "A bill");
        assert!(loaded.value_set("INVOICE_STATUS").is_some());
        assert_eq!(loaded.values_of("INVOICE_STATUS").len(), 2);
        assert_eq!(loaded.value("INVOICE_STATUS", "PAID").unwrap().sort_order, Some(2));
        assert!(loaded.value("INVOICE_STATUS", "VOID").is_none());
        assert!(loaded.values_of("NOPE").is_empty());
    }

    #[test]
    fn json_and_yaml_agree_on_snapshot() {
        let yaml = write(".yml", REGISTRY_YAML);
        let doc: Value = serde_yaml::from_str(REGISTRY_YAML).unwrap();
        let json = write(".json", &doc.to_string());
        let engine = engine();
        assert_eq!(
            load_registry(yaml.path(), &engine).unwrap().snapshot_id(),
            load_registry(json.path(), &engine).unwrap().snapshot_id()
        );
    }

    #[test]
    fn declared_counts_checked_at_load() {
        let file = write(".yaml", REGISTRY_YAML);
        let engine = CanonEngine::new(EngineConfig {
            expected_counts: Some(TaxonomyCounts {
                concepts: 1,
                value_sets: 1,
                values: 3,
            }),
            ..EngineConfig::default()
        })
        .unwrap();
        let err = load_registry(file.path(), &engine).unwrap_err();
        assert_eq!(err.error_type(), Some(ValidationErrorType::RegistryCountMismatch));
    }

    #[test]
    fn invalid_registry_rejected() {
        let broken = REGISTRY_YAML.replace("sort_order: 2", "sort_order: 3");
        let file = write(".yaml", &broken);
        let err = load_registry(file.path(), &engine()).unwrap_err();
        assert_eq!(err.error_type(), Some(ValidationErrorType::NonContinuousSortOrder));
    }

    #[test]
    fn unparseable_file_is_contract_mismatch() {
        let file = write(".json", "{ not json");
        let err = load_registry(file.path(), &engine()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContractMismatch);
    }

    #[test]
    fn missing_file_is_internal() {
        let err = load_registry("/no/such/registry.json", &engine()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
