use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reader::FieldReader;
use super::{CanonShape, ConceptShape, ShapeKind, ValueSetShape, ValueShape};
use crate::error::FieldViolation;
use crate::identifier::SchemaVersion;

/// Invariants a kernel registry declares as enforced. All default to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFlags {
    #[serde(default = "enabled")]
    pub unique_codes: bool,
    #[serde(default = "enabled")]
    pub referential_integrity: bool,
    #[serde(default = "enabled")]
    pub min_values_per_set: bool,
    #[serde(default = "enabled")]
    pub continuous_sort_order: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ValidationFlags {
    fn default() -> Self {
        Self {
            unique_codes: true,
            referential_integrity: true,
            min_values_per_set: true,
            continuous_sort_order: true,
        }
    }
}

/// The merged whole: every concept, value set and value of the taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelRegistryShape {
    pub version: SchemaVersion,
    #[serde(default)]
    pub concepts: Vec<ConceptShape>,
    #[serde(default)]
    pub value_sets: Vec<ValueSetShape>,
    #[serde(default)]
    pub values: Vec<ValueShape>,
    #[serde(default)]
    pub validation: ValidationFlags,
}

impl CanonShape for KernelRegistryShape {
    const KIND: ShapeKind = ShapeKind::KernelRegistry;

    fn read(input: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let before = violations.len();
        let mut r = FieldReader::new(input, path, violations);
        let version = r.required_parsed("version", SchemaVersion::parse);
        let concepts = r.shape_list("concepts", ConceptShape::read);
        let value_sets = r.shape_list("value_sets", ValueSetShape::read);
        let values = r.shape_list("values", ValueShape::read);

        let validation = match r.nested("validation") {
            None => ValidationFlags::default(),
            Some(block) => {
                let path = r.field_path("validation");
                let mut flags = FieldReader::new(block, &path, r.violations_mut());
                ValidationFlags {
                    unique_codes: flags.bool_or("unique_codes", true),
                    referential_integrity: flags.bool_or("referential_integrity", true),
                    min_values_per_set: flags.bool_or("min_values_per_set", true),
                    continuous_sort_order: flags.bool_or("continuous_sort_order", true),
                }
            }
        };

        if violations.len() > before {
            return None;
        }
        Some(Self {
            version: version?,
            concepts: concepts?,
            value_sets: value_sets?,
            values: values?,
            validation,
        })
    }
}
