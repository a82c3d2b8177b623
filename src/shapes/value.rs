use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reader::FieldReader;
use super::{CanonShape, CodedShape, ShapeKind, CODE_MAX_LEN};
use crate::error::FieldViolation;

pub const LABEL_MAX_LEN: usize = 128;
pub const VALUE_DESCRIPTION_MAX_LEN: usize = 512;

/// One member of a value set.
///
/// `value_set_code` is only checked for presence here; whether it points at
/// a real value set is a registry-level rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueShape {
    pub code: String,
    pub value_set_code: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl CanonShape for ValueShape {
    const KIND: ShapeKind = ShapeKind::Value;

    fn read(input: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let before = violations.len();
        let mut r = FieldReader::new(input, path, violations);
        let code = r.required_str("code", 1, CODE_MAX_LEN);
        let value_set_code = r.required_str("value_set_code", 1, CODE_MAX_LEN);
        let label = r.required_str("label", 1, LABEL_MAX_LEN);
        let description = r.optional_str("description", 0, VALUE_DESCRIPTION_MAX_LEN);
        let sort_order = r.optional_i64("sort_order");
        let metadata = r
            .optional_object("metadata")
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        if violations.len() > before {
            return None;
        }
        Some(Self {
            code: code?,
            value_set_code: value_set_code?,
            label: label?,
            description,
            sort_order,
            metadata,
        })
    }
}

impl CodedShape for ValueShape {
    fn code(&self) -> &str {
        &self.code
    }
}
