use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reader::FieldReader;
use super::{
    CanonShape, CodedShape, Domain, Jurisdiction, ShapeKind, CODE_MAX_LEN, DESCRIPTION_MAX_LEN,
};
use crate::error::{Constraint, FieldViolation};

static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2,4}$").unwrap());

/// A named enumeration of allowed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetShape {
    pub code: String,
    pub domain: Domain,
    pub description: String,
    #[serde(default)]
    pub jurisdiction: Jurisdiction,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ValueSetMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetMetadata {
    /// 2–4 uppercase letters; member value codes may be required to start
    /// with `<prefix>_` (see [`crate::naming::NamingLaw`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Any other metadata, carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ValueSetShape {
    pub fn prefix(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.prefix.as_deref())
    }
}

impl CanonShape for ValueSetShape {
    const KIND: ShapeKind = ShapeKind::ValueSet;

    fn read(input: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let before = violations.len();
        let mut r = FieldReader::new(input, path, violations);
        let code = r.required_str("code", 1, CODE_MAX_LEN);
        let domain = r.required_enum::<Domain>("domain");
        let description = r.required_str("description", 1, DESCRIPTION_MAX_LEN);
        let jurisdiction = r.optional_enum::<Jurisdiction>("jurisdiction");
        let tags = r.string_list("tags", 0, usize::MAX);

        let metadata = match r.optional_object("metadata") {
            None => None,
            Some(map) => {
                let prefix = match map.get("prefix").filter(|v| !v.is_null()) {
                    None => None,
                    Some(Value::String(p)) if PREFIX_RE.is_match(p) => Some(p.clone()),
                    Some(other) => {
                        r.push(
                            "metadata.prefix",
                            Constraint::Pattern,
                            format!("prefix must be 2-4 uppercase letters, got {other}"),
                        );
                        None
                    }
                };
                let extra = map
                    .iter()
                    .filter(|(key, _)| key.as_str() != "prefix")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                Some(ValueSetMetadata { prefix, extra })
            }
        };

        if violations.len() > before {
            return None;
        }
        Some(Self {
            code: code?,
            domain: domain?,
            description: description?,
            jurisdiction: jurisdiction.unwrap_or_default(),
            tags: tags?,
            metadata,
        })
    }
}

impl CodedShape for ValueSetShape {
    fn code(&self) -> &str {
        &self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status_set() -> Value {
        json!({
            "code": "INVOICE_STATUS",
            "domain": "FINANCE",
            "description": "Lifecycle of an invoice",
        })
    }

    #[test]
    fn jurisdiction_defaults_to_global() {
        let vs = ValueSetShape::validate(&status_set()).unwrap();
        assert_eq!(vs.jurisdiction, Jurisdiction::Global);
        assert!(vs.prefix().is_none());
    }

    #[test]
    fn accepts_prefix() {
        let mut input = status_set();
        input["metadata"] = json!({ "prefix": "INV" });
        input["jurisdiction"] = json!("REGIONAL");
        let vs = ValueSetShape::validate(&input).unwrap();
        assert_eq!(vs.prefix(), Some("INV"));
        assert_eq!(vs.jurisdiction, Jurisdiction::Regional);
    }

    #[test]
    fn rejects_bad_prefix() {
        for bad in [json!("I"), json!("INVOI"), json!("inv"), json!(7)] {
            let mut input = status_set();
            input["metadata"] = json!({ "prefix": bad });
            let err = ValueSetShape::validate(&input).unwrap_err();
            assert_eq!(err.violations()[0].field, "metadata.prefix");
        }
    }

    #[test]
    fn other_metadata_survives_revalidation() {
        let mut input = status_set();
        input["metadata"] = json!({ "prefix": "INV", "owner": "billing", "since": 2021 });
        input["tags"] = json!(["", "t".repeat(100)]);
        let vs = ValueSetShape::validate(&input).unwrap();
        let meta = vs.metadata.as_ref().unwrap();
        assert_eq!(meta.extra["owner"], "billing");
        assert_eq!(meta.extra.len(), 2);

        let out = serde_json::to_value(&vs).unwrap();
        assert_eq!(out["metadata"], input["metadata"]);
        let again = ValueSetShape::validate(&out).unwrap();
        assert_eq!(vs, again);
    }

    #[test]
    fn rejects_unknown_jurisdiction() {
        let mut input = status_set();
        input["jurisdiction"] = json!("PLANETARY");
        let err = ValueSetShape::validate(&input).unwrap_err();
        assert_eq!(err.violations()[0].constraint, Constraint::OneOf);
        assert!(err.violations()[0].message.contains("GLOBAL | REGIONAL | LOCAL"));
    }

    #[test]
    fn revalidating_output_is_identity() {
        let mut input = status_set();
        input["metadata"] = json!({ "prefix": "INV" });
        let vs = ValueSetShape::validate(&input).unwrap();
        let again = ValueSetShape::validate(&serde_json::to_value(&vs).unwrap()).unwrap();
        assert_eq!(vs, again);
    }
}
