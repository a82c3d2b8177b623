use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reader::FieldReader;
use super::{
    CanonShape, CodedShape, ConceptCategory, Domain, ShapeKind, CODE_MAX_LEN,
    DESCRIPTION_MAX_LEN,
};
use crate::error::FieldViolation;
use crate::identifier::CanonId;

/// A canonical business noun or attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptShape {
    pub code: String,
    pub category: ConceptCategory,
    pub domain: Domain,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_root: Option<CanonId>,
}

impl CanonShape for ConceptShape {
    const KIND: ShapeKind = ShapeKind::Concept;

    fn read(input: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let before = violations.len();
        let mut r = FieldReader::new(input, path, violations);
        let code = r.required_str("code", 1, CODE_MAX_LEN);
        let category = r.required_enum::<ConceptCategory>("category");
        let domain = r.required_enum::<Domain>("domain");
        let description = r.required_str("description", 1, DESCRIPTION_MAX_LEN);
        let tags = r.string_list("tags", 0, usize::MAX);
        let semantic_root = r.optional_parsed("semantic_root", CanonId::parse);

        if violations.len() > before {
            return None;
        }
        Some(Self {
            code: code?,
            category: category?,
            domain: domain?,
            description: description?,
            tags: tags?,
            semantic_root,
        })
    }
}

impl CodedShape for ConceptShape {
    fn code(&self) -> &str {
        &self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Constraint, ValidationErrorType};
    use serde_json::json;

    fn party() -> Value {
        json!({
            "code": "PARTY",
            "category": "ENTITY",
            "domain": "PARTY",
            "description": "A person or organisation",
            "tags": ["core"],
        })
    }

    #[test]
    fn accepts_minimal_concept() {
        let c = ConceptShape::validate(&party()).unwrap();
        assert_eq!(c.code, "PARTY");
        assert_eq!(c.category, ConceptCategory::Entity);
        assert_eq!(c.tags, vec!["core"]);
        assert!(c.semantic_root.is_none());
    }

    #[test]
    fn tags_default_to_empty() {
        let mut input = party();
        input.as_object_mut().unwrap().remove("tags");
        assert!(ConceptShape::validate(&input).unwrap().tags.is_empty());
    }

    #[test]
    fn tags_are_free_form() {
        let mut input = party();
        input["tags"] = json!(["x".repeat(300), ""]);
        let c = ConceptShape::validate(&input).unwrap();
        assert_eq!(c.tags.len(), 2);
        assert_eq!(c.tags[0].len(), 300);
        assert_eq!(c.tags[1], "");

        input["tags"] = json!(["ok", 7]);
        let err = ConceptShape::validate(&input).unwrap_err();
        assert_eq!(err.violations()[0].field, "tags[1]");
        assert_eq!(err.violations()[0].constraint, Constraint::Type);
    }

    #[test]
    fn reports_every_violation() {
        let input = json!({
            "code": 42,
            "category": "THING",
            "description": "",
        });
        let err = ConceptShape::validate(&input).unwrap_err();
        assert_eq!(err.error_type(), Some(ValidationErrorType::SchemaViolation));
        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["code", "category", "domain", "description"]);
        assert_eq!(err.violations()[1].constraint, Constraint::OneOf);
        assert_eq!(err.violations()[2].constraint, Constraint::Required);
        assert_eq!(err.violations()[3].constraint, Constraint::MinLength);
    }

    #[test]
    fn description_upper_bound() {
        let mut input = party();
        input["description"] = json!("x".repeat(257));
        let err = ConceptShape::validate(&input).unwrap_err();
        assert_eq!(err.violations()[0].constraint, Constraint::MaxLength);
    }

    #[test]
    fn semantic_root_must_be_canon_id() {
        let mut input = party();
        input["semantic_root"] = json!("root:party");
        let err = ConceptShape::validate(&input).unwrap_err();
        assert_eq!(err.violations()[0].field, "semantic_root");
        assert_eq!(err.violations()[0].constraint, Constraint::InvalidCharacter);

        input["semantic_root"] = json!("ROOT:PARTY");
        let c = ConceptShape::validate(&input).unwrap();
        assert_eq!(c.semantic_root.unwrap().as_str(), "ROOT:PARTY");
    }

    #[test]
    fn revalidating_output_is_identity() {
        let c = ConceptShape::validate(&party()).unwrap();
        let again = ConceptShape::validate(&serde_json::to_value(&c).unwrap()).unwrap();
        assert_eq!(c, again);
    }
}
