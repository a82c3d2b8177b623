use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reader::FieldReader;
use super::{CanonShape, ConceptShape, Domain, ShapeKind, ValueSetShape, ValueShape};
use crate::error::FieldViolation;
use crate::identifier::SchemaVersion;

pub const PACK_ID_MAX_LEN: usize = 64;
pub const PACK_NAME_MAX_LEN: usize = 128;
pub const PACK_DESCRIPTION_MAX_LEN: usize = 512;

static PACK_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").unwrap());

/// A partial contribution of concepts, value sets and values, merged into
/// the kernel registry later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackShape {
    pub id: String,
    pub name: String,
    pub version: SchemaVersion,
    pub domain: Domain,
    pub description: String,
    #[serde(default)]
    pub concepts: Vec<ConceptShape>,
    #[serde(default)]
    pub value_sets: Vec<ValueSetShape>,
    #[serde(default)]
    pub values: Vec<ValueShape>,
}

impl CanonShape for PackShape {
    const KIND: ShapeKind = ShapeKind::Pack;

    fn read(input: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let before = violations.len();
        let mut r = FieldReader::new(input, path, violations);
        let id = r.required_matching(
            "id",
            PACK_ID_MAX_LEN,
            |s| PACK_ID_RE.is_match(s),
            "lowercase-kebab-case",
        );
        let name = r.required_str("name", 1, PACK_NAME_MAX_LEN);
        let version = r.required_parsed("version", SchemaVersion::parse);
        let domain = r.required_enum::<Domain>("domain");
        let description = r.required_str("description", 1, PACK_DESCRIPTION_MAX_LEN);
        let concepts = r.shape_list("concepts", ConceptShape::read);
        let value_sets = r.shape_list("value_sets", ValueSetShape::read);
        let values = r.shape_list("values", ValueShape::read);

        if violations.len() > before {
            return None;
        }
        Some(Self {
            id: id?,
            name: name?,
            version: version?,
            domain: domain?,
            description: description?,
            concepts: concepts?,
            value_sets: value_sets?,
            values: values?,
        })
    }
}
