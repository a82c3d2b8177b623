//! Naming law: casing and prefix conventions on top of structural validity.
//!
//! Shape contracts accept any non-empty code so they can be reused where
//! colons and hyphens are legal. Registry members must additionally be
//! UPPERCASE_SNAKE_CASE. Failures carry a naming `error_type`, never
//! `SCHEMA_VIOLATION`, so callers can tell "malformed" from "not canon".

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use crate::error::{CanonError, Result, ValidationErrorType};
use crate::shapes::{CodedShape, ShapeKind, ValueSetShape, ValueShape};

pub const UPPER_SNAKE_CASE_PATTERN: &str = r"^[A-Z][A-Z0-9_]*$";

static UPPER_SNAKE_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(UPPER_SNAKE_CASE_PATTERN).unwrap());

pub fn is_upper_snake_case(code: &str) -> bool {
    UPPER_SNAKE_CASE_RE.is_match(code)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamingLaw {
    /// Require value codes to start with `<PREFIX>_` when their value set
    /// declares `metadata.prefix`.
    pub enforce_value_prefixes: bool,
}

impl NamingLaw {
    pub fn new(enforce_value_prefixes: bool) -> Self {
        Self {
            enforce_value_prefixes,
        }
    }

    /// Casing check for any coded shape.
    pub fn check<S: CodedShape>(&self, shape: &S) -> Result<()> {
        check_code(S::KIND, shape.code())
    }

    /// Prefix convention across a scope. No-op unless enabled.
    ///
    /// Values pointing at an unknown set are skipped; referential integrity
    /// reports those.
    pub fn check_prefixes(&self, value_sets: &[ValueSetShape], values: &[ValueShape]) -> Result<()> {
        if !self.enforce_value_prefixes {
            return Ok(());
        }
        let prefixes: HashMap<&str, &str> = value_sets
            .iter()
            .filter_map(|vs| vs.prefix().map(|p| (vs.code.as_str(), p)))
            .collect();

        for value in values {
            let Some(prefix) = prefixes.get(value.value_set_code.as_str()) else {
                continue;
            };
            let expected = format!("{prefix}_");
            if !value.code.starts_with(&expected) {
                return Err(CanonError::validation(
                    ValidationErrorType::InvalidValuePrefix,
                    format!(
                        "Value code '{}' in value set '{}' must start with '{expected}'",
                        value.code, value.value_set_code
                    ),
                    json!({
                        "code": value.code,
                        "value_set_code": value.value_set_code,
                        "prefix": prefix,
                    }),
                ));
            }
        }
        Ok(())
    }
}

fn check_code(kind: ShapeKind, code: &str) -> Result<()> {
    if is_upper_snake_case(code) {
        return Ok(());
    }
    let (error_type, label) = match kind {
        ShapeKind::Concept => (ValidationErrorType::InvalidConceptCode, "Concept"),
        ShapeKind::ValueSet => (ValidationErrorType::InvalidValuesetCode, "Value set"),
        _ => (ValidationErrorType::InvalidValueCode, "Value"),
    };
    Err(CanonError::validation(
        error_type,
        format!("{label} code '{code}' must be UPPERCASE_SNAKE_CASE ({UPPER_SNAKE_CASE_PATTERN})"),
        json!({ "code": code }),
    ))
}
