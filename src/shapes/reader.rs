//! Field reader for untyped shape input.
//!
//! Every accessor records a violation instead of returning early, so a
//! single pass over the input reports all broken fields.

use std::str::FromStr;

use serde_json::{Map, Value};
use strum::VariantNames;

use crate::error::{Constraint, FieldViolation};
use crate::identifier::IdentifierError;

pub(crate) type ReadFn<T> = fn(&Value, &str, &mut Vec<FieldViolation>) -> Option<T>;

pub(crate) struct FieldReader<'v, 'e> {
    object: Option<&'v Map<String, Value>>,
    path: String,
    violations: &'e mut Vec<FieldViolation>,
}

impl<'v, 'e> FieldReader<'v, 'e> {
    pub fn new(input: &'v Value, path: &str, violations: &'e mut Vec<FieldViolation>) -> Self {
        let object = input.as_object();
        if object.is_none() {
            let at = if path.is_empty() { "$" } else { path };
            violations.push(FieldViolation::new(
                at,
                Constraint::Type,
                format!("expected an object, got {}", type_name(input)),
            ));
        }
        Self {
            object,
            path: path.to_string(),
            violations,
        }
    }

    /// Sink for readers descending into a nested object of this input.
    pub fn violations_mut(&mut self) -> &mut Vec<FieldViolation> {
        self.violations
    }

    pub fn field_path(&self, field: &str) -> String {
        if self.path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", self.path, field)
        }
    }

    /// Raw field value; JSON `null` counts as absent.
    fn raw(&self, field: &str) -> Option<&'v Value> {
        self.object
            .and_then(|o| o.get(field))
            .filter(|v| !v.is_null())
    }

    pub fn push(&mut self, field: &str, constraint: Constraint, message: impl Into<String>) {
        let at = self.field_path(field);
        self.violations
            .push(FieldViolation::new(at, constraint, message));
    }

    fn missing(&mut self, field: &str) {
        // The whole input already failed as a non-object
        if self.object.is_some() {
            self.push(field, Constraint::Required, format!("{field} is required"));
        }
    }

    fn as_str(&mut self, field: &str, value: &'v Value) -> Option<&'v str> {
        match value.as_str() {
            Some(s) => Some(s),
            None => {
                self.push(
                    field,
                    Constraint::Type,
                    format!("expected a string, got {}", type_name(value)),
                );
                None
            }
        }
    }

    fn check_len(&mut self, field: &str, s: &str, min: usize, max: usize) -> bool {
        let len = s.chars().count();
        if len < min {
            self.push(
                field,
                Constraint::MinLength,
                format!("must be at least {min} char(s), got {len}"),
            );
            return false;
        }
        if len > max {
            self.push(
                field,
                Constraint::MaxLength,
                format!("must be at most {max} char(s), got {len}"),
            );
            return false;
        }
        true
    }

    // ── Strings ──────────────────────────────────────────────────

    pub fn required_str(&mut self, field: &str, min: usize, max: usize) -> Option<String> {
        let Some(value) = self.raw(field) else {
            self.missing(field);
            return None;
        };
        let s = self.as_str(field, value)?;
        self.check_len(field, s, min, max).then(|| s.to_string())
    }

    pub fn optional_str(&mut self, field: &str, min: usize, max: usize) -> Option<String> {
        let value = self.raw(field)?;
        let s = self.as_str(field, value)?;
        self.check_len(field, s, min, max).then(|| s.to_string())
    }

    /// Required string parsed into an identifier-like type.
    pub fn required_parsed<T>(
        &mut self,
        field: &str,
        parse: impl FnOnce(&str) -> Result<T, IdentifierError>,
    ) -> Option<T> {
        let Some(value) = self.raw(field) else {
            self.missing(field);
            return None;
        };
        let s = self.as_str(field, value)?;
        self.parsed(field, s, parse)
    }

    pub fn optional_parsed<T>(
        &mut self,
        field: &str,
        parse: impl FnOnce(&str) -> Result<T, IdentifierError>,
    ) -> Option<T> {
        let value = self.raw(field)?;
        let s = self.as_str(field, value)?;
        self.parsed(field, s, parse)
    }

    fn parsed<T>(
        &mut self,
        field: &str,
        s: &str,
        parse: impl FnOnce(&str) -> Result<T, IdentifierError>,
    ) -> Option<T> {
        match parse(s) {
            Ok(v) => Some(v),
            Err(e) => {
                self.push(field, e.constraint(), e.to_string());
                None
            }
        }
    }

    /// Required string checked against a predicate; `rule` is quoted in the
    /// violation message.
    pub fn required_matching(
        &mut self,
        field: &str,
        max: usize,
        is_match: impl FnOnce(&str) -> bool,
        rule: &str,
    ) -> Option<String> {
        let s = self.required_str(field, 1, max)?;
        if is_match(&s) {
            Some(s)
        } else {
            self.push(field, Constraint::Pattern, format!("'{s}' must match {rule}"));
            None
        }
    }

    /// Free-form string handled by a caller-supplied parser (uuid, timestamps).
    pub fn required_with<T, E: std::fmt::Display>(
        &mut self,
        field: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> Option<T> {
        let Some(value) = self.raw(field) else {
            self.missing(field);
            return None;
        };
        let s = self.as_str(field, value)?;
        match parse(s) {
            Ok(v) => Some(v),
            Err(e) => {
                self.push(field, Constraint::Pattern, e.to_string());
                None
            }
        }
    }

    pub fn optional_with<T, E: std::fmt::Display>(
        &mut self,
        field: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> Option<T> {
        self.raw(field)?;
        self.required_with(field, parse)
    }

    // ── Enums ────────────────────────────────────────────────────

    pub fn required_enum<T: FromStr + VariantNames>(&mut self, field: &str) -> Option<T> {
        let Some(value) = self.raw(field) else {
            self.missing(field);
            return None;
        };
        self.enum_value(field, value)
    }

    pub fn optional_enum<T: FromStr + VariantNames>(&mut self, field: &str) -> Option<T> {
        let value = self.raw(field)?;
        self.enum_value(field, value)
    }

    /// Whether the field is present (and not null) in the input.
    pub fn has(&self, field: &str) -> bool {
        self.raw(field).is_some()
    }

    fn enum_value<T: FromStr + VariantNames>(&mut self, field: &str, value: &'v Value) -> Option<T> {
        let s = self.as_str(field, value)?;
        match s.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.push(
                    field,
                    Constraint::OneOf,
                    format!("'{s}' is not one of {}", T::VARIANTS.join(" | ")),
                );
                None
            }
        }
    }

    // ── Scalars ──────────────────────────────────────────────────

    pub fn optional_i64(&mut self, field: &str) -> Option<i64> {
        let value = self.raw(field)?;
        match value.as_i64() {
            Some(n) => Some(n),
            None => {
                self.push(
                    field,
                    Constraint::Type,
                    format!("expected an integer, got {}", type_name(value)),
                );
                None
            }
        }
    }

    pub fn bool_or(&mut self, field: &str, default: bool) -> bool {
        let Some(value) = self.raw(field) else {
            return default;
        };
        match value.as_bool() {
            Some(b) => b,
            None => {
                self.push(
                    field,
                    Constraint::Type,
                    format!("expected a boolean, got {}", type_name(value)),
                );
                default
            }
        }
    }

    pub fn required_i64(&mut self, field: &str) -> Option<i64> {
        if !self.has(field) {
            self.missing(field);
            return None;
        }
        self.optional_i64(field)
    }

    // ── Containers ───────────────────────────────────────────────

    /// Optional object; absent yields `None` without a violation.
    pub fn optional_object(&mut self, field: &str) -> Option<&'v Map<String, Value>> {
        let value = self.raw(field)?;
        match value.as_object() {
            Some(map) => Some(map),
            None => {
                self.push(
                    field,
                    Constraint::Type,
                    format!("expected an object, got {}", type_name(value)),
                );
                None
            }
        }
    }

    pub fn required_object(&mut self, field: &str) -> Option<&'v Map<String, Value>> {
        if !self.has(field) {
            self.missing(field);
            return None;
        }
        self.optional_object(field)
    }

    /// Raw JSON value of a nested field, for readers that descend into it.
    pub fn nested(&mut self, field: &str) -> Option<&'v Value> {
        self.raw(field)
    }

    /// Optional array of strings, each `min..=max` chars. Absent yields empty.
    pub fn string_list(&mut self, field: &str, min: usize, max: usize) -> Option<Vec<String>> {
        let Some(items) = self.array(field) else {
            return Some(Vec::new());
        };
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            let at = format!("{field}[{i}]");
            match item.as_str() {
                Some(s) if self.check_len(&at, s, min, max) => out.push(s.to_string()),
                Some(_) => ok = false,
                None => {
                    self.push(
                        &at,
                        Constraint::Type,
                        format!("expected a string, got {}", type_name(item)),
                    );
                    ok = false;
                }
            }
        }
        ok.then_some(out)
    }

    /// Optional array of nested shapes. Absent yields empty.
    pub fn shape_list<T>(&mut self, field: &str, read: ReadFn<T>) -> Option<Vec<T>> {
        let Some(items) = self.array(field) else {
            return Some(Vec::new());
        };
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            let at = self.field_path(&format!("{field}[{i}]"));
            match read(item, &at, self.violations) {
                Some(shape) if ok => out.push(shape),
                Some(_) => {}
                None => ok = false,
            }
        }
        ok.then_some(out)
    }

    fn array(&mut self, field: &str) -> Option<&'v Vec<Value>> {
        let value = self.raw(field)?;
        match value.as_array() {
            Some(items) => Some(items),
            None => {
                self.push(
                    field,
                    Constraint::Type,
                    format!("expected an array, got {}", type_name(value)),
                );
                None
            }
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
