//! Structural validation of manifests from untyped input.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::types::{
    ConceptPolicy, CrudOperation, IntegrityPolicy, Manifest, ManifestCreateInput,
    ManifestDefinition, ManifestLayer, TargetType, WorkflowDefinition,
};
use crate::error::{CanonError, Constraint, FieldViolation, Result, ValidationErrorType};
use crate::identifier::{CanonId, CANON_ID_MAX_LEN};
use crate::shapes::reader::FieldReader;
use crate::shapes::CODE_MAX_LEN;

pub const MANIFEST_NAME_MAX_LEN: usize = 128;
pub const ROLE_MAX_LEN: usize = 128;
pub const TARGET_ID_MAX_LEN: usize = 256;
pub const ACTOR_MAX_LEN: usize = 256;

pub fn validate_manifest_definition(input: &Value) -> Result<ManifestDefinition> {
    let mut violations = Vec::new();
    let definition = read_definition(input, "", &mut violations);
    finish("manifest_definition", definition, violations)
}

pub fn validate_manifest(input: &Value) -> Result<Manifest> {
    let mut violations = Vec::new();
    let manifest = read_manifest(input, &mut violations);
    finish("manifest", manifest, violations)
}

pub fn validate_manifest_create_input(input: &Value) -> Result<ManifestCreateInput> {
    let mut violations = Vec::new();
    let create = read_create_input(input, &mut violations);
    finish("manifest_create_input", create, violations)
}

fn finish<T>(subject: &str, parsed: Option<T>, violations: Vec<FieldViolation>) -> Result<T> {
    match parsed {
        Some(value) if violations.is_empty() => Ok(value),
        _ => Err(CanonError::with_violations(
            ValidationErrorType::InvalidManifest,
            subject,
            violations,
        )),
    }
}

// ── Records ──────────────────────────────────────────────────────

/// Layer, target and definition: the part shared by records and create requests.
struct Scope {
    layer: ManifestLayer,
    target_id: String,
    target_type: TargetType,
    definition: ManifestDefinition,
}

fn read_scope(r: &mut FieldReader<'_, '_>) -> Option<Scope> {
    let layer = r.required_enum::<ManifestLayer>("layer");
    let target_id = r.required_str("target_id", 1, TARGET_ID_MAX_LEN);
    let target_type = r.required_enum::<TargetType>("target_type");
    if let (Some(layer), Some(target_type)) = (layer, target_type) {
        if layer.target_type() != target_type {
            r.push(
                "target_type",
                Constraint::OneOf,
                format!(
                    "layer {layer} requires target_type {}, got {target_type}",
                    layer.target_type()
                ),
            );
        }
    }
    let definition = match r.required_object("definition") {
        Some(_) => r.nested("definition").and_then(|value| {
            let at = r.field_path("definition");
            read_definition(value, &at, r.violations_mut())
        }),
        None => None,
    };
    Some(Scope {
        layer: layer?,
        target_id: target_id?,
        target_type: target_type?,
        definition: definition?,
    })
}

fn read_manifest(input: &Value, violations: &mut Vec<FieldViolation>) -> Option<Manifest> {
    let before = violations.len();
    let mut r = FieldReader::new(input, "", violations);
    let id = r.required_with("id", Uuid::parse_str);
    let scope = read_scope(&mut r);
    let is_active = r.bool_or("is_active", true);
    let is_locked = r.bool_or("is_locked", false);
    let version = r.required_i64("version");
    if matches!(version, Some(v) if v < 1 || v > i64::from(u32::MAX)) {
        r.push("version", Constraint::Minimum, "must be a positive 32-bit revision");
    }
    let created_at = r.required_with("created_at", parse_timestamp);
    let created_by = r.required_str("created_by", 1, ACTOR_MAX_LEN);
    let updated_at = r.optional_with("updated_at", parse_timestamp);
    let updated_by = r.optional_str("updated_by", 1, ACTOR_MAX_LEN);

    if violations.len() > before {
        return None;
    }
    let scope = scope?;
    Some(Manifest {
        id: id?,
        layer: scope.layer,
        target_id: scope.target_id,
        target_type: scope.target_type,
        definition: scope.definition,
        is_active,
        is_locked,
        version: u32::try_from(version?).ok()?,
        created_at: created_at?,
        created_by: created_by?,
        updated_at,
        updated_by,
    })
}

fn read_create_input(
    input: &Value,
    violations: &mut Vec<FieldViolation>,
) -> Option<ManifestCreateInput> {
    let before = violations.len();
    let mut r = FieldReader::new(input, "", violations);
    let scope = read_scope(&mut r);
    let created_by = r.required_str("created_by", 1, ACTOR_MAX_LEN);

    if violations.len() > before {
        return None;
    }
    let scope = scope?;
    Some(ManifestCreateInput {
        layer: scope.layer,
        target_id: scope.target_id,
        target_type: scope.target_type,
        definition: scope.definition,
        created_by: created_by?,
    })
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

// ── Definition ───────────────────────────────────────────────────

fn read_definition(
    input: &Value,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<ManifestDefinition> {
    let before = violations.len();
    let mut r = FieldReader::new(input, path, violations);
    let name = r.required_str("name", 1, MANIFEST_NAME_MAX_LEN);
    let allowlist = read_allowlist(&mut r);

    let mut policies = BTreeMap::new();
    if let Some(map) = r.optional_object("policies") {
        for (concept, value) in map {
            let known = allowlist
                .as_ref()
                .is_some_and(|list| list.iter().any(|id| id.as_str() == concept));
            if allowlist.is_some() && !known {
                r.push(
                    &format!("policies.{concept}"),
                    Constraint::Reference,
                    format!("policy for '{concept}' which is not in the allowlist"),
                );
            }
            let at = r.field_path(&format!("policies.{concept}"));
            if let Some(policy) = read_policy(value, &at, r.violations_mut()) {
                policies.insert(concept.clone(), policy);
            }
        }
    }

    if violations.len() > before {
        return None;
    }
    Some(ManifestDefinition {
        name: name?,
        allowlist: allowlist?,
        policies,
    })
}

fn read_allowlist(r: &mut FieldReader<'_, '_>) -> Option<Vec<CanonId>> {
    let Some(value) = r.nested("allowlist") else {
        r.push("allowlist", Constraint::Required, "allowlist is required");
        return None;
    };
    let raw = r.string_list("allowlist", 1, CANON_ID_MAX_LEN)?;
    if !value.is_array() {
        // Type violation already recorded
        return None;
    }
    if raw.is_empty() {
        r.push("allowlist", Constraint::NonEmpty, "allowlist must name at least one concept");
        return None;
    }
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(raw.len());
    let mut ok = true;
    for (i, entry) in raw.iter().enumerate() {
        let at = format!("allowlist[{i}]");
        match CanonId::parse(entry) {
            Ok(id) if seen.insert(id.clone()) => ids.push(id),
            Ok(_) => {
                r.push(&at, Constraint::Unique, format!("'{entry}' is listed more than once"));
                ok = false;
            }
            Err(e) => {
                r.push(&at, e.constraint(), e.to_string());
                ok = false;
            }
        }
    }
    ok.then_some(ids)
}

fn read_policy(
    input: &Value,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<ConceptPolicy> {
    let before = violations.len();
    let mut r = FieldReader::new(input, path, violations);
    let mut policy = ConceptPolicy::default();
    for op in CrudOperation::ALL {
        let field = op.as_ref();
        if r.has(field) {
            *policy.roles_slot(op) = r.string_list(field, 1, ROLE_MAX_LEN);
        }
    }
    if let Some(value) = r.nested("integrity") {
        let at = r.field_path("integrity");
        policy.integrity = read_integrity(value, &at, r.violations_mut());
    }
    if let Some(value) = r.nested("workflow") {
        let at = r.field_path("workflow");
        policy.workflow = read_workflow(value, &at, r.violations_mut());
    }

    (violations.len() == before).then_some(policy)
}

fn read_integrity(
    input: &Value,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<IntegrityPolicy> {
    let mut r = FieldReader::new(input, path, violations);
    let immutable_fields = r.string_list("immutable_fields", 1, CODE_MAX_LEN);
    let required_relations = r.string_list("required_relations", 1, CODE_MAX_LEN);
    Some(IntegrityPolicy {
        immutable_fields: immutable_fields?,
        required_relations: required_relations?,
    })
}

fn read_workflow(
    input: &Value,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<WorkflowDefinition> {
    let before = violations.len();
    let mut r = FieldReader::new(input, path, violations);
    let states = r.required_str("states", 1, CODE_MAX_LEN);
    let initial = r.required_str("initial", 1, CODE_MAX_LEN);

    let mut transitions = BTreeMap::new();
    let transitions_value = r
        .required_object("transitions")
        .and_then(|_| r.nested("transitions"));
    if let Some(value) = transitions_value {
        let at = r.field_path("transitions");
        let mut tr = FieldReader::new(value, &at, r.violations_mut());
        for from in value.as_object().into_iter().flat_map(|map| map.keys()) {
            if !tr.has(from) {
                tr.push(from, Constraint::Type, "expected an array, got null");
                continue;
            }
            if let Some(targets) = tr.string_list(from, 1, CODE_MAX_LEN) {
                transitions.insert(from.clone(), targets);
            }
        }
    }

    let mut requires_comment = BTreeMap::new();
    let comment_value = r
        .optional_object("requires_comment")
        .and_then(|_| r.nested("requires_comment"));
    if let Some(value) = comment_value {
        let at = r.field_path("requires_comment");
        let mut cr = FieldReader::new(value, &at, r.violations_mut());
        for state in value.as_object().into_iter().flat_map(|map| map.keys()) {
            requires_comment.insert(state.clone(), cr.bool_or(state, false));
        }
    }

    if let Some(initial) = &initial {
        let declared: BTreeSet<&str> = transitions
            .iter()
            .flat_map(|(from, to)| std::iter::once(from.as_str()).chain(to.iter().map(String::as_str)))
            .collect();
        if !transitions.is_empty() && !declared.contains(initial.as_str()) {
            r.push(
                "initial",
                Constraint::Reference,
                format!("initial state '{initial}' is not a declared state"),
            );
        }
    }

    if violations.len() > before {
        return None;
    }
    Some(WorkflowDefinition {
        states: states?,
        initial: initial?,
        transitions,
        requires_comment,
    })
}
