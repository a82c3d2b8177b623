//! Registry and pack validation end to end.
//!
//! Builds small registries in JSON and checks the observable contract: the
//! fixed rule order, the error discriminators and the offending codes each
//! failure reports.

use canon_registry::{
    validate_kernel_registry, validate_pack, validate_value, CanonEngine, CanonShape, ErrorKind,
    KernelRegistryShape, ValidationErrorType, ValueShape,
};
use serde_json::{json, Value};

fn value(code: &str, set: &str) -> Value {
    json!({ "code": code, "value_set_code": set, "label": code })
}

fn ordered(code: &str, set: &str, sort_order: i64) -> Value {
    json!({ "code": code, "value_set_code": set, "label": code, "sort_order": sort_order })
}

fn registry(value_sets: &[&str], values: Vec<Value>) -> Value {
    json!({
        "version": "1.0.0",
        "concepts": [
            { "code": "PARTY", "category": "ENTITY", "domain": "PARTY", "description": "Party" },
            { "code": "INVOICE", "category": "ENTITY", "domain": "FINANCE", "description": "Invoice" }
        ],
        "value_sets": value_sets.iter().map(|code| json!({
            "code": code, "domain": "CORE", "description": code
        })).collect::<Vec<_>>(),
        "values": values,
    })
}

fn error_type(input: &Value) -> Option<ValidationErrorType> {
    validate_kernel_registry(input).unwrap_err().error_type()
}

#[test]
fn well_formed_registry_passes() {
    let input = registry(
        &["STATUS", "COLOR"],
        vec![
            ordered("OPEN", "STATUS", 1),
            ordered("CLOSED", "STATUS", 2),
            value("RED", "COLOR"),
            value("BLUE", "COLOR"),
        ],
    );
    let reg = validate_kernel_registry(&input).unwrap();
    assert_eq!(reg.values.len(), 4);
}

#[test]
fn validated_registry_revalidates_to_itself() {
    let input = registry(
        &["STATUS"],
        vec![ordered("OPEN", "STATUS", 1), ordered("CLOSED", "STATUS", 2)],
    );
    let reg = validate_kernel_registry(&input).unwrap();
    let again = KernelRegistryShape::validate(&serde_json::to_value(&reg).unwrap()).unwrap();
    assert_eq!(reg, again);
}

#[test]
fn duplicate_concept_reported_by_code() {
    let mut input = registry(&["STATUS"], vec![value("A", "STATUS"), value("B", "STATUS")]);
    input["concepts"][1]["code"] = json!("PARTY");
    let err = validate_kernel_registry(&input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(err.error_type(), Some(ValidationErrorType::DuplicateConceptCode));
    assert_eq!(err.details().unwrap().context["code"], "PARTY");
}

#[test]
fn duplicate_value_set_and_value() {
    let input = registry(&["STATUS", "STATUS"], vec![value("A", "STATUS"), value("B", "STATUS")]);
    assert_eq!(error_type(&input), Some(ValidationErrorType::DuplicateValuesetCode));

    let input = registry(&["STATUS"], vec![value("A", "STATUS"), value("A", "STATUS")]);
    assert_eq!(error_type(&input), Some(ValidationErrorType::DuplicateValueCode));
}

#[test]
fn same_value_code_in_different_sets_is_fine() {
    let input = registry(
        &["STATUS", "PHASE"],
        vec![
            value("OPEN", "STATUS"),
            value("CLOSED", "STATUS"),
            value("OPEN", "PHASE"),
            value("CLOSED", "PHASE"),
        ],
    );
    assert!(validate_kernel_registry(&input).is_ok());
}

#[test]
fn unknown_value_set_reference() {
    let input = registry(
        &["STATUS"],
        vec![value("A", "STATUS"), value("B", "STATUS"), value("X", "UNKNOWN_VALUESET")],
    );
    let err = validate_kernel_registry(&input).unwrap_err();
    assert_eq!(err.error_type(), Some(ValidationErrorType::InvalidValuesetReference));
    let ctx = &err.details().unwrap().context;
    assert_eq!(ctx["code"], "X");
    assert_eq!(ctx["value_set_code"], "UNKNOWN_VALUESET");
}

#[test]
fn cardinality_boundary() {
    let one = registry(&["STATUS"], vec![value("ONLY", "STATUS")]);
    let err = validate_kernel_registry(&one).unwrap_err();
    assert_eq!(err.error_type(), Some(ValidationErrorType::InsufficientValues));
    assert_eq!(err.details().unwrap().context["count"], 1);

    let two = registry(&["STATUS"], vec![value("A", "STATUS"), value("B", "STATUS")]);
    assert!(validate_kernel_registry(&two).is_ok());
}

#[test]
fn sort_order_gap_and_continuity() {
    let gap = registry(&["STATUS"], vec![ordered("A", "STATUS", 1), ordered("B", "STATUS", 3)]);
    let err = validate_kernel_registry(&gap).unwrap_err();
    assert_eq!(err.error_type(), Some(ValidationErrorType::NonContinuousSortOrder));
    let ctx = &err.details().unwrap().context;
    assert_eq!(ctx["expected"], 2);
    assert_eq!(ctx["actual"], 3);

    let ok = registry(&["STATUS"], vec![ordered("B", "STATUS", 2), ordered("A", "STATUS", 1)]);
    assert!(validate_kernel_registry(&ok).is_ok());
}

#[test]
fn first_rule_in_order_wins() {
    // Duplicate, dangling reference, single-member set and sort gap all at once
    let input = registry(
        &["STATUS", "LONELY"],
        vec![
            ordered("A", "STATUS", 1),
            ordered("A", "STATUS", 3),
            value("X", "NOWHERE"),
            value("ONLY", "LONELY"),
        ],
    );
    assert_eq!(error_type(&input), Some(ValidationErrorType::DuplicateValueCode));

    let input = registry(
        &["STATUS", "LONELY"],
        vec![
            ordered("A", "STATUS", 1),
            ordered("B", "STATUS", 3),
            value("X", "NOWHERE"),
            value("ONLY", "LONELY"),
        ],
    );
    assert_eq!(error_type(&input), Some(ValidationErrorType::InvalidValuesetReference));

    let input = registry(
        &["STATUS", "LONELY"],
        vec![ordered("A", "STATUS", 1), ordered("B", "STATUS", 3), value("ONLY", "LONELY")],
    );
    assert_eq!(error_type(&input), Some(ValidationErrorType::InsufficientValues));
}

#[test]
fn structural_failure_lists_every_field() {
    let mut input = registry(&["STATUS"], vec![value("A", "STATUS"), value("B", "STATUS")]);
    input["values"][0]["label"] = json!("");
    input["values"][1]["sort_order"] = json!("first");
    input["concepts"][0]["category"] = json!("THING");
    let err = validate_kernel_registry(&input).unwrap_err();
    assert!(err.is_structural());
    let fields: Vec<&str> = err.violations().iter().map(|v| v.field.as_str()).collect();
    assert_eq!(
        fields,
        vec!["concepts[0].category", "values[0].label", "values[1].sort_order"]
    );
}

#[test]
fn naming_law_distinguishable_from_structure() {
    let err = validate_value(&json!({
        "code": "invalidCode123", "value_set_code": "STATUS", "label": "Bad"
    }))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(err.to_string().contains("UPPERCASE_SNAKE_CASE"));
    assert!(err.is_naming_violation());

    let ok: ValueShape = validate_value(&json!({
        "code": "VALID_VALUE_NAME", "value_set_code": "STATUS", "label": "Good"
    }))
    .unwrap();
    assert_eq!(ok.code, "VALID_VALUE_NAME");
}

#[test]
fn pack_scope_is_partial() {
    let pack = json!({
        "id": "billing-extras",
        "name": "Billing extras",
        "version": "0.3.0",
        "domain": "FINANCE",
        "description": "Extra billing enumerations",
        "value_sets": [{ "code": "DUNNING_LEVEL", "domain": "FINANCE", "description": "Dunning" }],
        "values": [ordered("FIRST_NOTICE", "DUNNING_LEVEL", 2)],
    });
    assert!(validate_pack(&pack).is_ok());

    let mut dangling = pack.clone();
    dangling["values"] = json!([value("FIRST_NOTICE", "MISSING_SET")]);
    let err = validate_pack(&dangling).unwrap_err();
    assert_eq!(err.error_type(), Some(ValidationErrorType::InvalidValuesetReference));
}

#[test]
fn engine_and_free_functions_agree() {
    let engine = CanonEngine::new(Default::default()).unwrap();
    let input = registry(&["STATUS"], vec![value("ONLY", "STATUS")]);
    let a = engine.validate_kernel_registry(&input).unwrap_err();
    let b = validate_kernel_registry(&input).unwrap_err();
    assert_eq!(a.error_type(), b.error_type());
    assert_eq!(a.to_string(), b.to_string());
}
