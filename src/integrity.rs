//! Cross-registry integrity checker.
//!
//! Runs over structurally valid members of one scope (a pack or the kernel
//! registry). Rules run in a fixed order and the first violation wins:
//!
//!   1. Uniqueness (concepts, value sets, values within a set)
//!   2. Referential integrity (value → value set)
//!   3. Minimum cardinality (≥ 2 values per set)
//!   4. Sort-order continuity (declared sort orders are exactly 1..n)
//!
//! Packs are partial contributions, so they only get rules 1 and 2.

use std::collections::{HashMap, HashSet};

use serde_json::json;

use crate::error::{CanonError, Result, ValidationErrorType};
use crate::shapes::{ConceptShape, ValidationFlags, ValueSetShape, ValueShape};

pub const MIN_VALUES_PER_SET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityScope {
    Pack,
    Registry,
}

/// Which rules to run. Order is fixed regardless of which are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityRules {
    pub uniqueness: bool,
    pub referential_integrity: bool,
    pub min_cardinality: bool,
    pub sort_order_continuity: bool,
}

impl IntegrityRules {
    pub fn for_scope(scope: IntegrityScope) -> Self {
        match scope {
            IntegrityScope::Pack => Self {
                uniqueness: true,
                referential_integrity: true,
                min_cardinality: false,
                sort_order_continuity: false,
            },
            IntegrityScope::Registry => Self {
                uniqueness: true,
                referential_integrity: true,
                min_cardinality: true,
                sort_order_continuity: true,
            },
        }
    }

    /// Registry rules as declared by its `validation` block.
    pub fn from_flags(flags: &ValidationFlags) -> Self {
        Self {
            uniqueness: flags.unique_codes,
            referential_integrity: flags.referential_integrity,
            min_cardinality: flags.min_values_per_set,
            sort_order_continuity: flags.continuous_sort_order,
        }
    }
}

pub fn check_integrity(
    rules: &IntegrityRules,
    concepts: &[ConceptShape],
    value_sets: &[ValueSetShape],
    values: &[ValueShape],
) -> Result<()> {
    if rules.uniqueness {
        check_uniqueness(concepts, value_sets, values)?;
    }
    if rules.referential_integrity {
        check_references(value_sets, values)?;
    }
    if rules.min_cardinality {
        check_cardinality(value_sets, values)?;
    }
    if rules.sort_order_continuity {
        check_sort_order_continuity(value_sets, values)?;
    }
    Ok(())
}

// ── 1. Uniqueness ────────────────────────────────────────────────

fn check_uniqueness(
    concepts: &[ConceptShape],
    value_sets: &[ValueSetShape],
    values: &[ValueShape],
) -> Result<()> {
    let mut seen = HashSet::new();
    for concept in concepts {
        if !seen.insert(concept.code.as_str()) {
            return Err(CanonError::validation(
                ValidationErrorType::DuplicateConceptCode,
                format!("Duplicate concept code: {}", concept.code),
                json!({ "code": concept.code }),
            ));
        }
    }

    let mut seen = HashSet::new();
    for vs in value_sets {
        if !seen.insert(vs.code.as_str()) {
            return Err(CanonError::validation(
                ValidationErrorType::DuplicateValuesetCode,
                format!("Duplicate value set code: {}", vs.code),
                json!({ "code": vs.code }),
            ));
        }
    }

    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert((value.value_set_code.as_str(), value.code.as_str())) {
            return Err(CanonError::validation(
                ValidationErrorType::DuplicateValueCode,
                format!(
                    "Duplicate value code '{}' in value set '{}'",
                    value.code, value.value_set_code
                ),
                json!({ "code": value.code, "value_set_code": value.value_set_code }),
            ));
        }
    }
    Ok(())
}

// ── 2. Referential integrity ─────────────────────────────────────

fn check_references(value_sets: &[ValueSetShape], values: &[ValueShape]) -> Result<()> {
    let known: HashSet<&str> = value_sets.iter().map(|vs| vs.code.as_str()).collect();
    for value in values {
        if !known.contains(value.value_set_code.as_str()) {
            return Err(CanonError::validation(
                ValidationErrorType::InvalidValuesetReference,
                format!(
                    "Value '{}' references unknown value set '{}'",
                    value.code, value.value_set_code
                ),
                json!({ "code": value.code, "value_set_code": value.value_set_code }),
            ));
        }
    }
    Ok(())
}

// ── 3. Minimum cardinality ───────────────────────────────────────

fn check_cardinality(value_sets: &[ValueSetShape], values: &[ValueShape]) -> Result<()> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.value_set_code.as_str()).or_default() += 1;
    }
    for vs in value_sets {
        let count = counts.get(vs.code.as_str()).copied().unwrap_or(0);
        if count < MIN_VALUES_PER_SET {
            return Err(CanonError::validation(
                ValidationErrorType::InsufficientValues,
                format!(
                    "Value set '{}' has {count} value(s); at least {MIN_VALUES_PER_SET} required",
                    vs.code
                ),
                json!({
                    "value_set_code": vs.code,
                    "count": count,
                    "minimum": MIN_VALUES_PER_SET,
                }),
            ));
        }
    }
    Ok(())
}

// ── 4. Sort-order continuity ─────────────────────────────────────

fn check_sort_order_continuity(value_sets: &[ValueSetShape], values: &[ValueShape]) -> Result<()> {
    let mut orders: HashMap<&str, Vec<i64>> = HashMap::new();
    for value in values {
        if let Some(order) = value.sort_order {
            orders
                .entry(value.value_set_code.as_str())
                .or_default()
                .push(order);
        }
    }

    for vs in value_sets {
        // Sets where no value declares sort_order are exempt
        let Some(declared) = orders.get_mut(vs.code.as_str()) else {
            continue;
        };
        declared.sort_unstable();
        let gap = declared
            .iter()
            .zip(1i64..)
            .find(|(actual, expected)| **actual != *expected);
        if let Some((&actual, expected)) = gap {
            return Err(CanonError::validation(
                ValidationErrorType::NonContinuousSortOrder,
                format!(
                    "Value set '{}' sort_order is not continuous: expected {expected}, found {actual}",
                    vs.code
                ),
                json!({
                    "value_set_code": vs.code,
                    "expected": expected,
                    "actual": actual,
                }),
            ));
        }
    }
    Ok(())
}
