//! Snapshot ids and load-time count checks.
//!
//! Algorithm:
//!   1. Sort concept codes, value-set codes, and value codes per set
//!   2. Emit one line per code under a section tag (`C`, `S`, `V`)
//!   3. Hash: SHA-256 of ("v1:" + version + lines), hex-encoded
//!
//! The id is `snapshot:<version>:<hash>`. Any add, remove or rename of a
//! code anywhere changes the hash. Labels and descriptions do not.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::{CanonError, Result, ValidationErrorType};
use crate::identifier::SchemaVersion;
use crate::shapes::{ConceptShape, KernelRegistryShape, ValueSetShape, ValueShape};

/// Current hash version prefix.
pub const HASH_VERSION: &str = "v1";
pub const SNAPSHOT_PREFIX: &str = "snapshot";

pub fn compute_snapshot_id(
    version: &SchemaVersion,
    concepts: &[ConceptShape],
    value_sets: &[ValueSetShape],
    values: &[ValueShape],
) -> String {
    let concept_codes: BTreeSet<&str> = concepts.iter().map(|c| c.code.as_str()).collect();
    let set_codes: BTreeSet<&str> = value_sets.iter().map(|vs| vs.code.as_str()).collect();
    let mut members: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for value in values {
        members
            .entry(value.value_set_code.as_str())
            .or_default()
            .insert(value.code.as_str());
    }

    let mut hasher = Sha256::new();
    hasher.update(format!("{HASH_VERSION}:{version}\n").as_bytes());
    for code in concept_codes {
        hasher.update(b"C:");
        hasher.update(code.as_bytes());
        hasher.update(b"\n");
    }
    for code in set_codes {
        hasher.update(b"S:");
        hasher.update(code.as_bytes());
        hasher.update(b"\n");
    }
    for (set, codes) in members {
        for code in codes {
            hasher.update(b"V:");
            hasher.update(set.as_bytes());
            hasher.update(b":");
            hasher.update(code.as_bytes());
            hasher.update(b"\n");
        }
    }

    format!("{SNAPSHOT_PREFIX}:{version}:{}", hex::encode(hasher.finalize()))
}

pub fn registry_snapshot_id(registry: &KernelRegistryShape) -> String {
    compute_snapshot_id(
        &registry.version,
        &registry.concepts,
        &registry.value_sets,
        &registry.values,
    )
}

/// Member counts of a taxonomy, live or declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyCounts {
    pub concepts: usize,
    pub value_sets: usize,
    pub values: usize,
}

impl TaxonomyCounts {
    pub fn of(registry: &KernelRegistryShape) -> Self {
        Self {
            concepts: registry.concepts.len(),
            value_sets: registry.value_sets.len(),
            values: registry.values.len(),
        }
    }
}

impl std::fmt::Display for TaxonomyCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} concepts, {} value sets, {} values",
            self.concepts, self.value_sets, self.values
        )
    }
}

/// Fail fast when live counts drift from the declared constants.
pub fn verify_counts(actual: &TaxonomyCounts, declared: &TaxonomyCounts) -> Result<()> {
    if actual == declared {
        return Ok(());
    }
    Err(CanonError::validation(
        ValidationErrorType::RegistryCountMismatch,
        format!("Registry integrity check failed: declared {declared}, found {actual}"),
        json!({ "declared": declared, "actual": actual }),
    ))
}
