//! Manifest authorization.
//!
//! Evaluation order:
//!   1. Concept must be on the allowlist, else denied outright
//!   2. No policy for the concept: `read` is open, every mutating op is closed
//!   3. Policy present: the op's role list must contain `*` or the role

use tracing::debug;

use super::types::{ConceptPolicy, CrudOperation, Manifest, ManifestDefinition};
use crate::error::{CanonError, Result};

/// Role wildcard in a policy's role list.
pub const ANY_ROLE: &str = "*";

impl ManifestDefinition {
    pub fn is_concept_allowed(&self, concept: &str) -> bool {
        self.allowlist.iter().any(|id| id.as_str() == concept)
    }

    pub fn concept_policy(&self, concept: &str) -> Option<&ConceptPolicy> {
        self.policies.get(concept)
    }

    pub fn can_perform(&self, concept: &str, op: CrudOperation, role: &str) -> bool {
        if !self.is_concept_allowed(concept) {
            return false;
        }
        let allowed = match self.concept_policy(concept) {
            None => !op.is_mutating(),
            Some(policy) => policy
                .roles_for(op)
                .is_some_and(|roles| roles.iter().any(|r| r == ANY_ROLE || r == role)),
        };
        debug!(manifest = %self.name, concept, %op, role, allowed, "manifest permission check");
        allowed
    }

    /// Like [`can_perform`](Self::can_perform), but says why not.
    pub fn authorize(&self, concept: &str, op: CrudOperation, role: &str) -> Result<()> {
        if !self.is_concept_allowed(concept) {
            return Err(CanonError::PolicyDenied(format!(
                "concept '{concept}' is not allowlisted in manifest '{}'",
                self.name
            )));
        }
        if self.can_perform(concept, op, role) {
            Ok(())
        } else {
            Err(CanonError::Unauthorized(format!(
                "role '{role}' may not {op} '{concept}' under manifest '{}'",
                self.name
            )))
        }
    }

    /// Concepts the role may perform `op` on, in allowlist order.
    pub fn permitted_concepts(&self, op: CrudOperation, role: &str) -> Vec<&str> {
        self.allowlist
            .iter()
            .map(|id| id.as_str())
            .filter(|concept| self.can_perform(concept, op, role))
            .collect()
    }
}

impl Manifest {
    /// Authorization against a stored manifest. Inactive manifests grant
    /// nothing; locked manifests still answer reads.
    pub fn authorize(&self, concept: &str, op: CrudOperation, role: &str) -> Result<()> {
        if !self.is_active {
            return Err(CanonError::PolicyDenied(format!(
                "manifest {} for {} '{}' is inactive",
                self.id, self.target_type, self.target_id
            )));
        }
        if self.is_locked && op.is_mutating() {
            return Err(CanonError::Conflict(format!(
                "manifest {} is locked; {op} is not permitted",
                self.id
            )));
        }
        self.definition.authorize(concept, op, role)
    }
}

// ── Free-function surface ────────────────────────────────────────

pub fn is_concept_allowed(definition: &ManifestDefinition, concept: &str) -> bool {
    definition.is_concept_allowed(concept)
}

pub fn get_concept_policy<'a>(
    definition: &'a ManifestDefinition,
    concept: &str,
) -> Option<&'a ConceptPolicy> {
    definition.concept_policy(concept)
}

pub fn can_perform_operation(
    definition: &ManifestDefinition,
    concept: &str,
    op: CrudOperation,
    role: &str,
) -> bool {
    definition.can_perform(concept, op, role)
}
