//! Manifest policy engine: structural validation, CRUD-S authorization and
//! workflow evaluation over a concept allowlist.

mod policy;
mod types;
mod validate;
mod workflow;

pub use policy::{can_perform_operation, get_concept_policy, is_concept_allowed, ANY_ROLE};
pub use types::{
    ConceptPolicy, CrudOperation, IntegrityPolicy, Manifest, ManifestCreateInput,
    ManifestDefinition, ManifestLayer, TargetType, WorkflowDefinition,
};
pub use validate::{
    validate_manifest, validate_manifest_create_input, validate_manifest_definition,
    MANIFEST_NAME_MAX_LEN,
};
pub use workflow::{
    check_workflow_states, is_terminal_state, is_valid_transition, next_states,
    transition_requires_comment,
};
