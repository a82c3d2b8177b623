//! Manifest Types
//!
//! A manifest scopes which concepts a domain, cluster or tenant may use and
//! how each concept may be created, changed and moved through its workflow.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantNames};
use uuid::Uuid;

use crate::identifier::CanonId;

/// The five governed operations (CRUD-S).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CrudOperation {
    Create,
    Read,
    Update,
    Delete,
    Restore,
}

impl CrudOperation {
    pub const ALL: [CrudOperation; 5] = [
        CrudOperation::Create,
        CrudOperation::Read,
        CrudOperation::Update,
        CrudOperation::Delete,
        CrudOperation::Restore,
    ];

    pub fn is_mutating(&self) -> bool {
        !matches!(self, CrudOperation::Read)
    }
}

/// Field-level integrity rules for a concept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityPolicy {
    /// Fields that may not change after creation
    #[serde(default)]
    pub immutable_fields: Vec<String>,
    /// Concepts an instance must be linked to
    #[serde(default)]
    pub required_relations: Vec<String>,
}

/// State machine over the members of a value set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Code of the value set whose values are the states
    pub states: String,
    pub initial: String,
    /// state -> allowed next states
    pub transitions: BTreeMap<String, Vec<String>>,
    /// target state -> whether entering it needs a comment
    #[serde(default)]
    pub requires_comment: BTreeMap<String, bool>,
}

/// Permissions and rules for one allowlisted concept.
///
/// An absent role list and an empty one both authorize nobody.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<IntegrityPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowDefinition>,
}

impl ConceptPolicy {
    pub fn roles_for(&self, op: CrudOperation) -> Option<&[String]> {
        match op {
            CrudOperation::Create => self.create.as_deref(),
            CrudOperation::Read => self.read.as_deref(),
            CrudOperation::Update => self.update.as_deref(),
            CrudOperation::Delete => self.delete.as_deref(),
            CrudOperation::Restore => self.restore.as_deref(),
        }
    }

    pub(crate) fn roles_slot(&mut self, op: CrudOperation) -> &mut Option<Vec<String>> {
        match op {
            CrudOperation::Create => &mut self.create,
            CrudOperation::Read => &mut self.read,
            CrudOperation::Update => &mut self.update,
            CrudOperation::Delete => &mut self.delete,
            CrudOperation::Restore => &mut self.restore,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDefinition {
    pub name: String,
    /// Concepts usable in this scope, in declaration order
    pub allowlist: Vec<CanonId>,
    /// concept -> policy; keys are a subset of the allowlist
    #[serde(default)]
    pub policies: BTreeMap<String, ConceptPolicy>,
}

/// Governance layer a manifest applies at.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum ManifestLayer {
    /// Domain-wide
    L1,
    /// Cluster of tenants
    L2,
    /// Single tenant
    L3,
}

impl ManifestLayer {
    /// The only target type a manifest at this layer may point at.
    pub fn target_type(&self) -> TargetType {
        match self {
            ManifestLayer::L1 => TargetType::Domain,
            ManifestLayer::L2 => TargetType::Cluster,
            ManifestLayer::L3 => TargetType::Tenant,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetType {
    Domain,
    Cluster,
    Tenant,
}

/// A persisted manifest record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: Uuid,
    pub layer: ManifestLayer,
    pub target_id: String,
    pub target_type: TargetType,
    pub definition: ManifestDefinition,
    pub is_active: bool,
    pub is_locked: bool,
    /// Monotonic revision, starting at 1
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl Manifest {
    /// First revision of a manifest from a validated create request.
    pub fn create(input: ManifestCreateInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            layer: input.layer,
            target_id: input.target_id,
            target_type: input.target_type,
            definition: input.definition,
            is_active: true,
            is_locked: false,
            version: 1,
            created_at: Utc::now(),
            created_by: input.created_by,
            updated_at: None,
            updated_by: None,
        }
    }
}

/// Payload for creating a manifest; the store assigns id and audit fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestCreateInput {
    pub layer: ManifestLayer,
    pub target_id: String,
    pub target_type: TargetType,
    pub definition: ManifestDefinition,
    pub created_by: String,
}
