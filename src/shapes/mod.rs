//! Shape contracts: structural schemas for registry members.
//!
//! Each shape has a typed Rust form (serde, closed enums) and a
//! `validate(&Value)` entry point for untyped boundaries. Structural
//! validation looks at one instance only; cross-member rules live in
//! [`crate::integrity`] and casing rules in [`crate::naming`].

mod concept;
mod pack;
pub(crate) mod reader;
mod registry;
mod value;
mod value_set;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString, VariantNames};

use crate::error::{CanonError, FieldViolation, Result};

pub use concept::ConceptShape;
pub use pack::PackShape;
pub use registry::{KernelRegistryShape, ValidationFlags};
pub use value::ValueShape;
pub use value_set::{ValueSetMetadata, ValueSetShape};

/// Bounds on the `code` field of every coded shape.
pub const CODE_MAX_LEN: usize = 160;
pub const DESCRIPTION_MAX_LEN: usize = 256;

// ── Closed enums ──────────────────────────────────────────────

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
pub enum ConceptCategory {
    Entity,
    Attribute,
    Operation,
    Relationship,
}

/// Business domain a concept, value set or pack belongs to.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Domain {
    Core,
    Party,
    Finance,
    Commerce,
    Inventory,
    HumanResources,
    Document,
    Compliance,
    Workflow,
    Geography,
    Communication,
    Legal,
    Project,
    Asset,
    Identity,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum Jurisdiction {
    #[default]
    Global,
    Regional,
    Local,
}

/// Discriminator for the shape families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Concept,
    ValueSet,
    Value,
    Pack,
    KernelRegistry,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::ValueSet => "value_set",
            Self::Value => "value",
            Self::Pack => "pack",
            Self::KernelRegistry => "kernel_registry",
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Shape contract trait ──────────────────────────────────────

/// A structurally validated registry shape.
pub trait CanonShape: Sized + Clone + Serialize {
    const KIND: ShapeKind;

    /// Read `input` at `path`, appending every violation found.
    /// Returns `Some` only when this instance produced no violations.
    fn read(input: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self>;

    /// Structural validation: the shape, or every violated field.
    fn validate(input: &Value) -> Result<Self> {
        let mut violations = Vec::new();
        match Self::read(input, "", &mut violations) {
            Some(shape) if violations.is_empty() => Ok(shape),
            _ => Err(CanonError::structural(Self::KIND, violations)),
        }
    }
}

/// Shapes identified by a canonical `code` (concepts, value sets, values).
pub trait CodedShape: CanonShape {
    fn code(&self) -> &str;
}
