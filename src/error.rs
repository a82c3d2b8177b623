//! Error taxonomy for the canon registry engine.
//!
//! Every failure surfaces as a [`CanonError`]. Callers branch on
//! [`CanonError::kind`] and, for validation failures, on the `error_type`
//! carried in [`ValidationDetails`]. Message text is for humans only.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString, VariantNames};
use thiserror::Error;

use crate::shapes::ShapeKind;

pub type Result<T> = std::result::Result<T, CanonError>;

/// Closed set of error kinds exposed to callers.
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
pub enum ErrorKind {
    CanonViolation,
    ContractMismatch,
    PolicyDenied,
    Unauthenticated,
    Unauthorized,
    NotFound,
    Conflict,
    ValidationFailed,
    Internal,
}

/// Discriminator carried by every `VALIDATION_FAILED` error.
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
pub enum ValidationErrorType {
    // ── Structural ───────────────────────────────────────────────
    SchemaViolation,

    // ── Naming law ───────────────────────────────────────────────
    InvalidConceptCode,
    InvalidValuesetCode,
    InvalidValueCode,
    InvalidValuePrefix,

    // ── Cross-registry integrity ─────────────────────────────────
    DuplicateConceptCode,
    DuplicateValuesetCode,
    DuplicateValueCode,
    InvalidValuesetReference,
    InsufficientValues,
    NonContinuousSortOrder,

    // ── Manifests ────────────────────────────────────────────────
    InvalidManifest,
    InvalidWorkflowState,

    // ── Load-time integrity ──────────────────────────────────────
    RegistryCountMismatch,
}

impl ValidationErrorType {
    /// True for the naming-law family ("not canon-compliant").
    pub fn is_naming(&self) -> bool {
        matches!(
            self,
            Self::InvalidConceptCode
                | Self::InvalidValuesetCode
                | Self::InvalidValueCode
                | Self::InvalidValuePrefix
        )
    }
}

/// The field-level constraint a structural violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Constraint {
    Required,
    Type,
    MinLength,
    MaxLength,
    Minimum,
    Pattern,
    InvalidCharacter,
    OneOf,
    NonEmpty,
    Unique,
    Reference,
}

/// One violated field inside a structural failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Dotted path to the field, e.g. `values[2].label`.
    pub field: String,
    pub constraint: Constraint,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, constraint: Constraint, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            constraint,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.field, self.constraint, self.message)
    }
}

/// Structured payload of a `VALIDATION_FAILED` error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDetails {
    pub error_type: ValidationErrorType,
    /// Offending code(s) and rule-specific facts (expected/actual, counts).
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Every field-level violation; populated for structural failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

impl ValidationDetails {
    /// Flatten into a single JSON object with `error_type` always present.
    pub fn to_json(&self) -> Value {
        let mut out = self.context.clone();
        out.insert(
            "error_type".to_string(),
            Value::String(self.error_type.to_string()),
        );
        if !self.violations.is_empty() {
            out.insert(
                "violations".to_string(),
                serde_json::to_value(&self.violations).unwrap_or(Value::Null),
            );
        }
        Value::Object(out)
    }
}

#[derive(Debug, Error)]
pub enum CanonError {
    #[error("canon violation: {0}")]
    CanonViolation(String),

    #[error("contract mismatch: {0}")]
    ContractMismatch(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {message}")]
    ValidationFailed {
        message: String,
        details: Box<ValidationDetails>,
    },

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CanonError {
    /// Rule failure with a context object naming the offending code(s).
    ///
    /// `context` is expected to be a JSON object; anything else is stored
    /// under a `value` key.
    pub fn validation(
        error_type: ValidationErrorType,
        message: impl Into<String>,
        context: Value,
    ) -> Self {
        let context = match context {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("value".to_string(), other)]),
        };
        Self::ValidationFailed {
            message: message.into(),
            details: Box::new(ValidationDetails {
                error_type,
                context,
                violations: Vec::new(),
            }),
        }
    }

    /// Structural failure of a shape, carrying every field violation.
    pub fn structural(kind: ShapeKind, violations: Vec<FieldViolation>) -> Self {
        Self::with_violations(ValidationErrorType::SchemaViolation, kind.as_str(), violations)
    }

    /// Failure carrying field violations under an explicit error type.
    pub fn with_violations(
        error_type: ValidationErrorType,
        subject: &str,
        violations: Vec<FieldViolation>,
    ) -> Self {
        let listing = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let message = format!(
            "{subject} failed structural validation with {} violation(s): {listing}",
            violations.len()
        );
        let context = Map::from_iter([("shape".to_string(), Value::String(subject.to_string()))]);
        Self::ValidationFailed {
            message,
            details: Box::new(ValidationDetails {
                error_type,
                context,
                violations,
            }),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CanonViolation(_) => ErrorKind::CanonViolation,
            Self::ContractMismatch(_) => ErrorKind::ContractMismatch,
            Self::PolicyDenied(_) => ErrorKind::PolicyDenied,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::CanonViolation(_) => 422,
            Self::ContractMismatch(_) => 400,
            Self::PolicyDenied(_) => 403,
            Self::Unauthenticated(_) => 401,
            Self::Unauthorized(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::ValidationFailed { .. } => 422,
            Self::Internal(_) => 500,
        }
    }

    pub fn details(&self) -> Option<&ValidationDetails> {
        match self {
            Self::ValidationFailed { details, .. } => Some(details),
            _ => None,
        }
    }

    pub fn error_type(&self) -> Option<ValidationErrorType> {
        self.details().map(|d| d.error_type)
    }

    /// "Malformed": the input failed a shape contract.
    pub fn is_structural(&self) -> bool {
        self.error_type() == Some(ValidationErrorType::SchemaViolation)
    }

    /// "Not canon-compliant": structurally fine but broke the naming law.
    pub fn is_naming_violation(&self) -> bool {
        self.error_type().is_some_and(|t| t.is_naming())
    }

    pub fn violations(&self) -> &[FieldViolation] {
        self.details().map(|d| d.violations.as_slice()).unwrap_or(&[])
    }
}
