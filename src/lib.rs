//! Canon Registry - invariant-enforced validation for a canonical taxonomy
//!
//! Concepts, value sets and values are defined once and validated before
//! anything downstream trusts them. Raw input flows through:
//!
//! structural contract -> naming law -> cache -> caller
//!
//! Packs and the kernel registry additionally pass the cross-registry
//! integrity checker. Manifests scope which concepts a tenant may use and
//! how (CRUD-S roles, workflow).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use canon_registry::{CanonEngine, EngineConfig};
//! use serde_json::json;
//!
//! let engine = CanonEngine::new(EngineConfig::default())?;
//! let value = engine.validate_value(&json!({
//!     "code": "INV_DRAFT",
//!     "value_set_code": "INVOICE_STATUS",
//!     "label": "Draft",
//! }))?;
//! assert_eq!(value.label, "Draft");
//! # Ok::<(), canon_registry::CanonError>(())
//! ```

// Error taxonomy
pub mod error;

// Identifier and version rules
pub mod identifier;

// Shape contracts and the rule layers on top of them
pub mod integrity;
pub mod naming;
pub mod shapes;
pub mod validate;

// Result cache, in-process and persistent tiers
pub mod adapter;
pub mod cache;

// Engine context, configuration and telemetry
pub mod config;
pub mod engine;
pub mod monitor;

// Governance
pub mod manifest;

// Snapshot ids and registry loading
pub mod loader;
pub mod snapshot;

pub use cache::{CacheStats, KindStats, ShapeCache};
pub use config::EngineConfig;
pub use engine::CanonEngine;
pub use error::{CanonError, ErrorKind, Result, ValidationErrorType};
pub use identifier::{CanonId, SchemaVersion};
pub use loader::{load_registry, LoadedRegistry};
pub use shapes::{
    CanonShape, ConceptShape, KernelRegistryShape, PackShape, ValueSetShape, ValueShape,
};
pub use snapshot::{compute_snapshot_id, registry_snapshot_id, TaxonomyCounts};
pub use validate::{
    validate_concept, validate_kernel_registry, validate_pack, validate_value, validate_value_set,
};
