//! Monitoring extension points.
//!
//! The engine reports timings and failures; it does not store or ship them.
//! Subscribers (a metrics pipeline, a log shipper) implement [`TelemetrySink`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CanonError, ErrorKind, ValidationErrorType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSample {
    /// Operation name, e.g. `validate_concept`.
    pub operation: &'static str,
    pub duration: Duration,
    /// Served from the validation cache.
    pub cache_hit: bool,
    pub success: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedError {
    pub operation: &'static str,
    pub kind: ErrorKind,
    pub error_type: Option<ValidationErrorType>,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl TrackedError {
    pub fn from_error(operation: &'static str, error: &CanonError) -> Self {
        Self {
            operation,
            kind: error.kind(),
            error_type: error.error_type(),
            message: error.to_string(),
            at: Utc::now(),
        }
    }
}

pub trait TelemetrySink: Send + Sync {
    fn performance_measured(&self, _sample: &PerformanceSample) {}

    fn error_tracked(&self, _error: &TrackedError) {}
}

#[derive(Default)]
pub struct MonitoringHooks {
    sinks: RwLock<Vec<Arc<dyn TelemetrySink>>>,
}

impl std::fmt::Debug for MonitoringHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringHooks")
            .field("sinks", &self.len())
            .finish()
    }
}

impl MonitoringHooks {
    pub fn subscribe(&self, sink: Arc<dyn TelemetrySink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sinks are called outside the lock, so a sink may subscribe others.
    fn snapshot(&self) -> Vec<Arc<dyn TelemetrySink>> {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn performance_measured(&self, sample: &PerformanceSample) {
        for sink in self.snapshot() {
            sink.performance_measured(sample);
        }
    }

    pub fn error_tracked(&self, error: &TrackedError) {
        for sink in self.snapshot() {
            sink.error_tracked(error);
        }
    }
}

/// Sink that keeps everything in memory. Useful in tests and dashboards.
#[derive(Debug, Default)]
pub struct RecordingSink {
    samples: RwLock<Vec<PerformanceSample>>,
    errors: RwLock<Vec<TrackedError>>,
}

impl RecordingSink {
    pub fn samples(&self) -> Vec<PerformanceSample> {
        self.samples.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn errors(&self) -> Vec<TrackedError> {
        self.errors.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn performance_measured(&self, sample: &PerformanceSample) {
        self.samples
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sample.clone());
    }

    fn error_tracked(&self, error: &TrackedError) {
        self.errors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fans_out_to_every_sink() {
        let hooks = MonitoringHooks::default();
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        hooks.subscribe(a.clone());
        hooks.subscribe(b.clone());
        assert_eq!(hooks.len(), 2);

        hooks.performance_measured(&PerformanceSample {
            operation: "validate_value",
            duration: Duration::from_micros(40),
            cache_hit: false,
            success: true,
            at: Utc::now(),
        });
        assert_eq!(a.samples().len(), 1);
        assert_eq!(b.samples()[0].operation, "validate_value");
    }

    /// Subscribes another sink the first time it hears anything.
    struct Recruiter {
        hooks: Arc<MonitoringHooks>,
        recruit: Arc<RecordingSink>,
    }

    impl TelemetrySink for Recruiter {
        fn performance_measured(&self, _sample: &PerformanceSample) {
            if self.hooks.len() == 1 {
                self.hooks.subscribe(self.recruit.clone());
            }
        }
    }

    #[test]
    fn sink_may_subscribe_while_dispatching() {
        let hooks = Arc::new(MonitoringHooks::default());
        let recruit = Arc::new(RecordingSink::default());
        hooks.subscribe(Arc::new(Recruiter {
            hooks: hooks.clone(),
            recruit: recruit.clone(),
        }));

        let sample = PerformanceSample {
            operation: "validate_concept",
            duration: Duration::from_micros(5),
            cache_hit: true,
            success: true,
            at: Utc::now(),
        };
        hooks.performance_measured(&sample);
        assert_eq!(hooks.len(), 2);
        // Joined after the first dispatch, so it only sees the second
        assert!(recruit.samples().is_empty());
        hooks.performance_measured(&sample);
        assert_eq!(recruit.samples().len(), 1);
    }

    #[test]
    fn tracked_error_keeps_discriminators() {
        let err = CanonError::validation(
            ValidationErrorType::InsufficientValues,
            "Value set 'STATUS' has 1 value(s), minimum is 2",
            json!({ "value_set_code": "STATUS" }),
        );
        let tracked = TrackedError::from_error("validate_kernel_registry", &err);
        assert_eq!(tracked.kind, ErrorKind::ValidationFailed);
        assert_eq!(tracked.error_type, Some(ValidationErrorType::InsufficientValues));

        let hooks = MonitoringHooks::default();
        assert!(hooks.is_empty());
        let sink = Arc::new(RecordingSink::default());
        hooks.subscribe(sink.clone());
        hooks.error_tracked(&tracked);
        assert_eq!(sink.errors()[0].operation, "validate_kernel_registry");
    }
}
