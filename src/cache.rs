//! Validation result cache.
//!
//! One bounded LRU per shape kind. Concepts and value sets are keyed by
//! their code; values by `<value_set_code>:<code>` (see [`value_key`]) since
//! value codes are only unique within their set. A single mutex guards all
//! three kinds.
//!
//! Entries hold `Arc`s, so a `get` right after a `set` returns the same
//! allocation. Disabling the cache pauses it: reads miss and writes are
//! dropped, but existing entries survive until re-enabled or cleared.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::{CacheCapacities, CacheConfig};
use crate::error::Result;
use crate::shapes::{CodedShape, ConceptShape, ShapeKind, ValueSetShape, ValueShape};

struct Entry<T> {
    shape: Arc<T>,
    /// Digest of the raw input that produced `shape`, when known.
    digest: Option<String>,
}

#[doc(hidden)]
pub struct Slot<T> {
    entries: LruCache<String, Entry<T>>,
    hits: u64,
    misses: u64,
}

impl<T> Slot<T> {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    fn lookup(&mut self, key: &str, digest: Option<&str>) -> Option<Arc<T>> {
        // Only a matching entry is promoted; a stale one keeps its recency
        let matches = self
            .entries
            .peek(key)
            .is_some_and(|entry| digest.is_none() || entry.digest.as_deref() == digest);
        let found = if matches {
            self.entries.get(key).map(|entry| Arc::clone(&entry.shape))
        } else {
            None
        };
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    fn stats(&self) -> KindStats {
        KindStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
            capacity: self.entries.cap().get(),
        }
    }

    fn reset(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }
}

#[doc(hidden)]
pub struct Slots {
    concepts: Slot<ConceptShape>,
    value_sets: Slot<ValueSetShape>,
    values: Slot<ValueShape>,
}

/// Shapes that have a slot in the [`ShapeCache`].
pub trait Cacheable: CodedShape + Send + Sync + 'static {
    #[doc(hidden)]
    fn slot(slots: &mut Slots) -> &mut Slot<Self>;

    /// Key this shape is cached under.
    fn cache_key(&self) -> String {
        self.code().to_string()
    }

    /// Cache key read from raw input, before validation.
    fn input_key(input: &Value) -> Option<String> {
        input.get("code").and_then(Value::as_str).map(str::to_string)
    }
}

impl Cacheable for ConceptShape {
    fn slot(slots: &mut Slots) -> &mut Slot<Self> {
        &mut slots.concepts
    }
}

impl Cacheable for ValueSetShape {
    fn slot(slots: &mut Slots) -> &mut Slot<Self> {
        &mut slots.value_sets
    }
}

impl Cacheable for ValueShape {
    fn slot(slots: &mut Slots) -> &mut Slot<Self> {
        &mut slots.values
    }

    fn cache_key(&self) -> String {
        value_key(&self.value_set_code, &self.code)
    }

    fn input_key(input: &Value) -> Option<String> {
        let set = input.get("value_set_code").and_then(Value::as_str)?;
        let code = input.get("code").and_then(Value::as_str)?;
        Some(value_key(set, code))
    }
}

/// Cache key of a value: `<value_set_code>:<code>`.
pub fn value_key(value_set_code: &str, code: &str) -> String {
    format!("{value_set_code}:{code}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl KindStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub concepts: KindStats,
    pub value_sets: KindStats,
    pub values: KindStats,
}

impl CacheStats {
    pub fn total_hits(&self) -> u64 {
        self.concepts.hits + self.value_sets.hits + self.values.hits
    }

    pub fn total_misses(&self) -> u64 {
        self.concepts.misses + self.value_sets.misses + self.values.misses
    }

    pub fn total_size(&self) -> usize {
        self.concepts.size + self.value_sets.size + self.values.size
    }

    pub fn hit_rate(&self) -> f64 {
        match self.total_hits() + self.total_misses() {
            0 => 0.0,
            n => self.total_hits() as f64 / n as f64,
        }
    }
}

pub struct ShapeCache {
    slots: Mutex<Slots>,
    enabled: AtomicBool,
}

impl std::fmt::Debug for ShapeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ShapeCache {
    pub fn new(capacities: CacheCapacities) -> Self {
        Self {
            slots: Mutex::new(Slots {
                concepts: Slot::new(capacities.concepts),
                value_sets: Slot::new(capacities.value_sets),
                values: Slot::new(capacities.values),
            }),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let cache = Self::new(config.capacities()?);
        cache.set_enabled(config.enabled);
        Ok(cache)
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // Slots hold plain data; a panic mid-update cannot break an invariant
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Generic access ───────────────────────────────────────────

    /// Look up by key. Promotes the entry to most-recently-used.
    pub fn get<T: Cacheable>(&self, key: &str) -> Option<Arc<T>> {
        self.lookup(key, None)
    }

    /// Look up by key, hitting only if the entry came from input with
    /// this digest (see [`input_digest`]).
    pub fn get_matching<T: Cacheable>(&self, key: &str, digest: &str) -> Option<Arc<T>> {
        self.lookup(key, Some(digest))
    }

    fn lookup<T: Cacheable>(&self, key: &str, digest: Option<&str>) -> Option<Arc<T>> {
        if !self.is_enabled() {
            return None;
        }
        let mut slots = self.lock();
        let found = T::slot(&mut slots).lookup(key, digest);
        debug!(
            kind = %T::KIND,
            key,
            hit = found.is_some(),
            "validation cache lookup"
        );
        found
    }

    pub fn set<T: Cacheable>(&self, key: impl Into<String>, shape: Arc<T>) {
        self.insert(key.into(), shape, None);
    }

    /// Insert under the shape's own [`Cacheable::cache_key`]; returns the
    /// cached handle.
    pub fn store<T: Cacheable>(&self, shape: T) -> Arc<T> {
        let shape = Arc::new(shape);
        self.insert(shape.cache_key(), Arc::clone(&shape), None);
        shape
    }

    pub(crate) fn store_with_digest<T: Cacheable>(&self, shape: Arc<T>, digest: String) {
        self.insert(shape.cache_key(), shape, Some(digest));
    }

    fn insert<T: Cacheable>(&self, key: String, shape: Arc<T>, digest: Option<String>) {
        if !self.is_enabled() {
            return;
        }
        let mut slots = self.lock();
        let slot = T::slot(&mut slots);
        if let Some((evicted, _)) = slot.entries.push(key.clone(), Entry { shape, digest }) {
            if evicted != key {
                debug!(kind = %T::KIND, key = %evicted, "validation cache evicted");
            }
        }
    }

    /// Whether `key` is cached, without touching recency or counters.
    pub fn contains<T: Cacheable>(&self, key: &str) -> bool {
        T::slot(&mut self.lock()).entries.contains(key)
    }

    // ── Named accessors ──────────────────────────────────────────

    pub fn get_concept(&self, code: &str) -> Option<Arc<ConceptShape>> {
        self.get(code)
    }

    pub fn get_value_set(&self, code: &str) -> Option<Arc<ValueSetShape>> {
        self.get(code)
    }

    /// `key` as built by [`value_key`].
    pub fn get_value(&self, key: &str) -> Option<Arc<ValueShape>> {
        self.get(key)
    }

    pub fn set_concept(&self, code: impl Into<String>, shape: Arc<ConceptShape>) {
        self.set(code, shape)
    }

    pub fn set_value_set(&self, code: impl Into<String>, shape: Arc<ValueSetShape>) {
        self.set(code, shape)
    }

    pub fn set_value(&self, key: impl Into<String>, shape: Arc<ValueShape>) {
        self.set(key, shape)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "validation cache toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self.lock();
        CacheStats {
            enabled: self.is_enabled(),
            concepts: slots.concepts.stats(),
            value_sets: slots.value_sets.stats(),
            values: slots.values.stats(),
        }
    }

    pub fn kind_stats(&self, kind: ShapeKind) -> Option<KindStats> {
        let stats = self.stats();
        match kind {
            ShapeKind::Concept => Some(stats.concepts),
            ShapeKind::ValueSet => Some(stats.value_sets),
            ShapeKind::Value => Some(stats.values),
            ShapeKind::Pack | ShapeKind::KernelRegistry => None,
        }
    }

    /// Zero counters; entries stay.
    pub fn reset_stats(&self) {
        let mut slots = self.lock();
        slots.concepts.reset();
        slots.value_sets.reset();
        slots.values.reset();
    }

    /// Evict everything and zero counters.
    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.concepts.entries.clear();
        slots.value_sets.entries.clear();
        slots.values.entries.clear();
        slots.concepts.reset();
        slots.value_sets.reset();
        slots.values.reset();
        info!("validation cache cleared");
    }
}

impl Default for ShapeCache {
    fn default() -> Self {
        Self::new(CacheCapacities::DEFAULT)
    }
}

/// SHA-256 of the canonical JSON serialisation of `input`.
///
/// `serde_json` maps keep keys sorted, so key order in the source text does
/// not affect the digest.
pub fn input_digest(input: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
