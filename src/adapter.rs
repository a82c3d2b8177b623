//! Persistent second-tier cache.
//!
//! The engine itself only talks to the in-process [`ShapeCache`]. Hosting
//! applications that mirror validated shapes into an external store (a SQL
//! table, a KV service) implement [`PersistentShapeCache`] and wrap both
//! tiers in a [`TieredShapeCache`]. Adapter calls are bounded by a timeout
//! and a retry budget; an adapter that keeps failing degrades to misses.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{Cacheable, ShapeCache};
use crate::config::AdapterConfig;
use crate::error::CanonError;
use crate::shapes::{ConceptShape, ValueSetShape, ValueShape};

pub type Result<T> = std::result::Result<T, CanonError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub concepts: usize,
    pub value_sets: usize,
    pub values: usize,
    /// Entries past their TTL that have not been cleaned yet.
    pub expired: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
}

/// External store for validated shapes, keyed the same way as the
/// in-process tier (code, or [`value_key`](crate::cache::value_key) for values).
#[async_trait]
pub trait PersistentShapeCache: Send + Sync {
    // ── Reads ──────────────────────────────────────────────────

    async fn get_concept(&self, code: &str) -> Result<Option<ConceptShape>>;

    async fn get_value_set(&self, code: &str) -> Result<Option<ValueSetShape>>;

    async fn get_value(&self, code: &str) -> Result<Option<ValueShape>>;

    // ── Writes ─────────────────────────────────────────────────

    async fn set_concept(&self, code: &str, shape: &ConceptShape) -> Result<()>;

    async fn set_value_set(&self, code: &str, shape: &ValueSetShape) -> Result<()>;

    async fn set_value(&self, code: &str, shape: &ValueShape) -> Result<()>;

    // ── Maintenance ────────────────────────────────────────────

    async fn clear(&self) -> Result<()>;

    /// Drop entries past their TTL. Returns how many were removed.
    async fn clean_expired(&self) -> Result<usize>;

    async fn stats(&self) -> Result<PersistentCacheStats>;

    async fn database_stats(&self) -> Result<DatabaseStats>;
}

// ── In-memory reference store ─────────────────────────────────────

struct Stored<T> {
    shape: T,
    written_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

struct Table<T> {
    rows: HashMap<String, Stored<T>>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    fn get(&self, code: &str, now: DateTime<Utc>) -> Option<T> {
        self.rows
            .get(code)
            .filter(|row| row.expires_at > now)
            .map(|row| row.shape.clone())
    }

    fn put(&mut self, code: &str, shape: T, now: DateTime<Utc>, ttl: chrono::Duration) {
        self.rows.insert(
            code.to_string(),
            Stored {
                shape,
                written_at: now,
                expires_at: now + ttl,
            },
        );
    }

    fn expired(&self, now: DateTime<Utc>) -> usize {
        self.rows.values().filter(|row| row.expires_at <= now).count()
    }

    fn purge(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| row.expires_at > now);
        before - self.rows.len()
    }

    fn oldest(&self) -> Option<DateTime<Utc>> {
        self.rows.values().map(|row| row.written_at).min()
    }
}

struct Tables {
    concepts: Table<ConceptShape>,
    value_sets: Table<ValueSetShape>,
    values: Table<ValueShape>,
    hits: u64,
    misses: u64,
}

impl Tables {
    fn record<T>(&mut self, found: Option<T>) -> Option<T> {
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }
}

/// TTL-bounded store held in memory.
pub struct MemoryPersistentCache {
    ttl: chrono::Duration,
    tables: Mutex<Tables>,
}

impl MemoryPersistentCache {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            tables: Mutex::new(Tables {
                concepts: Table::new(),
                value_sets: Table::new(),
                values: Table::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }
}

impl Default for MemoryPersistentCache {
    fn default() -> Self {
        Self::new(chrono::Duration::hours(24))
    }
}

#[async_trait]
impl PersistentShapeCache for MemoryPersistentCache {
    async fn get_concept(&self, code: &str) -> Result<Option<ConceptShape>> {
        let mut t = self.tables.lock().await;
        let found = t.concepts.get(code, Utc::now());
        Ok(t.record(found))
    }

    async fn get_value_set(&self, code: &str) -> Result<Option<ValueSetShape>> {
        let mut t = self.tables.lock().await;
        let found = t.value_sets.get(code, Utc::now());
        Ok(t.record(found))
    }

    async fn get_value(&self, code: &str) -> Result<Option<ValueShape>> {
        let mut t = self.tables.lock().await;
        let found = t.values.get(code, Utc::now());
        Ok(t.record(found))
    }

    async fn set_concept(&self, code: &str, shape: &ConceptShape) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.concepts.put(code, shape.clone(), Utc::now(), self.ttl);
        Ok(())
    }

    async fn set_value_set(&self, code: &str, shape: &ValueSetShape) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.value_sets.put(code, shape.clone(), Utc::now(), self.ttl);
        Ok(())
    }

    async fn set_value(&self, code: &str, shape: &ValueShape) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.values.put(code, shape.clone(), Utc::now(), self.ttl);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.concepts.rows.clear();
        t.value_sets.rows.clear();
        t.values.rows.clear();
        t.hits = 0;
        t.misses = 0;
        Ok(())
    }

    async fn clean_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut t = self.tables.lock().await;
        let removed = t.concepts.purge(now) + t.value_sets.purge(now) + t.values.purge(now);
        debug!(removed, "persistent cache cleaned");
        Ok(removed)
    }

    async fn stats(&self) -> Result<PersistentCacheStats> {
        let t = self.tables.lock().await;
        Ok(PersistentCacheStats {
            hits: t.hits,
            misses: t.misses,
            entries: t.concepts.rows.len() + t.value_sets.rows.len() + t.values.rows.len(),
        })
    }

    async fn database_stats(&self) -> Result<DatabaseStats> {
        let now = Utc::now();
        let t = self.tables.lock().await;
        Ok(DatabaseStats {
            concepts: t.concepts.rows.len(),
            value_sets: t.value_sets.rows.len(),
            values: t.values.rows.len(),
            expired: t.concepts.expired(now) + t.value_sets.expired(now) + t.values.expired(now),
            oldest_entry: [
                t.concepts.oldest(),
                t.value_sets.oldest(),
                t.values.oldest(),
            ]
            .into_iter()
            .flatten()
            .min(),
        })
    }
}

// ── Two-tier composition ──────────────────────────────────────────

/// In-process LRU in front of a persistent store.
pub struct TieredShapeCache {
    local: Arc<ShapeCache>,
    remote: Arc<dyn PersistentShapeCache>,
    timeout: Duration,
    max_retries: u32,
}

impl TieredShapeCache {
    pub fn new(
        local: Arc<ShapeCache>,
        remote: Arc<dyn PersistentShapeCache>,
        config: &AdapterConfig,
    ) -> Self {
        Self {
            local,
            remote,
            timeout: config.timeout(),
            max_retries: config.max_retries,
        }
    }

    pub fn local(&self) -> &Arc<ShapeCache> {
        &self.local
    }

    pub fn remote(&self) -> &Arc<dyn PersistentShapeCache> {
        &self.remote
    }

    /// Run an adapter call under the timeout/retry policy. `None` once the
    /// budget is spent.
    async fn call<T, F, Fut>(&self, op: &'static str, code: &str, mut f: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 0..=self.max_retries {
            match tokio::time::timeout(self.timeout, f()).await {
                Ok(Ok(value)) => return Some(value),
                Ok(Err(e)) => {
                    warn!(op, code, attempt, error = %e, "persistent cache call failed");
                }
                Err(_) => {
                    warn!(
                        op,
                        code,
                        attempt,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "persistent cache call timed out"
                    );
                }
            }
        }
        None
    }

    pub async fn get_concept(&self, code: &str) -> Option<Arc<ConceptShape>> {
        if let Some(hit) = self.local.get_concept(code) {
            return Some(hit);
        }
        let found = self
            .call("get_concept", code, || self.remote.get_concept(code))
            .await
            .flatten()?;
        Some(self.local.store(found))
    }

    pub async fn get_value_set(&self, code: &str) -> Option<Arc<ValueSetShape>> {
        if let Some(hit) = self.local.get_value_set(code) {
            return Some(hit);
        }
        let found = self
            .call("get_value_set", code, || self.remote.get_value_set(code))
            .await
            .flatten()?;
        Some(self.local.store(found))
    }

    /// `key` as built by [`value_key`](crate::cache::value_key).
    pub async fn get_value(&self, key: &str) -> Option<Arc<ValueShape>> {
        if let Some(hit) = self.local.get_value(key) {
            return Some(hit);
        }
        let found = self
            .call("get_value", key, || self.remote.get_value(key))
            .await
            .flatten()?;
        Some(self.local.store(found))
    }

    /// Write-through. The local entry is kept even if the remote write fails.
    pub async fn set_concept(&self, shape: ConceptShape) -> Arc<ConceptShape> {
        let shape = self.local.store(shape);
        let key = shape.cache_key();
        self.call("set_concept", &key, || self.remote.set_concept(&key, &shape))
        .await;
        shape
    }

    pub async fn set_value_set(&self, shape: ValueSetShape) -> Arc<ValueSetShape> {
        let shape = self.local.store(shape);
        let key = shape.cache_key();
        self.call("set_value_set", &key, || self.remote.set_value_set(&key, &shape))
        .await;
        shape
    }

    pub async fn set_value(&self, shape: ValueShape) -> Arc<ValueShape> {
        let shape = self.local.store(shape);
        let key = shape.cache_key();
        self.call("set_value", &key, || self.remote.set_value(&key, &shape))
        .await;
        shape
    }

    /// Clear both tiers. Returns false if the remote clear did not succeed.
    pub async fn clear(&self) -> bool {
        self.local.clear();
        self.call("clear", "*", || self.remote.clear()).await.is_some()
    }
}
