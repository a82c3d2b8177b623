//! Validation cache lifecycle through the engine and the two-tier adapter.

use std::sync::Arc;

use canon_registry::adapter::{MemoryPersistentCache, PersistentShapeCache, TieredShapeCache};
use canon_registry::cache::value_key;
use canon_registry::config::{AdapterConfig, CacheConfig};
use canon_registry::{CanonEngine, EngineConfig, ShapeCache, ValueShape};
use serde_json::json;

fn small_engine(capacity: usize) -> CanonEngine {
    CanonEngine::new(EngineConfig {
        cache: CacheConfig {
            value_capacity: capacity,
            ..CacheConfig::default()
        },
        ..EngineConfig::default()
    })
    .unwrap()
}

fn value_input(code: &str) -> serde_json::Value {
    json!({ "code": code, "value_set_code": "STATUS", "label": code })
}

#[test]
fn set_get_clear_through_public_api() {
    let cache = ShapeCache::default();
    let shape = Arc::new(
        canon_registry::validate_value(&value_input("OPEN")).unwrap(),
    );
    cache.set_value("OPEN", Arc::clone(&shape));
    assert!(Arc::ptr_eq(&shape, &cache.get_value("OPEN").unwrap()));
    cache.clear();
    assert!(cache.get_value("OPEN").is_none());
}

#[test]
fn engine_cache_evicts_least_recent() {
    let engine = small_engine(3);
    for code in ["A", "B", "C"] {
        engine.validate_value(&value_input(code)).unwrap();
    }
    // Re-validating A refreshes it, so B is now the oldest
    engine.validate_value(&value_input("A")).unwrap();
    engine.validate_value(&value_input("D")).unwrap();

    let cache = engine.cache();
    assert!(cache.contains::<ValueShape>("STATUS:A"));
    assert!(!cache.contains::<ValueShape>("STATUS:B"));
    assert!(cache.contains::<ValueShape>("STATUS:C"));
    assert!(cache.contains::<ValueShape>("STATUS:D"));
    assert_eq!(cache.stats().values.size, 3);
}

#[test]
fn pause_and_resume_keep_entries() {
    let engine = small_engine(10);
    let first = engine.validate_value(&value_input("OPEN")).unwrap();

    engine.cache().set_enabled(false);
    let uncached = engine.validate_value(&value_input("OPEN")).unwrap();
    assert!(!Arc::ptr_eq(&first, &uncached));

    engine.cache().set_enabled(true);
    let resumed = engine.validate_value(&value_input("OPEN")).unwrap();
    assert!(Arc::ptr_eq(&first, &resumed));
}

#[test]
fn stats_aggregate_across_kinds() {
    let engine = small_engine(10);
    let concept = json!({ "code": "PARTY", "category": "ENTITY", "domain": "PARTY", "description": "Party" });
    engine.validate_concept(&concept).unwrap();
    engine.validate_concept(&concept).unwrap();
    engine.validate_value(&value_input("OPEN")).unwrap();

    let stats = engine.cache().stats();
    assert_eq!(stats.concepts.hits, 1);
    assert_eq!(stats.total_hits(), 1);
    assert_eq!(stats.total_misses(), 2);
    assert_eq!(stats.total_size(), 2);

    engine.cache().reset_stats();
    let stats = engine.cache().stats();
    assert_eq!(stats.total_hits() + stats.total_misses(), 0);
    assert_eq!(stats.total_size(), 2);
}

#[tokio::test]
async fn engine_cache_shared_with_persistent_tier() {
    let engine = small_engine(10);
    let remote = Arc::new(MemoryPersistentCache::default());
    let tiered = TieredShapeCache::new(
        Arc::clone(engine.cache()),
        remote.clone(),
        &AdapterConfig::default(),
    );

    let shape = engine.validate_value(&value_input("OPEN")).unwrap();
    tiered.set_value((*shape).clone()).await;
    assert!(remote.get_value("STATUS:OPEN").await.unwrap().is_some());

    // A fresh process: empty local tier, warm remote tier
    engine.cache().clear();
    let warmed = tiered.get_value(&value_key("STATUS", "OPEN")).await.unwrap();
    assert_eq!(warmed.label, "OPEN");
    assert!(engine.cache().contains::<ValueShape>("STATUS:OPEN"));
}

#[test]
fn shared_handles_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ShapeCache>();
    assert_send_sync::<CanonEngine>();
    assert_send_sync::<TieredShapeCache>();
}

#[test]
fn concurrent_store_clear_and_reset_stay_bounded() {
    const CAPACITY: usize = 16;
    let cache = Arc::new(
        ShapeCache::from_config(&CacheConfig {
            value_capacity: CAPACITY,
            ..CacheConfig::default()
        })
        .unwrap(),
    );

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let cache = Arc::clone(&cache);
            scope.spawn(move || {
                for i in 0..200 {
                    let code = format!("W{worker}_{i}");
                    let shape = canon_registry::validate_value(&value_input(&code)).unwrap();
                    cache.store(shape);
                    cache.get_value(&value_key("STATUS", &code));
                    match i % 50 {
                        17 => cache.reset_stats(),
                        42 => cache.clear(),
                        _ => {}
                    }
                    let stats = cache.stats().values;
                    assert!(stats.size <= CAPACITY);
                    assert_eq!(stats.capacity, CAPACITY);
                }
            });
        }
    });

    let stats = cache.stats().values;
    assert!(stats.size <= CAPACITY);

    // Counters still add up once the writers are gone
    cache.reset_stats();
    cache.store(canon_registry::validate_value(&value_input("LAST")).unwrap());
    assert!(cache.get_value("STATUS:LAST").is_some());
    assert!(cache.get_value("STATUS:NEVER").is_none());
    let stats = cache.stats().values;
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engine_shared_across_tasks_counts_every_lookup() {
    let engine = Arc::new(small_engine(8));
    let mut tasks = Vec::new();
    for task in 0..8 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                let code = format!("T{}_{}", task, i % 12);
                engine.validate_value(&value_input(&code)).unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stats = engine.cache().stats().values;
    assert_eq!(stats.hits + stats.misses, 8 * 50);
    assert!(stats.size <= 8);
}
