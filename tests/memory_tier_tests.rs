//! In-process tier: hits, misses, version filtering, expiry and capacity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use datasource_cache::{Entity, Key, MemoryTier, Provider};

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    id: u64,
    value: String,
    model_version: u16,
}

impl Entity for Profile {
    fn model_version(&self) -> u16 {
        self.model_version
    }
}

fn profile(id: u64, value: &str, model_version: u16) -> Arc<Profile> {
    Arc::new(Profile {
        id,
        value: value.to_string(),
        model_version,
    })
}

fn key(id: u64) -> Key<u64> {
    Key::new(format!("profile:{id}"), id)
}

async fn store(tier: &MemoryTier<Profile>, values: &[(Key<u64>, Arc<Profile>)]) {
    let values: HashMap<String, Arc<Profile>> = values
        .iter()
        .map(|(k, v)| (k.cache_key.clone(), Arc::clone(v)))
        .collect();
    Provider::<Profile, u64>::mset(tier, &values, Duration::from_secs(60))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_miss() {
    let tier = MemoryTier::<Profile>::new(100);
    assert!(tier.get(&key(1), 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_hit_returns_shared_value() {
    let tier = MemoryTier::<Profile>::new(100);
    let value = profile(1, "E1", 1);
    store(&tier, &[(key(1), Arc::clone(&value))]).await;

    let found = tier.get(&key(1), 1).await.unwrap().unwrap();
    assert_eq!(found.value, "E1");
    assert!(Arc::ptr_eq(&found, &value));
}

#[tokio::test]
async fn test_get_version_mismatch_is_miss() {
    let tier = MemoryTier::<Profile>::new(100);
    store(&tier, &[(key(1), profile(1, "E1", 1))]).await;

    assert!(tier.get(&key(1), 2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_mget_partitions_found_and_missing() {
    let tier = MemoryTier::<Profile>::new(100);
    store(&tier, &[(key(1), profile(1, "E1", 1))]).await;

    let lookup = tier.mget(&[key(1), key(2)], 1).await.unwrap();

    assert_eq!(lookup.found.len(), 1);
    assert_eq!(lookup.found[&key(1)].value, "E1");
    assert_eq!(lookup.missing, vec![key(2)]);
    assert_eq!(lookup.missing[0].original_value, 2);
}

#[tokio::test]
async fn test_mget_partial_version_mismatch() {
    let tier = MemoryTier::<Profile>::new(100);
    store(
        &tier,
        &[(key(1), profile(1, "E1", 2)), (key(2), profile(2, "E2", 1))],
    )
    .await;

    let lookup = tier.mget(&[key(1), key(2)], 1).await.unwrap();

    assert_eq!(lookup.found.len(), 1);
    assert!(lookup.found.contains_key("profile:2"));
    assert_eq!(lookup.missing, vec![key(1)]);
}

#[tokio::test]
async fn test_mset_overwrites() {
    let tier = MemoryTier::<Profile>::new(100);
    store(&tier, &[(key(1), profile(1, "old", 1))]).await;
    store(&tier, &[(key(1), profile(1, "new", 1))]).await;

    assert_eq!(tier.get(&key(1), 1).await.unwrap().unwrap().value, "new");
}

#[tokio::test]
async fn test_entries_expire_after_tier_ttl() {
    let tier = MemoryTier::<Profile>::with_ttl(100, Duration::from_millis(50));
    // The per-call TTL (60s in `store`) does not apply to this tier.
    store(&tier, &[(key(1), profile(1, "E1", 1))]).await;
    assert!(tier.get(&key(1), 1).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(tier.get(&key(1), 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_capacity_is_bounded() {
    let tier = MemoryTier::<Profile>::new(10);
    let values: Vec<(Key<u64>, Arc<Profile>)> =
        (0..100).map(|id| (key(id), profile(id, "v", 1))).collect();
    store(&tier, &values).await;

    tier.run_pending_tasks();

    assert!(tier.entry_count() <= 10);
}

#[tokio::test]
async fn test_overflow_evicts_oldest_keeps_newest() {
    let tier = MemoryTier::<Profile>::new(10);
    for id in 0..20 {
        store(&tier, &[(key(id), profile(id, "v", 1))]).await;
        tier.run_pending_tasks();
    }

    assert_eq!(tier.entry_count(), 10);
    // A freshly written key is always admitted.
    assert!(tier.get(&key(19), 1).await.unwrap().is_some());
    assert!(tier.get(&key(10), 1).await.unwrap().is_some());
    assert!(tier.get(&key(0), 1).await.unwrap().is_none());
    assert!(tier.get(&key(9), 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_refreshes_recency() {
    let tier = MemoryTier::<Profile>::new(3);
    for id in 0..3 {
        store(&tier, &[(key(id), profile(id, "v", 1))]).await;
        tier.run_pending_tasks();
    }

    assert!(tier.get(&key(0), 1).await.unwrap().is_some());
    tier.run_pending_tasks();

    store(&tier, &[(key(3), profile(3, "v", 1))]).await;
    tier.run_pending_tasks();

    assert!(tier.get(&key(0), 1).await.unwrap().is_some());
    assert!(tier.get(&key(1), 1).await.unwrap().is_none());
    assert!(tier.get(&key(3), 1).await.unwrap().is_some());
}

#[tokio::test]
async fn test_name_override() {
    let tier = MemoryTier::<Profile>::new(1).named("l1");
    assert_eq!(Provider::<Profile, u64>::name(&tier), "l1");
}
