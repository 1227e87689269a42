// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lifecycle of `CacheProvider`.

#![cfg(feature = "memory")]

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use fanout::{CacheProvider, ErrorKind, InMemoryInstance, InMemoryRegion, ONE_MS, RegionSetup, ReplicatedCacheOptions};
use tick::{Clock, ClockControl};

type Region = InMemoryRegion<String, i32>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn nodes() -> Arc<Vec<InMemoryInstance<String, i32>>> {
    Arc::new(vec![
        InMemoryInstance::new(Clock::new_frozen(), "node-a"),
        InMemoryInstance::new(Clock::new_frozen(), "node-b"),
    ])
}

fn provider(
    nodes: &Arc<Vec<InMemoryInstance<String, i32>>>,
    defaults: ReplicatedCacheOptions,
) -> CacheProvider<String, i32, Region, impl Fn(&str) -> fanout::Result<Vec<Region>>> {
    provider_on(Clock::new_frozen(), nodes, defaults)
}

fn provider_on(
    clock: Clock,
    nodes: &Arc<Vec<InMemoryInstance<String, i32>>>,
    defaults: ReplicatedCacheOptions,
) -> CacheProvider<String, i32, Region, impl Fn(&str) -> fanout::Result<Vec<Region>>> {
    let nodes = Arc::clone(nodes);
    CacheProvider::new(
        clock,
        move |region: &str| Ok(nodes.iter().map(|n| n.ensure_region(region).0).collect()),
        defaults,
    )
}

#[test]
fn build_cache_is_idempotent() {
    let nodes = nodes();
    let provider = provider(&nodes, ReplicatedCacheOptions::default());
    provider.start();

    let (first, setup) = provider.build_cache("users").expect("build failed");
    assert_eq!(setup, RegionSetup::Created);

    let (second, setup) = provider.build_cache("users").expect("build failed");
    assert_eq!(setup, RegionSetup::AlreadyExists);
    assert!(Arc::ptr_eq(&first, &second));

    for node in nodes.iter() {
        assert_eq!(node.region_names(), vec!["users".to_string()]);
    }
}

#[test]
fn caches_share_backend_regions() {
    let nodes = nodes();
    let provider = provider(&nodes, ReplicatedCacheOptions::default());
    provider.start();

    let (users, _) = provider.build_cache("users").expect("build failed");
    block_on(users.put(&"alice".to_string(), &7)).expect("put failed");

    for node in nodes.iter() {
        let region = node.region("users").expect("region should exist");
        assert_eq!(block_on(region.entry_count()), 1);
    }
}

#[test]
fn defaults_apply_to_every_cache() {
    let nodes = nodes();
    let defaults = ReplicatedCacheOptions::new("ignored").lock_key_timeout(Duration::from_secs(3));
    let provider = provider(&nodes, defaults);
    provider.start();

    let (users, _) = provider.build_cache("users").expect("build failed");
    let (orders, _) = provider.build_cache("orders").expect("build failed");

    assert_eq!(users.region_name(), "users");
    assert_eq!(orders.region_name(), "orders");
    assert_eq!(users.timeout(), 3_000 * ONE_MS);
    assert_eq!(orders.timeout(), 3_000 * ONE_MS);
    assert_eq!(provider.regions(), vec!["orders".to_string(), "users".to_string()]);
}

#[test]
fn caches_share_one_timestamp_source() {
    let nodes = nodes();
    let provider = provider(&nodes, ReplicatedCacheOptions::default());
    provider.start();

    let (users, _) = provider.build_cache("users").expect("build failed");
    let (orders, _) = provider.build_cache("orders").expect("build failed");

    let mut stamps = Vec::new();
    for _ in 0..100 {
        stamps.push(users.next_timestamp());
        stamps.push(orders.next_timestamp());
        stamps.push(provider.next_timestamp());
    }
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn timestamps_follow_the_provider_clock() {
    let control = ClockControl::new_at(SystemTime::UNIX_EPOCH + Duration::from_secs(60));
    let nodes = nodes();
    let provider = provider_on(control.to_clock(), &nodes, ReplicatedCacheOptions::default());
    provider.start();
    let (users, _) = provider.build_cache("users").expect("build failed");

    assert_eq!(users.next_timestamp(), 60_000 * ONE_MS);
    control.advance(Duration::from_secs(1));
    assert_eq!(provider.next_timestamp(), 61_000 * ONE_MS);
}

#[test]
fn stop_forgets_caches_and_refuses_new_ones() {
    let nodes = nodes();
    let provider = provider(&nodes, ReplicatedCacheOptions::default());
    provider.start();
    let (users, _) = provider.build_cache("users").expect("build failed");

    provider.stop();
    assert!(!provider.is_running());
    assert!(provider.regions().is_empty());
    assert!(provider.cache("users").is_none());

    let error = provider.build_cache("users").expect_err("stopped provider should refuse");
    assert_eq!(error.kind(), ErrorKind::Configuration);

    // Handles given out earlier keep working.
    block_on(users.put(&"bob".to_string(), &1)).expect("put failed");
}

#[test]
fn restart_builds_fresh_caches() {
    let nodes = nodes();
    let provider = provider(&nodes, ReplicatedCacheOptions::default());
    provider.start();
    let (before, _) = provider.build_cache("users").expect("build failed");

    provider.stop();
    provider.start();

    let (after, setup) = provider.build_cache("users").expect("build failed");
    assert_eq!(setup, RegionSetup::Created);
    assert!(!Arc::ptr_eq(&before, &after));
}
