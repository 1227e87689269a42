// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache Provider Example
//!
//! Builds one replicated cache per region from shared in-memory nodes and stops
//! them all at shutdown.

use std::time::Duration;

use fanout::{CacheProvider, InMemoryInstance, ReplicatedCacheOptions};
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), fanout::Error> {
    let clock = Clock::new_tokio();
    let nodes = [
        InMemoryInstance::<String, u64>::new(clock.clone(), "node-a"),
        InMemoryInstance::<String, u64>::new(clock.clone(), "node-b"),
    ];

    let defaults = ReplicatedCacheOptions::default().lock_key_timeout(Duration::from_secs(10));
    let provider: CacheProvider<String, u64, _, _> = CacheProvider::new(
        clock,
        move |region: &str| Ok(nodes.iter().map(|n| n.ensure_region(region).0).collect()),
        defaults,
    );
    provider.start();

    let (users, _) = provider.build_cache("users")?;
    let (orders, _) = provider.build_cache("orders")?;

    // Timestamps are unique across every cache of the provider
    users.put(&"alice".to_string(), &users.next_timestamp()).await?;
    orders.put(&"order:1".to_string(), &orders.next_timestamp()).await?;

    println!("regions: {:?}", provider.regions());

    provider.stop();
    Ok(())
}
