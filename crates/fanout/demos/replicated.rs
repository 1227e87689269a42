// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Replicated Cache Example
//!
//! Replicates one region over three in-memory nodes, takes a lock across all of
//! them, and shows what a partial lock failure looks like.

use fanout::{ErrorKind, InMemoryInstance, RegionStrategy, ReplicatedCache};
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), fanout::Error> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let clock = Clock::new_tokio();
    let nodes: Vec<_> = ["node-a", "node-b", "node-c"]
        .into_iter()
        .map(|name| InMemoryInstance::<String, String>::new(clock.clone(), name))
        .collect();

    let cache = ReplicatedCache::builder::<String, String>(clock, "sessions")
        .strategies(nodes.iter().map(|n| n.ensure_region("sessions").0))
        .logs()
        .build()?;

    // Written to every node, read from a random one
    let key = "session:42".to_string();
    cache.put(&key, &"alice".to_string()).await?;
    let _value = cache.get(&key).await?;

    // One token per node, in node order
    let tokens = cache.lock(&key).await?;
    cache.unlock(&key, &tokens).await?;

    // A lock held directly on the last node makes the replicated lock fail;
    // the first two nodes are rolled back
    let last = nodes[2].ensure_region("sessions").0;
    let held = last.lock(&key).await?;
    match cache.lock(&key).await {
        Err(error) if error.kind() == ErrorKind::LockNotAcquired => {}
        other => println!("unexpected lock outcome: {other:?}"),
    }
    last.unlock(&key, &held).await?;

    cache.remove(&key).await?;
    cache.destroy();
    Ok(())
}
