// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A replicated cache facade over several independent backends.
//!
//! A [`ReplicatedCache`] presents one logical cache region stored on N backends,
//! each reached through a [`RegionStrategy`]:
//!
//! - reads are served by one backend picked uniformly at random,
//! - writes and removals are applied to every backend in order,
//! - locks are taken on every backend or on none, with rollback on partial failure.
//!
//! The facade does not repair divergence. A write that fails on backend *i* leaves
//! backends before *i* updated and the rest untouched, and reports the error.
//!
//! # Examples
//!
//! ```
//! use fanout::ReplicatedCache;
//! use fanout_memory::InMemoryInstance;
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let clock = Clock::new_frozen();
//! let nodes: Vec<_> = ["node-a", "node-b", "node-c"]
//!     .into_iter()
//!     .map(|name| InMemoryInstance::<String, i32>::new(clock.clone(), name))
//!     .collect();
//!
//! let cache = ReplicatedCache::builder::<String, i32>(clock, "users")
//!     .strategies(nodes.iter().map(|n| n.ensure_region("users").0))
//!     .build()?;
//!
//! cache.put(&"alice".to_string(), &1).await?;
//!
//! let tokens = cache.lock(&"alice".to_string()).await?;
//! assert_eq!(tokens.len(), 3);
//! cache.unlock(&"alice".to_string(), &tokens).await?;
//! # Ok::<(), fanout::Error>(())
//! # });
//! ```
//!
//! # Mixing backends
//!
//! All strategies of one cache share a type. To replicate across different
//! backend kinds, erase them with
//! [`DynamicStrategyExt::into_dynamic`](fanout_region::DynamicStrategyExt::into_dynamic)
//! (feature `dynamic-strategy`).
//!
//! # Features
//!
//! - `memory` (default): re-exports the in-memory backend.
//! - `logs` (default): structured `tracing` events for cache activity, enabled per
//!   cache with [`ReplicatedCacheBuilder::logs`].
//! - `serde`: deserializable [`ReplicatedCacheOptions`].
//! - `dynamic-strategy`: type-erased strategies.
//! - `test-util`: re-exports the recording [`MockStrategy`].

pub mod blocking;
pub mod builder;
pub mod cache;
mod options;
mod provider;
mod telemetry;
mod timestamp;

#[doc(inline)]
pub use blocking::BlockingCache;
#[doc(inline)]
pub use builder::ReplicatedCacheBuilder;
#[doc(inline)]
pub use cache::{LockTokens, ReplicatedCache};
#[cfg(feature = "memory")]
#[doc(inline)]
pub use fanout_memory::{InMemoryInstance, InMemoryRegion};
#[doc(inline)]
pub use fanout_region::{Error, ErrorKind, LockOptions, LockToken, RegionSetup, RegionStrategy, Result};
#[cfg(feature = "dynamic-strategy")]
#[doc(inline)]
pub use fanout_region::{DynamicStrategy, DynamicStrategyExt};
#[doc(inline)]
pub use options::ReplicatedCacheOptions;
#[doc(inline)]
pub use provider::CacheProvider;
#[doc(inline)]
pub use timestamp::{ONE_MS, Timestamper, to_timestamp_units};

#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use fanout_region::testing::{MockStrategy, StrategyOp};
