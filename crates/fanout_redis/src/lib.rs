// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]

//! Redis region strategy for the fanout replicated cache.
//!
//! [`RedisRegion`] implements [`RegionStrategy`](fanout_region::RegionStrategy)
//! over one Redis server. A replicated cache over several servers is built by
//! handing one `RedisRegion` per server to `fanout::ReplicatedCache`.
//!
//! # Storage layout
//!
//! | Item  | Redis key                              | Value          |
//! |-------|----------------------------------------|----------------|
//! | entry | `{prefix}{region}:data:{key}`          | JSON           |
//! | lock  | `{prefix}{region}:lock:{key}{suffix}`  | the lock token |
//!
//! `clear` sweeps the `{prefix}{region}:data:` namespace with `SCAN` and `DEL`.
//! Locks held in the region survive it and expire on their own.
//!
//! # Locks
//!
//! A contended lock is retried up to the configured retry count, sleeping a random
//! delay between the minimum and maximum retry delays, until the acquire timeout
//! elapses. Batch locking and every unlock run as Lua scripts, so a batch is
//! checked and set atomically and only the token holder can release a lock.
//!
//! Waiting and acquire deadlines use the region's `tick::Clock`. Under Tokio, pass
//! `Clock::new_tokio()`.

mod options;
mod region;

#[doc(inline)]
pub use options::RedisRegionOptions;
#[doc(inline)]
pub use region::RedisRegion;
