// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-memory region strategies backed by moka.
//!
//! This crate simulates independent cache backend instances in process. An
//! [`InMemoryInstance`] plays the role of one cache server holding named regions;
//! each [`InMemoryRegion`] is a [`RegionStrategy`](fanout_region::RegionStrategy)
//! over one of those regions, with moka for storage and a token lock table for
//! per-key locks.
//!
//! # Quick Start
//!
//! ```
//! use fanout_memory::InMemoryInstance;
//! use fanout_region::RegionStrategy;
//! use std::time::Duration;
//! use tick::Clock;
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new_frozen();
//! let instance = InMemoryInstance::<String, i32>::builder(clock, "node-a")
//!     .max_capacity(1000)
//!     .time_to_live(Duration::from_secs(300))
//!     .build();
//!
//! let (region, setup) = instance.ensure_region("users");
//! assert!(setup.is_created());
//!
//! region.put(&"key".to_string(), &42).await.unwrap();
//! assert_eq!(region.get(&"key".to_string()).await.unwrap(), Some(42));
//! # });
//! ```
//!
//! # Locks
//!
//! Locks never wait: a key held by another unexpired token fails immediately with
//! [`ErrorKind::LockNotAcquired`](fanout_region::ErrorKind::LockNotAcquired). Locks
//! expire after the configured key timeout, measured on the instance's
//! [`tick::Clock`], so an abandoned lock is reclaimed by the next caller.

pub mod builder;
mod instance;
mod region;

#[doc(inline)]
pub use builder::InMemoryInstanceBuilder;
#[doc(inline)]
pub use instance::InMemoryInstance;
#[doc(inline)]
pub use region::InMemoryRegion;
