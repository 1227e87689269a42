// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Region strategy abstractions for building replicated cache backends.
//!
//! This crate defines the [`RegionStrategy`] trait that every cache backend connection
//! must satisfy, along with [`LockToken`] for per-backend lock ownership, [`LockOptions`]
//! for lock tuning, and the [`Error`] type shared by all strategies.
//!
//! # Overview
//!
//! A region strategy is one backend connection scoped to one named cache region.
//! Implement [`RegionStrategy`] for your backend, then hand a set of strategies to
//! `fanout` to replicate writes and locks across all of them.
//!
//! # Implementing a Region Strategy
//!
//! ```
//! use fanout_region::{Error, LockToken, RegionStrategy};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//!
//! struct SimpleRegion {
//!     name: String,
//!     data: RwLock<HashMap<String, i32>>,
//!     locks: RwLock<HashMap<String, LockToken>>,
//! }
//!
//! impl RegionStrategy<String, i32> for SimpleRegion {
//!     fn region_name(&self) -> &str {
//!         &self.name
//!     }
//!
//!     fn validate(&self) -> Result<(), Error> {
//!         Ok(())
//!     }
//!
//!     async fn get(&self, key: &String) -> Result<Option<i32>, Error> {
//!         Ok(self.data.read().unwrap().get(key).copied())
//!     }
//!
//!     async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i32>>, Error> {
//!         let data = self.data.read().unwrap();
//!         Ok(keys.iter().map(|key| data.get(key).copied()).collect())
//!     }
//!
//!     async fn put(&self, key: &String, value: &i32) -> Result<(), Error> {
//!         self.data.write().unwrap().insert(key.clone(), *value);
//!         Ok(())
//!     }
//!
//!     async fn put_many(&self, keys: &[String], values: &[i32]) -> Result<(), Error> {
//!         let mut data = self.data.write().unwrap();
//!         for (key, value) in keys.iter().zip(values) {
//!             data.insert(key.clone(), *value);
//!         }
//!         Ok(())
//!     }
//!
//!     async fn remove(&self, key: &String) -> Result<bool, Error> {
//!         Ok(self.data.write().unwrap().remove(key).is_some())
//!     }
//!
//!     async fn clear(&self) -> Result<(), Error> {
//!         self.data.write().unwrap().clear();
//!         Ok(())
//!     }
//!
//!     async fn lock(&self, key: &String) -> Result<LockToken, Error> {
//!         let token = LockToken::generate();
//!         self.locks.write().unwrap().insert(key.clone(), token.clone());
//!         Ok(token)
//!     }
//!
//!     async fn lock_many(&self, keys: &[String]) -> Result<LockToken, Error> {
//!         let token = LockToken::generate();
//!         let mut locks = self.locks.write().unwrap();
//!         for key in keys {
//!             locks.insert(key.clone(), token.clone());
//!         }
//!         Ok(token)
//!     }
//!
//!     async fn unlock(&self, key: &String, token: &LockToken) -> Result<bool, Error> {
//!         let mut locks = self.locks.write().unwrap();
//!         if locks.get(key) == Some(token) {
//!             locks.remove(key);
//!             return Ok(true);
//!         }
//!         Ok(false)
//!     }
//!
//!     async fn unlock_many(&self, keys: &[String], token: &LockToken) -> Result<usize, Error> {
//!         let mut released = 0;
//!         for key in keys {
//!             if self.unlock(key, token).await? {
//!                 released += 1;
//!             }
//!         }
//!         Ok(released)
//!     }
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! Enable the `dynamic-strategy` feature for [`DynamicStrategy`], which wraps any
//! `RegionStrategy` in a type-erased container. This lets a single replicated cache
//! span heterogeneous backends (for example one in-memory and two Redis instances).

pub mod error;
mod options;
#[cfg(feature = "serde")]
pub mod serde_duration;
pub(crate) mod strategy;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
mod token;

#[cfg(any(test, feature = "dynamic-strategy"))]
mod dynamic;

#[cfg(any(test, feature = "dynamic-strategy"))]
#[doc(inline)]
pub use dynamic::{DynamicStrategy, DynamicStrategyExt};
#[doc(inline)]
pub use error::{BoxError, Error, ErrorKind, Result};
#[doc(inline)]
pub use options::LockOptions;
#[doc(inline)]
pub use strategy::{RegionSetup, RegionStrategy};
#[doc(inline)]
pub use token::LockToken;
