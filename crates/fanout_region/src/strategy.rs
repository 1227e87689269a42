// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for region backends.
//!
//! [`RegionStrategy`] defines the operations a single backend connection offers for
//! one cache region. `fanout` replicates these operations across several strategies.

use crate::{Error, LockToken};

/// Outcome of an idempotent region setup call.
///
/// Backends that create regions on demand report whether the call created the
/// region or found it already in place, instead of signalling the second case
/// through an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionSetup {
    /// The region did not exist and was created.
    Created,
    /// The region already existed and was left untouched.
    AlreadyExists,
}

impl RegionSetup {
    /// Returns `true` if the call created the region.
    #[must_use]
    pub fn is_created(self) -> bool {
        matches!(self, Self::Created)
    }
}

/// One backend connection scoped to one cache region.
///
/// Every method is required. Failures must be reported as [`Error`] so that callers
/// can tell a failed operation apart from a successful-but-empty result: a miss is
/// `Ok(None)`, never an error.
///
/// Lock methods return a [`LockToken`] that must be passed back to the matching
/// unlock call. `lock_many` locks the whole key set together: either every key is
/// locked under the returned token or none is.
#[cfg_attr(
    any(test, feature = "dynamic-strategy"),
    dynosaur::dynosaur(pub(crate) DynRegionStrategy = dyn(box) RegionStrategy, bridge(none))
)]
pub trait RegionStrategy<K, V>: Send + Sync {
    /// Returns the name of the region this strategy serves.
    fn region_name(&self) -> &str;

    /// Checks the strategy configuration, failing fast on misconfiguration.
    ///
    /// Called once when a replicated cache is built.
    fn validate(&self) -> Result<(), Error>;

    /// Gets a value, returning `None` on a miss.
    fn get(&self, key: &K) -> impl Future<Output = Result<Option<V>, Error>> + Send;

    /// Gets several values at once, index-aligned with `keys`.
    fn get_many(&self, keys: &[K]) -> impl Future<Output = Result<Vec<Option<V>>, Error>> + Send;

    /// Stores a value.
    fn put(&self, key: &K, value: &V) -> impl Future<Output = Result<(), Error>> + Send;

    /// Stores several values at once; `values` is index-aligned with `keys`.
    fn put_many(&self, keys: &[K], values: &[V]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes a value, returning `true` if the key was present.
    fn remove(&self, key: &K) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Removes every value in the region.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Locks a key, returning the token that proves ownership.
    fn lock(&self, key: &K) -> impl Future<Output = Result<LockToken, Error>> + Send;

    /// Locks a set of keys together under one token.
    fn lock_many(&self, keys: &[K]) -> impl Future<Output = Result<LockToken, Error>> + Send;

    /// Releases a lock, returning `true` if the token owned it.
    fn unlock(&self, key: &K, token: &LockToken) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Releases the locks of a key set, returning how many were released.
    fn unlock_many(&self, keys: &[K], token: &LockToken) -> impl Future<Output = Result<usize, Error>> + Send;
}
