// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Synchronous access to a replicated cache.

use fanout_region::{Error, RegionStrategy};
use futures::executor::block_on;

use crate::{LockTokens, ReplicatedCache};

/// A synchronous view of a [`ReplicatedCache`].
///
/// Every method drives the matching async operation to completion on the calling
/// thread and has the same semantics. Backends that need a specific runtime (for
/// example Tokio timers) must not be used through this view.
///
/// # Examples
///
/// ```
/// use fanout::ReplicatedCache;
/// use fanout_memory::InMemoryRegion;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let cache = ReplicatedCache::builder::<String, i32>(clock.clone(), "users")
///     .strategy(InMemoryRegion::<String, i32>::new(clock, "users"))
///     .build()
///     .expect("valid configuration");
///
/// let blocking = cache.blocking();
/// blocking.put(&"key".to_string(), &1).expect("put failed");
/// assert_eq!(blocking.get(&"key".to_string()).expect("get failed"), Some(1));
/// ```
#[derive(Debug)]
pub struct BlockingCache<'a, K, V, S> {
    cache: &'a ReplicatedCache<K, V, S>,
}

impl<'a, K, V, S> BlockingCache<'a, K, V, S> {
    pub(crate) fn new(cache: &'a ReplicatedCache<K, V, S>) -> Self {
        Self { cache }
    }

    /// Returns the underlying async cache.
    #[must_use]
    pub fn inner(&self) -> &'a ReplicatedCache<K, V, S> {
        self.cache
    }
}

impl<K, V, S> BlockingCache<'_, K, V, S>
where
    K: Sync,
    V: Send + Sync,
    S: RegionStrategy<K, V>,
{
    /// See [`ReplicatedCache::get`].
    ///
    /// # Errors
    ///
    /// Returns the chosen backend's error.
    pub fn get(&self, key: &K) -> Result<Option<V>, Error> {
        block_on(self.cache.get(key))
    }

    /// See [`ReplicatedCache::get_many`].
    ///
    /// # Errors
    ///
    /// Returns the chosen backend's error.
    pub fn get_many(&self, keys: &[K]) -> Result<Vec<Option<V>>, Error> {
        block_on(self.cache.get_many(keys))
    }

    /// See [`ReplicatedCache::put`].
    ///
    /// # Errors
    ///
    /// Returns the first backend error.
    pub fn put(&self, key: &K, value: &V) -> Result<(), Error> {
        block_on(self.cache.put(key, value))
    }

    /// See [`ReplicatedCache::put_many`].
    ///
    /// # Errors
    ///
    /// Returns an invalid argument error on mismatched lengths, otherwise the first
    /// backend error.
    pub fn put_many(&self, keys: &[K], values: &[V]) -> Result<(), Error> {
        block_on(self.cache.put_many(keys, values))
    }

    /// See [`ReplicatedCache::remove`].
    ///
    /// # Errors
    ///
    /// Returns the first backend error.
    pub fn remove(&self, key: &K) -> Result<bool, Error> {
        block_on(self.cache.remove(key))
    }

    /// See [`ReplicatedCache::clear`].
    ///
    /// # Errors
    ///
    /// Returns the first backend error.
    pub fn clear(&self) -> Result<(), Error> {
        block_on(self.cache.clear())
    }

    /// See [`ReplicatedCache::lock`].
    ///
    /// # Errors
    ///
    /// Returns the error of the backend that refused the lock, after rollback.
    pub fn lock(&self, key: &K) -> Result<LockTokens, Error> {
        block_on(self.cache.lock(key))
    }

    /// See [`ReplicatedCache::lock_many`].
    ///
    /// # Errors
    ///
    /// Returns the error of the backend that refused the lock, after rollback.
    pub fn lock_many(&self, keys: &[K]) -> Result<LockTokens, Error> {
        block_on(self.cache.lock_many(keys))
    }

    /// See [`ReplicatedCache::unlock`].
    ///
    /// # Errors
    ///
    /// Returns an invalid argument error on a token count mismatch, otherwise the
    /// first backend error.
    pub fn unlock(&self, key: &K, tokens: &LockTokens) -> Result<(), Error> {
        block_on(self.cache.unlock(key, tokens))
    }

    /// See [`ReplicatedCache::unlock_many`].
    ///
    /// # Errors
    ///
    /// Returns an invalid argument error on a token count mismatch, otherwise the
    /// first backend error.
    pub fn unlock_many(&self, keys: &[K], tokens: &LockTokens) -> Result<(), Error> {
        block_on(self.cache.unlock_many(keys, tokens))
    }
}
