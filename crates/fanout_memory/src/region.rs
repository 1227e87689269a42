// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory region strategy using moka.

use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

use fanout_region::{Error, LockOptions, LockToken, RegionStrategy};
use moka::future::Cache;
use parking_lot::Mutex;
use tick::Clock;

use crate::builder::RegionSettings;

struct HeldLock {
    token: LockToken,
    expires_at: Instant,
}

struct RegionInner<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: String,
    clock: Clock,
    data: Cache<K, V>,
    locks: Mutex<HashMap<K, HeldLock>>,
    lock_options: LockOptions,
}

/// A region strategy over one region of an [`InMemoryInstance`](crate::InMemoryInstance).
///
/// Clones share the same region.
///
/// # Examples
///
/// ```
/// use fanout_memory::InMemoryRegion;
/// use fanout_region::RegionStrategy;
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let region = InMemoryRegion::<String, i32>::new(Clock::new_frozen(), "users");
///
/// let token = region.lock(&"key".to_string()).await.unwrap();
/// assert!(region.lock(&"key".to_string()).await.is_err());
/// assert!(region.unlock(&"key".to_string(), &token).await.unwrap());
/// # });
/// ```
pub struct InMemoryRegion<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<RegionInner<K, V>>,
}

impl<K, V> Clone for InMemoryRegion<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for InMemoryRegion<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRegion")
            .field("name", &self.inner.name)
            .field("lock_options", &self.inner.lock_options)
            .finish_non_exhaustive()
    }
}

impl<K, V> InMemoryRegion<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a standalone region with default settings.
    #[must_use]
    pub fn new(clock: Clock, name: &str) -> Self {
        Self::from_settings(name, &RegionSettings::new(clock))
    }

    pub(crate) fn from_settings(name: &str, settings: &RegionSettings) -> Self {
        let mut moka_builder = Cache::builder().name(name);

        if let Some(capacity) = settings.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(ttl) = settings.time_to_live {
            moka_builder = moka_builder.time_to_live(ttl);
        }

        if let Some(tti) = settings.time_to_idle {
            moka_builder = moka_builder.time_to_idle(tti);
        }

        Self {
            inner: Arc::new(RegionInner {
                name: name.to_owned(),
                clock: settings.clock.clone(),
                data: moka_builder.build(),
                locks: Mutex::new(HashMap::new()),
                lock_options: settings.lock.clone(),
            }),
        }
    }

    /// Returns the number of stored entries after applying pending evictions.
    pub async fn entry_count(&self) -> u64 {
        self.inner.data.run_pending_tasks().await;
        self.inner.data.entry_count()
    }

    /// Returns `true` if the key is held by an unexpired lock.
    #[must_use]
    pub fn is_locked(&self, key: &K) -> bool {
        let now = self.inner.clock.instant();
        self.inner
            .locks
            .lock()
            .get(key)
            .is_some_and(|held| held.expires_at > now)
    }

    fn key_timeout(&self) -> Duration {
        self.inner.lock_options.get_key_timeout()
    }
}

impl<K, V> InMemoryRegion<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Grants one token over every key, or nothing if any key is held.
    ///
    /// Expired entries are swept first, so abandoned locks do not accumulate.
    fn acquire(&self, keys: &[K]) -> Result<LockToken, Error> {
        let now = self.inner.clock.instant();
        let mut locks = self.inner.locks.lock();
        locks.retain(|_, held| held.expires_at > now);

        if keys.iter().any(|key| locks.contains_key(key)) {
            return Err(Error::lock_not_acquired(format!(
                "key already locked in region {}",
                self.inner.name
            )));
        }

        let token = LockToken::generate();
        let expires_at = now + self.key_timeout();
        for key in keys {
            locks.insert(
                key.clone(),
                HeldLock {
                    token: token.clone(),
                    expires_at,
                },
            );
        }
        Ok(token)
    }

    /// Releases a key if the token still owns it. Expired entries are reclaimed.
    fn release(locks: &mut HashMap<K, HeldLock>, key: &K, token: &LockToken, now: Instant) -> bool {
        let Some(held) = locks.get(key) else {
            return false;
        };

        if held.expires_at <= now {
            locks.remove(key);
            return false;
        }

        if held.token == *token {
            locks.remove(key);
            return true;
        }

        false
    }
}

impl<K, V> RegionStrategy<K, V> for InMemoryRegion<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn region_name(&self) -> &str {
        &self.inner.name
    }

    fn validate(&self) -> Result<(), Error> {
        if self.inner.name.is_empty() {
            return Err(Error::configuration("region name must not be empty"));
        }
        self.inner.lock_options.validate()
    }

    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        Ok(self.inner.data.get(key).await)
    }

    async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<V>>, Error> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.inner.data.get(key).await);
        }
        Ok(values)
    }

    async fn put(&self, key: &K, value: &V) -> Result<(), Error> {
        self.inner.data.insert(key.clone(), value.clone()).await;
        Ok(())
    }

    async fn put_many(&self, keys: &[K], values: &[V]) -> Result<(), Error> {
        if keys.len() != values.len() {
            return Err(Error::invalid_argument(format!(
                "{} keys but {} values",
                keys.len(),
                values.len()
            )));
        }
        for (key, value) in keys.iter().zip(values) {
            self.inner.data.insert(key.clone(), value.clone()).await;
        }
        Ok(())
    }

    async fn remove(&self, key: &K) -> Result<bool, Error> {
        Ok(self.inner.data.remove(key).await.is_some())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.inner.data.invalidate_all();
        Ok(())
    }

    async fn lock(&self, key: &K) -> Result<LockToken, Error> {
        self.acquire(std::slice::from_ref(key))
    }

    async fn lock_many(&self, keys: &[K]) -> Result<LockToken, Error> {
        self.acquire(keys)
    }

    async fn unlock(&self, key: &K, token: &LockToken) -> Result<bool, Error> {
        let now = self.inner.clock.instant();
        let released = Self::release(&mut self.inner.locks.lock(), key, token, now);
        if !released {
            tracing::debug!(region = %self.inner.name, "unlock with a token that no longer owns the key");
        }
        Ok(released)
    }

    async fn unlock_many(&self, keys: &[K], token: &LockToken) -> Result<usize, Error> {
        let now = self.inner.clock.instant();
        let mut locks = self.inner.locks.lock();
        Ok(keys
            .iter()
            .filter(|key| Self::release(&mut locks, key, token, now))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use tick::ClockControl;

    use super::*;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    fn short_lived(control: &ClockControl, name: &str, key_timeout: Duration) -> InMemoryRegion<String, i32> {
        let settings = RegionSettings {
            lock: LockOptions::default().key_timeout(key_timeout),
            ..RegionSettings::new(control.to_clock())
        };
        InMemoryRegion::from_settings(name, &settings)
    }

    #[test]
    fn expired_lock_is_reclaimed_by_next_caller() {
        block_on(async {
            let control = ClockControl::new();
            let region = short_lived(&control, "r", Duration::from_secs(1));
            let stale = region.lock(&key("k")).await.expect("lock failed");

            control.advance(Duration::from_millis(999));
            assert!(region.is_locked(&key("k")));

            control.advance(Duration::from_millis(1));
            assert!(!region.is_locked(&key("k")));

            let fresh = region.lock(&key("k")).await.expect("expired lock should be reclaimed");
            assert_ne!(stale, fresh);
            assert!(!region.unlock(&key("k"), &stale).await.expect("unlock failed"));
            assert!(region.unlock(&key("k"), &fresh).await.expect("unlock failed"));
        });
    }

    #[test]
    fn unlock_of_expired_lock_reports_not_released() {
        block_on(async {
            let control = ClockControl::new();
            let region = short_lived(&control, "r", Duration::from_secs(1));
            let token = region.lock(&key("k")).await.expect("lock failed");

            control.advance(Duration::from_secs(2));
            assert!(!region.unlock(&key("k"), &token).await.expect("unlock failed"));
            assert!(region.inner.locks.lock().is_empty());
        });
    }

    #[test]
    fn acquire_sweeps_abandoned_locks() {
        block_on(async {
            let control = ClockControl::new();
            let region = short_lived(&control, "r", Duration::from_secs(1));
            region.lock_many(&[key("a"), key("b"), key("c")]).await.expect("lock failed");
            assert_eq!(region.inner.locks.lock().len(), 3);

            control.advance(Duration::from_secs(5));
            region.lock(&key("d")).await.expect("lock failed");

            let locks = region.inner.locks.lock();
            assert_eq!(locks.len(), 1);
            assert!(locks.contains_key(&key("d")));
        });
    }

    #[test]
    fn validate_rejects_empty_name() {
        let region = InMemoryRegion::<String, i32>::new(Clock::new_frozen(), "");
        let error = region.validate().expect_err("empty name should be rejected");
        assert_eq!(error.kind(), fanout_region::ErrorKind::Configuration);
    }

    #[test]
    fn validate_rejects_zero_key_timeout() {
        let region = short_lived(&ClockControl::new(), "r", Duration::ZERO);
        assert!(region.validate().is_err());
    }

    #[test]
    fn debug_contains_name() {
        let region = InMemoryRegion::<String, i32>::new(Clock::new_frozen(), "users");
        assert!(format!("{region:?}").contains("users"));
    }
}
