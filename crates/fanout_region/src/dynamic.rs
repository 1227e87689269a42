// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dynamic region strategy wrapper for type erasure.

use std::{fmt::Debug, sync::Arc};

use crate::{Error, LockToken, RegionStrategy, strategy::DynRegionStrategy};

/// Extension trait for converting any `RegionStrategy` into a `DynamicStrategy`.
///
/// This trait is automatically implemented for all types that implement `RegionStrategy`.
///
/// # Examples
///
/// ```
/// use fanout_region::{DynamicStrategy, DynamicStrategyExt, RegionStrategy};
///
/// fn erase<S>(strategy: S) -> DynamicStrategy<String, i32>
/// where
///     S: RegionStrategy<String, i32> + 'static,
/// {
///     strategy.into_dynamic()
/// }
/// ```
pub trait DynamicStrategyExt<K, V>: Sized {
    /// Converts this strategy into a `DynamicStrategy`.
    fn into_dynamic(self) -> DynamicStrategy<K, V>;
}

impl<K, V, T> DynamicStrategyExt<K, V> for T
where
    T: RegionStrategy<K, V> + 'static,
{
    fn into_dynamic(self) -> DynamicStrategy<K, V> {
        DynamicStrategy::new(self)
    }
}

/// A clonable region strategy with type erasure.
///
/// `DynamicStrategy` wraps a trait object in an `Arc`, so a replicated cache can
/// mix backends of different concrete types behind one strategy type.
pub struct DynamicStrategy<K, V>(Arc<DynRegionStrategy<'static, K, V>>);

impl<K, V> DynamicStrategy<K, V> {
    pub(crate) fn new<T>(strategy: T) -> Self
    where
        T: RegionStrategy<K, V> + Send + Sync + 'static,
    {
        Self(DynRegionStrategy::new_arc(strategy))
    }
}

impl<K, V> Debug for DynamicStrategy<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicStrategy").finish_non_exhaustive()
    }
}

impl<K, V> Clone for DynamicStrategy<K, V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K, V> RegionStrategy<K, V> for DynamicStrategy<K, V>
where
    K: Sync,
    V: Send + Sync,
{
    fn region_name(&self) -> &str {
        self.0.region_name()
    }

    fn validate(&self) -> Result<(), Error> {
        self.0.validate()
    }

    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        self.0.get(key).await
    }

    async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<V>>, Error> {
        self.0.get_many(keys).await
    }

    async fn put(&self, key: &K, value: &V) -> Result<(), Error> {
        self.0.put(key, value).await
    }

    async fn put_many(&self, keys: &[K], values: &[V]) -> Result<(), Error> {
        self.0.put_many(keys, values).await
    }

    async fn remove(&self, key: &K) -> Result<bool, Error> {
        self.0.remove(key).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.0.clear().await
    }

    async fn lock(&self, key: &K) -> Result<LockToken, Error> {
        self.0.lock(key).await
    }

    async fn lock_many(&self, keys: &[K]) -> Result<LockToken, Error> {
        self.0.lock_many(keys).await
    }

    async fn unlock(&self, key: &K, token: &LockToken) -> Result<bool, Error> {
        self.0.unlock(key, token).await
    }

    async fn unlock_many(&self, keys: &[K], token: &LockToken) -> Result<usize, Error> {
        self.0.unlock_many(keys, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStrategy;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn dynamic_strategy_delegates_to_inner() {
        block_on(async {
            let mock = MockStrategy::<String, i32>::new("users");
            let dynamic = mock.clone().into_dynamic();

            dynamic.put(&"key".to_string(), &7).await.expect("put failed");
            assert_eq!(dynamic.get(&"key".to_string()).await.expect("get failed"), Some(7));
            assert_eq!(dynamic.region_name(), "users");
            assert!(mock.contains_key(&"key".to_string()));

            let token = dynamic.lock(&"key".to_string()).await.expect("lock failed");
            assert!(mock.is_locked(&"key".to_string()));
            assert!(dynamic.unlock(&"key".to_string(), &token).await.expect("unlock failed"));
        });
    }

    #[test]
    fn dynamic_strategy_clone_shares_inner() {
        block_on(async {
            let dynamic = MockStrategy::<String, i32>::new("users").into_dynamic();
            let clone = dynamic.clone();

            dynamic.put(&"key".to_string(), &1).await.expect("put failed");
            assert_eq!(clone.get(&"key".to_string()).await.expect("get failed"), Some(1));
        });
    }

    #[test]
    fn dynamic_strategy_debug() {
        let dynamic = MockStrategy::<String, i32>::new("orders").into_dynamic();
        assert!(format!("{dynamic:?}").contains("DynamicStrategy"));
    }
}
