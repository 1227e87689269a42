// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock region strategy for testing.
//!
//! This module provides `MockStrategy`, a configurable in-memory strategy that
//! records all operations and supports failure injection for testing error paths.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{Error, LockToken, RegionStrategy};

/// Recorded strategy operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOp<K, V> {
    /// `validate` was called.
    Validate,
    /// A get operation was performed with the given key.
    Get(K),
    /// A batched get operation was performed with the given keys.
    GetMany(Vec<K>),
    /// A put operation was performed.
    Put {
        /// The key that was written.
        key: K,
        /// The value that was written.
        value: V,
    },
    /// A batched put operation was performed.
    PutMany {
        /// The keys that were written.
        keys: Vec<K>,
        /// The values that were written.
        values: Vec<V>,
    },
    /// A remove operation was performed with the given key.
    Remove(K),
    /// A clear operation was performed.
    Clear,
    /// A lock operation was performed with the given key.
    Lock(K),
    /// A batched lock operation was performed with the given keys.
    LockMany(Vec<K>),
    /// An unlock operation was performed.
    Unlock {
        /// The key that was unlocked.
        key: K,
        /// The token presented.
        token: LockToken,
    },
    /// A batched unlock operation was performed.
    UnlockMany {
        /// The keys that were unlocked.
        keys: Vec<K>,
        /// The token presented.
        token: LockToken,
    },
}

impl<K, V> StrategyOp<K, V> {
    /// Returns `true` for lock and batched lock operations.
    #[must_use]
    pub fn is_lock(&self) -> bool {
        matches!(self, Self::Lock(_) | Self::LockMany(_))
    }

    /// Returns `true` for unlock and batched unlock operations.
    #[must_use]
    pub fn is_unlock(&self) -> bool {
        matches!(self, Self::Unlock { .. } | Self::UnlockMany { .. })
    }
}

type FailPredicate<K, V> = Box<dyn Fn(&StrategyOp<K, V>) -> bool + Send + Sync>;

struct State<K, V> {
    data: HashMap<K, V>,
    locks: HashMap<K, LockToken>,
    operations: Vec<StrategyOp<K, V>>,
}

/// A configurable mock strategy for testing.
///
/// The strategy stores values and locks in memory and can be configured to fail
/// operations on demand. All operations are recorded for later verification, including
/// the ones that were made to fail. Locks are exclusive: locking a key that is already
/// held fails with a lock-not-acquired error. Tokens are deterministic
/// (`"{region}-lock-{n}"`).
///
/// Clones share state, so keep a clone to inspect a strategy after handing it to a cache.
///
/// # Examples
///
/// ```
/// use fanout_region::{RegionStrategy, testing::{MockStrategy, StrategyOp}};
///
/// # futures::executor::block_on(async {
/// let strategy = MockStrategy::<String, i32>::new("users");
///
/// strategy.put(&"key".to_string(), &42).await.unwrap();
/// assert_eq!(strategy.get(&"key".to_string()).await.unwrap(), Some(42));
///
/// assert_eq!(strategy.operations(), vec![
///     StrategyOp::Put { key: "key".to_string(), value: 42 },
///     StrategyOp::Get("key".to_string()),
/// ]);
/// # });
/// ```
///
/// # Failure Injection
///
/// ```
/// use fanout_region::{RegionStrategy, testing::{MockStrategy, StrategyOp}};
///
/// # futures::executor::block_on(async {
/// let strategy = MockStrategy::<String, i32>::new("users");
///
/// strategy.fail_when(|op| matches!(op, StrategyOp::Lock(k) if k == "hot"));
/// assert!(strategy.lock(&"hot".to_string()).await.is_err());
/// assert!(strategy.lock(&"cold".to_string()).await.is_ok());
/// # });
/// ```
pub struct MockStrategy<K, V> {
    region: Arc<str>,
    state: Arc<Mutex<State<K, V>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<K, V>>>>,
    next_token: Arc<AtomicU64>,
}

impl<K, V> std::fmt::Debug for MockStrategy<K, V>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockStrategy")
            .field("region", &self.region)
            .field("data", &state.data)
            .field("locks", &state.locks)
            .field("operations", &state.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<K, V> Clone for MockStrategy<K, V> {
    fn clone(&self) -> Self {
        Self {
            region: Arc::clone(&self.region),
            state: Arc::clone(&self.state),
            fail_when: Arc::clone(&self.fail_when),
            next_token: Arc::clone(&self.next_token),
        }
    }
}

impl<K, V> MockStrategy<K, V> {
    /// Creates a new empty mock strategy for the given region.
    #[must_use]
    pub fn new(region: &str) -> Self {
        Self {
            region: Arc::from(region),
            state: Arc::new(Mutex::new(State {
                data: HashMap::new(),
                locks: HashMap::new(),
                operations: Vec::new(),
            })),
            fail_when: Arc::new(Mutex::new(None)),
            next_token: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should fail with a
    /// backend error. Failed operations are still recorded but have no effect.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StrategyOp<K, V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.state.lock().data.len()
    }

    /// Returns the number of keys currently locked.
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.state.lock().locks.len()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.state.lock().operations.clear();
    }

    fn should_fail(&self, op: &StrategyOp<K, V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }

    fn mint_token(&self) -> LockToken {
        let n = self.next_token.fetch_add(1, Ordering::Relaxed);
        LockToken::new(format!("{}-lock-{n}", self.region))
    }
}

impl<K, V> MockStrategy<K, V>
where
    K: Eq + Hash,
{
    /// Returns true if the strategy holds a value for the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.lock().data.contains_key(key)
    }

    /// Returns true if the given key is currently locked.
    #[must_use]
    pub fn is_locked(&self, key: &K) -> bool {
        self.state.lock().locks.contains_key(key)
    }
}

impl<K, V> MockStrategy<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Returns the stored value for the given key without recording an operation.
    #[must_use]
    pub fn value(&self, key: &K) -> Option<V> {
        self.state.lock().data.get(key).cloned()
    }
}

impl<K, V> MockStrategy<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StrategyOp<K, V>> {
        self.state.lock().operations.clone()
    }

    /// Returns how many recorded operations match the predicate.
    #[must_use]
    pub fn count_operations(&self, predicate: impl Fn(&StrategyOp<K, V>) -> bool) -> usize {
        self.state.lock().operations.iter().filter(|op| predicate(op)).count()
    }

    /// Records the operation and returns an error if it was made to fail.
    fn begin(&self, op: StrategyOp<K, V>, name: &str) -> Result<(), Error> {
        let fail = self.should_fail(&op);
        self.state.lock().operations.push(op);
        if fail {
            return Err(Error::backend(format!("mock: {name} failed on region {}", self.region)));
        }
        Ok(())
    }
}

impl<K, V> RegionStrategy<K, V> for MockStrategy<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn region_name(&self) -> &str {
        &self.region
    }

    fn validate(&self) -> Result<(), Error> {
        if self.should_fail(&StrategyOp::Validate) {
            self.state.lock().operations.push(StrategyOp::Validate);
            return Err(Error::configuration(format!("mock: validate failed on region {}", self.region)));
        }
        self.state.lock().operations.push(StrategyOp::Validate);
        Ok(())
    }

    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        self.begin(StrategyOp::Get(key.clone()), "get")?;
        Ok(self.state.lock().data.get(key).cloned())
    }

    async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<V>>, Error> {
        self.begin(StrategyOp::GetMany(keys.to_vec()), "get_many")?;
        let state = self.state.lock();
        Ok(keys.iter().map(|key| state.data.get(key).cloned()).collect())
    }

    async fn put(&self, key: &K, value: &V) -> Result<(), Error> {
        self.begin(
            StrategyOp::Put {
                key: key.clone(),
                value: value.clone(),
            },
            "put",
        )?;
        self.state.lock().data.insert(key.clone(), value.clone());
        Ok(())
    }

    async fn put_many(&self, keys: &[K], values: &[V]) -> Result<(), Error> {
        self.begin(
            StrategyOp::PutMany {
                keys: keys.to_vec(),
                values: values.to_vec(),
            },
            "put_many",
        )?;
        let mut state = self.state.lock();
        for (key, value) in keys.iter().zip(values) {
            state.data.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn remove(&self, key: &K) -> Result<bool, Error> {
        self.begin(StrategyOp::Remove(key.clone()), "remove")?;
        Ok(self.state.lock().data.remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.begin(StrategyOp::Clear, "clear")?;
        self.state.lock().data.clear();
        Ok(())
    }

    async fn lock(&self, key: &K) -> Result<LockToken, Error> {
        self.begin(StrategyOp::Lock(key.clone()), "lock")?;
        let mut state = self.state.lock();
        if state.locks.contains_key(key) {
            return Err(Error::lock_not_acquired(format!("mock: key already locked on region {}", self.region)));
        }
        let token = self.mint_token();
        state.locks.insert(key.clone(), token.clone());
        Ok(token)
    }

    async fn lock_many(&self, keys: &[K]) -> Result<LockToken, Error> {
        self.begin(StrategyOp::LockMany(keys.to_vec()), "lock_many")?;
        let mut state = self.state.lock();
        if keys.iter().any(|key| state.locks.contains_key(key)) {
            return Err(Error::lock_not_acquired(format!("mock: keys already locked on region {}", self.region)));
        }
        let token = self.mint_token();
        for key in keys {
            state.locks.insert(key.clone(), token.clone());
        }
        Ok(token)
    }

    async fn unlock(&self, key: &K, token: &LockToken) -> Result<bool, Error> {
        self.begin(
            StrategyOp::Unlock {
                key: key.clone(),
                token: token.clone(),
            },
            "unlock",
        )?;
        let mut state = self.state.lock();
        if state.locks.get(key) == Some(token) {
            state.locks.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn unlock_many(&self, keys: &[K], token: &LockToken) -> Result<usize, Error> {
        self.begin(
            StrategyOp::UnlockMany {
                keys: keys.to_vec(),
                token: token.clone(),
            },
            "unlock_many",
        )?;
        let mut state = self.state.lock();
        let mut released = 0;
        for key in keys {
            if state.locks.get(key) == Some(token) {
                state.locks.remove(key);
                released += 1;
            }
        }
        Ok(released)
    }
}
