// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, marker::PhantomData};

use fanout_region::{Error, LockToken, RegionStrategy};
use redis::{Script, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};
use tick::Clock;

use crate::RedisRegionOptions;

const SCAN_BATCH: usize = 256;

const LOCK_MANY_SCRIPT: &str = r"
for i = 1, #KEYS do
    if redis.call('EXISTS', KEYS[i]) == 1 then
        return 0
    end
end
for i = 1, #KEYS do
    redis.call('SET', KEYS[i], ARGV[1], 'PX', ARGV[2])
end
return 1
";

const UNLOCK_SCRIPT: &str = r"
local released = 0
for i = 1, #KEYS do
    if redis.call('GET', KEYS[i]) == ARGV[1] then
        redis.call('DEL', KEYS[i])
        released = released + 1
    end
end
return released
";

/// Builds the Redis keys of one region.
///
/// Entries and locks live under sibling namespaces, `{prefix}{region}:data:` and
/// `{prefix}{region}:lock:`, so no user key maps onto a lock key.
#[derive(Debug, Clone)]
struct KeyLayout {
    data: String,
    lock: String,
    lock_suffix: String,
}

impl KeyLayout {
    fn new(prefix: &str, region: &str, lock_suffix: &str) -> Self {
        Self {
            data: format!("{prefix}{region}:data:"),
            lock: format!("{prefix}{region}:lock:"),
            lock_suffix: lock_suffix.to_owned(),
        }
    }

    fn data_key(&self, key: &impl fmt::Display) -> String {
        format!("{}{key}", self.data)
    }

    fn lock_key(&self, key: &impl fmt::Display) -> String {
        format!("{}{key}{}", self.lock, self.lock_suffix)
    }

    /// `SCAN` pattern matching the entries of the region and none of its locks.
    fn scan_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.data.len() + 1);
        for c in self.data.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }
}

/// A region strategy over one Redis server.
///
/// Entries are stored as `{prefix}{region}:data:{key}` with JSON values. Locks are
/// separate keys under `{prefix}{region}:lock:` holding the owner's token, set with
/// `NX` and a `PX` expiry so an abandoned lock frees itself after the key timeout.
///
/// Waits between lock attempts run on the region's clock. Clones share the
/// connection.
///
/// # Examples
///
/// ```no_run
/// use fanout_redis::{RedisRegion, RedisRegionOptions};
/// use fanout_region::RegionStrategy;
/// use tick::Clock;
///
/// # async fn example() -> Result<(), fanout_region::Error> {
/// let region = RedisRegion::<String, i32>::connect(
///     Clock::new_tokio(),
///     "redis://127.0.0.1/",
///     "users",
///     RedisRegionOptions::default(),
/// )
/// .await?;
///
/// region.put(&"key".to_string(), &42).await?;
/// assert_eq!(region.get(&"key".to_string()).await?, Some(42));
/// # Ok(())
/// # }
/// ```
pub struct RedisRegion<K, V> {
    connection: ConnectionManager,
    clock: Clock,
    region: String,
    layout: KeyLayout,
    options: RedisRegionOptions,
    lock_many_script: Script,
    unlock_script: Script,
    _phantom: PhantomData<fn(K, V)>,
}

impl<K, V> Clone for RedisRegion<K, V> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            clock: self.clock.clone(),
            region: self.region.clone(),
            layout: self.layout.clone(),
            options: self.options.clone(),
            lock_many_script: self.lock_many_script.clone(),
            unlock_script: self.unlock_script.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for RedisRegion<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisRegion")
            .field("region", &self.region)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<K, V> RedisRegion<K, V> {
    /// Opens a managed connection to `url` and serves `region` over it.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the URL is invalid or the server is unreachable.
    pub async fn connect(clock: Clock, url: &str, region: &str, options: RedisRegionOptions) -> Result<Self, Error> {
        let client = redis::Client::open(url).map_err(Error::backend)?;
        let connection = ConnectionManager::new(client).await.map_err(Error::backend)?;
        Ok(Self::new(clock, connection, region, options))
    }

    /// Serves `region` over an existing connection.
    #[must_use]
    pub fn new(clock: Clock, connection: ConnectionManager, region: &str, options: RedisRegionOptions) -> Self {
        Self {
            connection,
            clock,
            region: region.to_owned(),
            layout: KeyLayout::new(options.get_prefix(), region, options.get_lock().get_key_suffix()),
            options,
            lock_many_script: Script::new(LOCK_MANY_SCRIPT),
            unlock_script: Script::new(UNLOCK_SCRIPT),
            _phantom: PhantomData,
        }
    }

    /// Returns the region options.
    #[must_use]
    pub fn options(&self) -> &RedisRegionOptions {
        &self.options
    }

    fn key_timeout_ms(&self) -> u64 {
        u64::try_from(self.options.get_lock().get_key_timeout().as_millis()).unwrap_or(u64::MAX)
    }

    fn expiration_ms(&self) -> Option<u64> {
        self.options
            .get_expiration()
            .map(|e| u64::try_from(e.as_millis()).unwrap_or(u64::MAX))
    }

    async fn release(&self, lock_keys: Vec<String>, token: &LockToken) -> Result<usize, Error> {
        let mut connection = self.connection.clone();
        let mut invocation = self.unlock_script.prepare_invoke();
        for lock_key in lock_keys {
            invocation.key(lock_key);
        }
        invocation.arg(token.as_str());
        invocation.invoke_async(&mut connection).await.map_err(Error::backend)
    }
}

fn encode<V: Serialize>(value: &V) -> Result<String, Error> {
    serde_json::to_string(value).map_err(Error::backend)
}

fn decode<V: DeserializeOwned>(raw: Option<String>) -> Result<Option<V>, Error> {
    raw.map(|raw| serde_json::from_str(&raw).map_err(Error::backend)).transpose()
}

impl<K, V> RegionStrategy<K, V> for RedisRegion<K, V>
where
    K: fmt::Display + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn region_name(&self) -> &str {
        &self.region
    }

    fn validate(&self) -> Result<(), Error> {
        if self.region.is_empty() {
            return Err(Error::configuration("region name must not be empty"));
        }
        self.options.validate()
    }

    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.layout.data_key(key))
            .query_async(&mut connection)
            .await
            .map_err(Error::backend)?;
        decode(raw)
    }

    async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<V>>, Error> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let data_keys: Vec<String> = keys.iter().map(|key| self.layout.data_key(key)).collect();
        let mut connection = self.connection.clone();
        let raw: Vec<Option<String>> = redis::cmd("MGET")
            .arg(data_keys)
            .query_async(&mut connection)
            .await
            .map_err(Error::backend)?;
        raw.into_iter().map(decode).collect()
    }

    async fn put(&self, key: &K, value: &V) -> Result<(), Error> {
        let mut command = redis::cmd("SET");
        command.arg(self.layout.data_key(key)).arg(encode(value)?);
        if let Some(ms) = self.expiration_ms() {
            command.arg("PX").arg(ms);
        }

        let mut connection = self.connection.clone();
        command.query_async::<()>(&mut connection).await.map_err(Error::backend)
    }

    async fn put_many(&self, keys: &[K], values: &[V]) -> Result<(), Error> {
        if keys.len() != values.len() {
            return Err(Error::invalid_argument(format!(
                "{} keys but {} values",
                keys.len(),
                values.len()
            )));
        }
        if keys.is_empty() {
            return Ok(());
        }

        let expiration = self.expiration_ms();
        let mut pipeline = redis::pipe();
        pipeline.atomic();
        for (key, value) in keys.iter().zip(values) {
            let command = pipeline.cmd("SET").arg(self.layout.data_key(key)).arg(encode(value)?);
            if let Some(ms) = expiration {
                command.arg("PX").arg(ms);
            }
            command.ignore();
        }

        let mut connection = self.connection.clone();
        pipeline.query_async::<()>(&mut connection).await.map_err(Error::backend)
    }

    async fn remove(&self, key: &K) -> Result<bool, Error> {
        let mut connection = self.connection.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(self.layout.data_key(key))
            .query_async(&mut connection)
            .await
            .map_err(Error::backend)?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> Result<(), Error> {
        let pattern = self.layout.scan_pattern();
        let mut connection = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut connection)
                .await
                .map_err(Error::backend)?;

            if !keys.is_empty() {
                let count: u64 = redis::cmd("DEL")
                    .arg(keys)
                    .query_async(&mut connection)
                    .await
                    .map_err(Error::backend)?;
                removed += count;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!(region = %self.region, removed, "redis region cleared");
        Ok(())
    }

    async fn lock(&self, key: &K) -> Result<LockToken, Error> {
        let lock = self.options.get_lock();
        let lock_key = self.layout.lock_key(key);
        let token = LockToken::generate();
        let deadline = self.clock.instant() + lock.get_acquire_timeout();
        let mut connection = self.connection.clone();
        let mut attempt: u32 = 0;

        loop {
            let granted: Option<String> = redis::cmd("SET")
                .arg(&lock_key)
                .arg(token.as_str())
                .arg("NX")
                .arg("PX")
                .arg(self.key_timeout_ms())
                .query_async(&mut connection)
                .await
                .map_err(Error::backend)?;

            if granted.is_some() {
                return Ok(token);
            }

            if attempt >= lock.get_retry_times() || self.clock.instant() >= deadline {
                break;
            }
            attempt += 1;
            self.clock.delay(lock.next_retry_delay()).await;
        }

        tracing::debug!(region = %self.region, attempts = attempt + 1, "redis lock not acquired");
        Err(Error::lock_not_acquired(format!(
            "lock {lock_key} is held by another owner"
        )))
    }

    async fn lock_many(&self, keys: &[K]) -> Result<LockToken, Error> {
        let lock = self.options.get_lock();
        let token = LockToken::generate();
        let deadline = self.clock.instant() + lock.get_acquire_timeout();
        let mut connection = self.connection.clone();
        let mut attempt: u32 = 0;

        let mut invocation = self.lock_many_script.prepare_invoke();
        for key in keys {
            invocation.key(self.layout.lock_key(key));
        }
        invocation.arg(token.as_str()).arg(self.key_timeout_ms());

        loop {
            let granted: i64 = invocation.invoke_async(&mut connection).await.map_err(Error::backend)?;
            if granted == 1 {
                return Ok(token);
            }

            if attempt >= lock.get_retry_times() || self.clock.instant() >= deadline {
                break;
            }
            attempt += 1;
            self.clock.delay(lock.next_retry_delay()).await;
        }

        Err(Error::lock_not_acquired(format!(
            "{} keys in region {} could not all be locked",
            keys.len(),
            self.region
        )))
    }

    async fn unlock(&self, key: &K, token: &LockToken) -> Result<bool, Error> {
        let released = self.release(vec![self.layout.lock_key(key)], token).await?;
        Ok(released > 0)
    }

    async fn unlock_many(&self, keys: &[K], token: &LockToken) -> Result<usize, Error> {
        if keys.is_empty() {
            return Ok(0);
        }
        let lock_keys = keys.iter().map(|key| self.layout.lock_key(key)).collect();
        self.release(lock_keys, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_and_lock_keys() {
        let layout = KeyLayout::new("app:", "users", "");
        assert_eq!(layout.data_key(&42), "app:users:data:42");
        assert_eq!(layout.lock_key(&"alice"), "app:users:lock:alice");

        let suffixed = KeyLayout::new("app:", "users", "-lock");
        assert_eq!(suffixed.lock_key(&"alice"), "app:users:lock:alice-lock");
    }

    #[test]
    fn entry_keys_never_collide_with_lock_keys() {
        let layout = KeyLayout::new("fanout:", "users", "-lock");
        assert_ne!(layout.data_key(&"a-lock"), layout.lock_key(&"a"));

        for key in ["a", "a-lock", "lock:a", "data:a", ""] {
            assert!(!layout.lock_key(&key).starts_with(&layout.data));
            assert!(!layout.data_key(&key).starts_with(&layout.lock));
        }
    }

    #[test]
    fn scan_pattern_covers_entries_only() {
        let layout = KeyLayout::new("fanout:", "users", "-lock");
        assert_eq!(layout.scan_pattern(), "fanout:users:data:*");

        let prefix = layout.scan_pattern().trim_end_matches('*').to_owned();
        assert!(layout.data_key(&"a").starts_with(&prefix));
        assert!(!layout.lock_key(&"a").starts_with(&prefix));
    }

    #[test]
    fn scan_pattern_escapes_glob_characters() {
        let layout = KeyLayout::new("a*", "r[1]?", "-lock");
        assert_eq!(layout.scan_pattern(), r"a\*r\[1\]\?:data:*");
    }

    #[test]
    fn encode_decode_json() {
        let encoded = encode(&vec![1, 2, 3]).expect("encode failed");
        assert_eq!(encoded, "[1,2,3]");

        let decoded: Option<Vec<i32>> = decode(Some(encoded)).expect("decode failed");
        assert_eq!(decoded, Some(vec![1, 2, 3]));

        let missing: Option<i32> = decode(None).expect("decode failed");
        assert_eq!(missing, None);
    }

    #[test]
    fn decode_garbage_is_backend_error() {
        let error = decode::<i32>(Some("not json".to_owned())).expect_err("garbage should fail");
        assert!(error.is_backend());
    }
}
