// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use fanout_region::{Error, LockOptions};

const DEFAULT_PREFIX: &str = "fanout:";

/// Settings for a [`RedisRegion`](crate::RedisRegion).
///
/// # Examples
///
/// ```
/// use fanout_redis::RedisRegionOptions;
/// use std::time::Duration;
///
/// let options = RedisRegionOptions::default()
///     .prefix("app:")
///     .expiration(Duration::from_secs(600));
///
/// assert_eq!(options.get_prefix(), "app:");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct RedisRegionOptions {
    prefix: String,
    #[cfg_attr(feature = "serde", serde(with = "serde_expiration"))]
    expiration: Option<Duration>,
    lock: LockOptions,
}

impl Default for RedisRegionOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            expiration: None,
            lock: LockOptions::default(),
        }
    }
}

impl RedisRegionOptions {
    /// Sets the prefix prepended to every key of the region.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets how long stored values live. Values never expire by default.
    #[must_use]
    pub fn expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Sets the lock options.
    #[must_use]
    pub fn lock(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    /// Returns the key prefix.
    #[must_use]
    pub fn get_prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the value expiration, if any.
    #[must_use]
    pub fn get_expiration(&self) -> Option<Duration> {
        self.expiration
    }

    /// Returns the lock options.
    #[must_use]
    pub fn get_lock(&self) -> &LockOptions {
        &self.lock
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.expiration.is_some_and(|e| e.as_millis() == 0) {
            return Err(Error::configuration("expiration must be at least one millisecond"));
        }
        if self.lock.get_key_timeout().as_millis() == 0 {
            return Err(Error::configuration("lock key timeout must be at least one millisecond"));
        }
        self.lock.validate()
    }
}

#[cfg(feature = "serde")]
mod serde_expiration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Expiration(#[serde(with = "fanout_region::serde_duration")] Duration);

    pub(super) fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(Expiration).serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<Expiration>::deserialize(deserializer)?.map(|e| e.0))
    }
}
