// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::Error;

const DEFAULT_KEY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_TIMES: u32 = 3;
const DEFAULT_MIN_RETRY_DELAY: Duration = Duration::from_millis(10);
const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_millis(400);
const DEFAULT_KEY_SUFFIX: &str = "-lock";

/// Lock tuning shared by region strategies.
///
/// The key timeout bounds how long a granted lock survives if its holder never
/// releases it. Strategies that can wait for a contended lock use the acquire
/// timeout and retry settings; strategies that cannot simply fail fast.
///
/// # Examples
///
/// ```
/// use fanout_region::LockOptions;
/// use std::time::Duration;
///
/// let options = LockOptions::default()
///     .key_timeout(Duration::from_secs(10))
///     .retry_times(5);
///
/// assert_eq!(options.get_key_timeout(), Duration::from_secs(10));
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct LockOptions {
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_duration"))]
    key_timeout: Duration,
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_duration"))]
    acquire_timeout: Duration,
    retry_times: u32,
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_duration"))]
    min_retry_delay: Duration,
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_duration"))]
    max_retry_delay: Duration,
    key_suffix: String,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            key_timeout: DEFAULT_KEY_TIMEOUT,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            retry_times: DEFAULT_RETRY_TIMES,
            min_retry_delay: DEFAULT_MIN_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            key_suffix: DEFAULT_KEY_SUFFIX.to_owned(),
        }
    }
}

impl LockOptions {
    /// Sets how long a granted lock lives before the backend reclaims it.
    #[must_use]
    pub fn key_timeout(mut self, timeout: Duration) -> Self {
        self.key_timeout = timeout;
        self
    }

    /// Sets how long a strategy keeps retrying a contended lock.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets how many times a contended lock is retried after the first attempt.
    #[must_use]
    pub fn retry_times(mut self, times: u32) -> Self {
        self.retry_times = times;
        self
    }

    /// Sets the bounds of the random delay between lock retries.
    #[must_use]
    pub fn retry_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_retry_delay = min;
        self.max_retry_delay = max;
        self
    }

    /// Sets the suffix appended to a key to form its lock key.
    #[must_use]
    pub fn key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.key_suffix = suffix.into();
        self
    }

    /// Returns the lock key timeout.
    #[must_use]
    pub fn get_key_timeout(&self) -> Duration {
        self.key_timeout
    }

    /// Returns the lock acquire timeout.
    #[must_use]
    pub fn get_acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Returns the number of retries after the first lock attempt.
    #[must_use]
    pub fn get_retry_times(&self) -> u32 {
        self.retry_times
    }

    /// Returns the lock key suffix.
    #[must_use]
    pub fn get_key_suffix(&self) -> &str {
        &self.key_suffix
    }

    /// Picks a random delay between the configured retry delay bounds.
    #[must_use]
    pub fn next_retry_delay(&self) -> Duration {
        let min = u64::try_from(self.min_retry_delay.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_retry_delay.as_millis()).unwrap_or(u64::MAX);
        if min >= max {
            return self.min_retry_delay;
        }
        Duration::from_millis(fastrand::u64(min..=max))
    }

    /// Checks that the options describe a usable lock policy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key timeout is zero, the key suffix is
    /// empty, or the minimum retry delay exceeds the maximum.
    pub fn validate(&self) -> Result<(), Error> {
        if self.key_timeout.is_zero() {
            return Err(Error::configuration("lock key timeout must be greater than zero"));
        }
        if self.key_suffix.is_empty() {
            return Err(Error::configuration("lock key suffix must not be empty"));
        }
        if self.min_retry_delay > self.max_retry_delay {
            return Err(Error::configuration(format!(
                "minimum lock retry delay {:?} exceeds maximum {:?}",
                self.min_retry_delay, self.max_retry_delay
            )));
        }
        Ok(())
    }
}
