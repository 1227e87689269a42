// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// Proof of ownership for a lock held on one backend.
///
/// A strategy returns a token from `lock`/`lock_many` and expects the same token
/// back in `unlock`/`unlock_many`. Only the holder of the token can release the lock.
///
/// # Examples
///
/// ```
/// use fanout_region::LockToken;
///
/// let token = LockToken::new("owner-1");
/// assert_eq!(token.as_str(), "owner-1");
///
/// let generated = LockToken::generate();
/// assert_ne!(generated, LockToken::generate());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct LockToken(String);

impl LockToken {
    /// Creates a token from an existing value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Creates a fresh, globally unique token.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token and returns its value.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for LockToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for LockToken {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
