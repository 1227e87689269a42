// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for region strategy operations.

use std::fmt;

/// A boxed, thread-safe error used as the cause of an [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The category of a failed region operation.
///
/// Strategies classify their failures so callers can tell a broken backend apart
/// from lock contention or a misconfigured region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The backend connection or operation failed.
    Backend,
    /// The backend refused to grant a lock within its acquire policy.
    LockNotAcquired,
    /// The strategy or cache is misconfigured.
    Configuration,
    /// The caller passed arguments that cannot be honored.
    InvalidArgument,
}

impl ErrorKind {
    /// Returns a stable string representation of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "cache operation failed",
            Self::LockNotAcquired => "cache lock not acquired",
            Self::Configuration => "cache misconfigured",
            Self::InvalidArgument => "invalid cache argument",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a region operation.
///
/// Every error carries an [`ErrorKind`] and the underlying cause. Use
/// [`std::error::Error::source()`] to access the cause.
///
/// # Example
///
/// ```
/// use fanout_region::{Error, ErrorKind};
///
/// let error = Error::backend("connection reset");
/// assert_eq!(error.kind(), ErrorKind::Backend);
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {cause}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    cause: BoxError,
}

impl Error {
    /// Creates a new error of the given kind.
    pub fn new(kind: ErrorKind, cause: impl Into<BoxError>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    /// Creates an error for a failed backend operation.
    pub fn backend(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Backend, cause)
    }

    /// Creates an error for a lock the backend refused to grant.
    pub fn lock_not_acquired(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::LockNotAcquired, cause)
    }

    /// Creates an error for a misconfigured strategy or cache.
    pub fn configuration(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Configuration, cause)
    }

    /// Creates an error for arguments that cannot be honored.
    pub fn invalid_argument(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::InvalidArgument, cause)
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if the backend operation itself failed.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        self.kind == ErrorKind::Backend
    }

    /// Returns `true` if a lock could not be acquired.
    #[must_use]
    pub fn is_lock_not_acquired(&self) -> bool {
        self.kind == ErrorKind::LockNotAcquired
    }
}

/// A specialized [`Result`] type for region operations.
pub type Result<T> = std::result::Result<T, Error>;
