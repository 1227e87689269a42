// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Serde helpers for [`Duration`] fields in option types.
//!
//! Durations are written in ISO 8601 notation (`"PT5S"`) through
//! [`jiff::SignedDuration`], which also accepts the friendly format on input.
//! Use with `#[serde(with = "fanout_region::serde_duration")]`.

use std::time::Duration;

use jiff::SignedDuration;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser};

/// Serializes a duration as an ISO 8601 duration string.
///
/// # Errors
///
/// Fails if the duration does not fit a signed duration.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    SignedDuration::try_from(*duration)
        .map_err(ser::Error::custom)?
        .serialize(serializer)
}

/// Deserializes a non-negative duration.
///
/// # Errors
///
/// Fails if the input is not a duration or is negative.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let signed = SignedDuration::deserialize(deserializer)?;
    Duration::try_from(signed).map_err(de::Error::custom)
}
