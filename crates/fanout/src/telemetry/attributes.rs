// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(test)]
pub(crate) const FANOUT_REGION_NAME: &str = "fanout.region";

#[cfg(test)]
pub(crate) const FANOUT_EVENT_NAME: &str = "fanout.event";

#[cfg(test)]
pub(crate) const FANOUT_OPERATION_NAME: &str = "fanout.operation";

#[cfg(test)]
pub(crate) const FANOUT_ACTIVITY_NAME: &str = "fanout.activity";

#[cfg(test)]
pub(crate) const FANOUT_STRATEGY_NAME: &str = "fanout.strategy";

#[cfg(test)]
pub(crate) const FANOUT_DURATION_NAME: &str = "fanout.duration_ns";
