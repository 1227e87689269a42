// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logging of fan-out activity.
//!
//! With the `logs` feature enabled and logging turned on for a cache, every
//! facade operation emits one `tracing` event named `fanout.event` carrying the
//! region, operation, activity, the strategy index involved (if any) and the
//! duration.

use std::time::Duration;

pub(crate) mod attributes;
pub(crate) mod ext;
#[cfg(test)]
pub(crate) mod testing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FanoutOperation {
    Get,
    GetMany,
    Put,
    PutMany,
    Remove,
    Clear,
    Lock,
    LockMany,
    Unlock,
    UnlockMany,
    Destroy,
}

impl FanoutOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "fanout.get",
            Self::GetMany => "fanout.get_many",
            Self::Put => "fanout.put",
            Self::PutMany => "fanout.put_many",
            Self::Remove => "fanout.remove",
            Self::Clear => "fanout.clear",
            Self::Lock => "fanout.lock",
            Self::LockMany => "fanout.lock_many",
            Self::Unlock => "fanout.unlock",
            Self::UnlockMany => "fanout.unlock_many",
            Self::Destroy => "fanout.destroy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FanoutActivity {
    Hit,
    Miss,
    Replicated,
    Cleared,
    Locked,
    Unlocked,
    RolledBack,
    RollbackFailed,
    Destroyed,
    Error,
}

impl FanoutActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "fanout.hit",
            Self::Miss => "fanout.miss",
            Self::Replicated => "fanout.replicated",
            Self::Cleared => "fanout.cleared",
            Self::Locked => "fanout.locked",
            Self::Unlocked => "fanout.unlocked",
            Self::RolledBack => "fanout.rolled_back",
            Self::RollbackFailed => "fanout.rollback_failed",
            Self::Destroyed => "fanout.destroyed",
            Self::Error => "fanout.error",
        }
    }

    #[cfg(any(feature = "logs", test))]
    pub fn level(self) -> tracing::Level {
        match self {
            Self::Hit | Self::Miss | Self::Replicated => tracing::Level::DEBUG,
            Self::Cleared | Self::Locked | Self::Unlocked | Self::RolledBack | Self::Destroyed => tracing::Level::INFO,
            Self::RollbackFailed => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

/// Per-cache logging switch.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FanoutTelemetry {
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
}

impl FanoutTelemetry {
    pub(crate) fn new(logs_enabled: bool) -> Self {
        #[cfg(not(any(feature = "logs", test)))]
        let _ = logs_enabled;

        Self {
            #[cfg(any(feature = "logs", test))]
            logs_enabled,
        }
    }

    /// Records one facade event.
    #[inline]
    pub(crate) fn record(
        self,
        region: &str,
        operation: FanoutOperation,
        activity: FanoutActivity,
        strategy: Option<usize>,
        duration: Option<Duration>,
    ) {
        #[cfg(any(feature = "logs", test))]
        if self.logs_enabled {
            Self::emit(region, operation, activity, strategy, duration);
        }

        #[cfg(not(any(feature = "logs", test)))]
        let _ = (region, operation, activity, strategy, duration);
    }

    #[cfg(any(feature = "logs", test))]
    fn emit(region: &str, operation: FanoutOperation, activity: FanoutActivity, strategy: Option<usize>, duration: Option<Duration>) {
        let op = operation.as_str();
        let ev = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // Tracing level must be constant, so a macro selects the level.
        // Field names must match constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    fanout.region = region,
                    fanout.operation = op,
                    fanout.activity = ev,
                    fanout.strategy = ?strategy,
                    fanout.duration_ns = ?duration_ns,
                    "fanout.event"
                )
            };
        }

        match activity.level() {
            tracing::Level::ERROR => emit_event!(error),
            tracing::Level::WARN => emit_event!(warn),
            tracing::Level::INFO => emit_event!(info),
            _ => emit_event!(debug),
        }
    }
}
