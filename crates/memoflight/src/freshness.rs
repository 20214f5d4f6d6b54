// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Freshness policy: classifies a stored value against its deadline and the grace period.

use std::time::{Duration, Instant};

/// Point in time after which a value is stale. `None` never expires.
pub(crate) type Deadline = Option<Instant>;

/// Computes the deadline `ttl` after `now`. A deadline beyond the clock's range never expires.
pub(crate) fn deadline_after(now: Instant, ttl: Duration) -> Deadline {
    now.checked_add(ttl)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Freshness {
    /// `now < expires_at`: served without contacting the producer.
    Fresh,
    /// `expires_at <= now < expires_at + grace`: served while a refresh runs.
    Stale,
    /// `now >= expires_at + grace`: treated as absent and eligible for collection.
    Expired,
}

impl Freshness {
    pub(crate) fn classify(expires_at: Deadline, grace: Duration, now: Instant) -> Self {
        let Some(expires_at) = expires_at else {
            return Self::Fresh;
        };

        if now < expires_at {
            return Self::Fresh;
        }

        match expires_at.checked_add(grace) {
            Some(gone_at) if now >= gone_at => Self::Expired,
            _ => Self::Stale,
        }
    }

    /// Whether a value in this state may still be returned to callers.
    pub(crate) fn is_servable(self) -> bool {
        !matches!(self, Self::Expired)
    }
}
