// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The future returned by [`Cache::get`](crate::Cache::get).

use std::{
    fmt::Debug,
    pin::Pin,
    task::{Context, Poll},
};

use futures::channel::oneshot;

use crate::Error;

/// The result of [`Cache::get`](crate::Cache::get).
///
/// A lookup carries two independent answers:
///
/// - [`current`](Self::current): the best value available at the moment of the call. It is
///   `Some` for fresh and stale (within grace) values and `None` on a miss.
/// - the lookup itself is a future resolving to the delivered result: immediately for fresh and
///   stale values, or once the in-flight producer invocation settles on a miss.
///
/// Dropping a lookup without awaiting it does not cancel anything: a producer invocation the
/// lookup started still completes and populates the cache.
#[must_use = "a lookup does nothing more when dropped; use `current()` or await it"]
pub struct Lookup<V> {
    current: Option<V>,
    receiver: oneshot::Receiver<Result<V, Error>>,
}

impl<V> Lookup<V> {
    pub(crate) fn new(current: Option<V>, receiver: oneshot::Receiver<Result<V, Error>>) -> Self {
        Self { current, receiver }
    }

    /// The value available synchronously when the lookup was made.
    #[must_use]
    pub fn current(&self) -> Option<&V> {
        self.current.as_ref()
    }

    /// Consumes the lookup, keeping only the synchronous value.
    #[must_use]
    pub fn into_current(self) -> Option<V> {
        self.current
    }
}

// The value is never pinned structurally; only the receiver is polled.
impl<V> Unpin for Lookup<V> {}

impl<V> Future for Lookup<V> {
    type Output = Result<V, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|delivered| delivered.unwrap_or(Err(Error::Abandoned)))
    }
}

impl<V: Debug> Debug for Lookup<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lookup").field("current", &self.current).finish_non_exhaustive()
    }
}
